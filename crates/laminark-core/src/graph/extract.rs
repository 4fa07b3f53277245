//! Entity extraction (§4.6 step a): a fixed battery of regex rules, one
//! family per [`GraphNodeType`], each producing candidate spans with a
//! baseline confidence that the quality gate in [`super::pipeline`] then
//! filters and adjusts.

use crate::models::GraphNodeType;
use regex::Regex;
use std::sync::OnceLock;

/// One candidate entity pulled out of an observation's content.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedEntity {
    pub name: String,
    pub node_type: GraphNodeType,
    pub confidence: f32,
    pub span: (usize, usize),
}

struct Rule {
    node_type: GraphNodeType,
    regex: Regex,
}

fn rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            Rule {
                node_type: GraphNodeType::File,
                regex: Regex::new(
                    r"\b[\w./-]+\.(?:rs|toml|ts|tsx|js|jsx|py|go|rb|md|json|yaml|yml|sql|sh|proto)\b",
                )
                .unwrap(),
            },
            Rule {
                node_type: GraphNodeType::Project,
                regex: Regex::new(
                    r"(?i)\b(?:[\w.-]+/)?(?:Cargo\.toml|package\.json|pyproject\.toml|go\.mod|Gemfile|pom\.xml|build\.gradle)\b",
                )
                .unwrap(),
            },
            Rule {
                node_type: GraphNodeType::Tool,
                regex: Regex::new(r"^(Write|Edit|MultiEdit|NotebookEdit|Bash|Read|Glob|Grep)\b").unwrap(),
            },
            Rule {
                node_type: GraphNodeType::Reference,
                regex: Regex::new(r"https?://[^\s)\]]+").unwrap(),
            },
            Rule {
                node_type: GraphNodeType::Decision,
                regex: Regex::new(
                    r"(?i)\b(?:decided to|we will use|chose to|going with|opted for)\s+([a-zA-Z0-9 _.:/-]{3,80})",
                )
                .unwrap(),
            },
            Rule {
                node_type: GraphNodeType::Problem,
                regex: Regex::new(r"(?i)\b(?:error|bug|issue|exception|panic)s?\b[:\s]*([a-zA-Z0-9 _.:/'\"-]{3,120})?")
                    .unwrap(),
            },
            Rule {
                node_type: GraphNodeType::Solution,
                regex: Regex::new(r"(?i)\b(?:fixed|resolved|solved)\b[:\s]*([a-zA-Z0-9 _.:/'\"-]{3,120})?").unwrap(),
            },
        ]
    })
}

/// Run every rule over `content`, tagging each match with `node_type` and
/// its type's baseline confidence. Does not deduplicate or filter — that is
/// the quality gate's job.
pub fn extract(content: &str) -> Vec<ExtractedEntity> {
    let mut out = Vec::new();
    for rule in rules() {
        for m in rule.regex.find_iter(content) {
            let name = m.as_str().trim();
            if name.is_empty() {
                continue;
            }
            out.push(ExtractedEntity {
                name: name.to_string(),
                node_type: rule.node_type,
                confidence: rule.node_type.baseline_confidence(),
                span: (m.start(), m.end()),
            });
        }
    }
    out
}
