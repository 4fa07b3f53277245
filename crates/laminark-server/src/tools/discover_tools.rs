//! `discover_tools`: search the tool registry this process has observed
//! (`hook:PostToolUse` calls and config-declared tools), deduplicated and
//! capped to a 2,000-token budget.
//!
//! Grounded on the teacher's `tools::search_unified` scoring/formatting
//! shape, over `Store::search_tool_registry` instead of the knowledge
//! graph. Entries are matched by name/description substring (BM25-style
//! ranking on tool metadata isn't worth a second search index); "hybrid"
//! here means ranked by usage count the way `recent_tool_usage_counts`
//! feeds ContextAssembler's ranking formula, not a second embedding pass.

use laminark_core::budget::truncate_items_to_token_budget;
use laminark_core::config::Config;
use laminark_core::models::{ToolRegistryEntry, ToolScope};
use laminark_core::project::ProjectHash;
use laminark_core::storage::Store;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

const DEFAULT_LIMIT: usize = 20;
const TOKEN_BUDGET: usize = 2_000;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "query": { "type": "string", "description": "Substring to match against tool names/descriptions" },
            "scope": {
                "type": "string",
                "enum": ["global", "project", "plugin"],
                "description": "Restrict results to one scope"
            },
            "limit": { "type": "integer", "default": DEFAULT_LIMIT, "minimum": 1, "maximum": 50 }
        },
        "required": ["query"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscoverToolsArgs {
    query: String,
    scope: Option<String>,
    limit: Option<usize>,
}

pub fn execute(
    store: &Arc<Store>,
    project: &ProjectHash,
    _config: &Config,
    args: Option<Value>,
) -> Result<Value, String> {
    let args: DiscoverToolsArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {e}"))?,
        None => return Err("Missing arguments".to_string()),
    };
    if args.query.trim().is_empty() {
        return Err("query cannot be empty".to_string());
    }
    let limit = args.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 50);
    let scope = match &args.scope {
        Some(s) => Some(parse_scope(s)?),
        None => None,
    };

    let mut hits = store.search_tool_registry(project, &args.query, limit * 2).map_err(|e| e.to_string())?;
    if let Some(scope) = scope {
        hits.retain(|h| h.scope == scope);
    }

    let mut seen: HashSet<(String, Option<String>)> = HashSet::new();
    hits.retain(|h| seen.insert((h.name.clone(), h.server_name.clone())));
    hits.truncate(limit);

    let rendered: Vec<String> = hits.iter().map(format_entry).collect();
    let kept = truncate_items_to_token_budget(rendered, "\n", TOKEN_BUDGET);

    Ok(serde_json::json!({
        "query": args.query,
        "total": kept.len(),
        "truncated": kept.len() < hits.len(),
        "tools": kept,
    }))
}

fn parse_scope(s: &str) -> Result<ToolScope, String> {
    match s {
        "global" => Ok(ToolScope::Global),
        "project" => Ok(ToolScope::Project),
        "plugin" => Ok(ToolScope::Plugin),
        other => Err(format!("Unknown scope '{other}'. Must be global, project, or plugin.")),
    }
}

fn format_entry(entry: &ToolRegistryEntry) -> String {
    match &entry.description {
        Some(desc) => format!("{} ({} uses) — {}", entry.name, entry.usage_count, desc),
        None => format!("{} ({} uses)", entry.name, entry.usage_count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laminark_core::config::Config;
    use laminark_core::models::ToolType;

    fn setup() -> (Arc<Store>, ProjectHash, Config, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path().join("test.db")).unwrap());
        (store, ProjectHash::from_raw("abc0000000000015"), Config::default(), dir)
    }

    fn entry(name: &str, project: &ProjectHash) -> ToolRegistryEntry {
        ToolRegistryEntry {
            name: name.into(),
            tool_type: ToolType::Builtin,
            scope: ToolScope::Project,
            source: "hook:PostToolUse".into(),
            project_hash: Some(project.clone()),
            description: Some(format!("{name} description")),
            server_name: None,
            trigger_hints: None,
            usage_count: 3,
            last_used_at: None,
        }
    }

    #[test]
    fn finds_a_tool_by_name_substring() {
        let (store, project, config, _dir) = setup();
        store.upsert_tool_registry_entry(&entry("Bash", &project)).unwrap();
        let result = execute(&store, &project, &config, Some(serde_json::json!({"query": "bash"}))).unwrap();
        assert_eq!(result["total"], 1);
    }

    #[test]
    fn rejects_an_empty_query() {
        let (store, project, config, _dir) = setup();
        let err = execute(&store, &project, &config, Some(serde_json::json!({"query": "  "}))).unwrap_err();
        assert!(err.contains("empty"));
    }

    #[test]
    fn filters_by_scope() {
        let (store, project, config, _dir) = setup();
        store.upsert_tool_registry_entry(&entry("Edit", &project)).unwrap();
        let result = execute(&store, &project, &config, Some(serde_json::json!({"query": "edit", "scope": "global"}))).unwrap();
        assert_eq!(result["total"], 0);
    }
}
