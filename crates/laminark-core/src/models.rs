//! Data model entities (§3).
//!
//! External-facing input types use `camelCase` + `deny_unknown_fields`, the
//! same hardening the hook payload and tool inputs need against stray or
//! injected fields.

use crate::project::ProjectHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationClassification {
    Discovery,
    Problem,
    Solution,
    Noise,
    Unclassified,
}

impl ObservationClassification {
    pub fn as_str(self) -> &'static str {
        match self {
            ObservationClassification::Discovery => "discovery",
            ObservationClassification::Problem => "problem",
            ObservationClassification::Solution => "solution",
            ObservationClassification::Noise => "noise",
            ObservationClassification::Unclassified => "unclassified",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "discovery" => ObservationClassification::Discovery,
            "problem" => ObservationClassification::Problem,
            "solution" => ObservationClassification::Solution,
            "noise" => ObservationClassification::Noise,
            "unclassified" => ObservationClassification::Unclassified,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    Reference,
    Event,
}

impl ObservationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ObservationKind::Reference => "reference",
            ObservationKind::Event => "event",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "reference" => ObservationKind::Reference,
            "event" => ObservationKind::Event,
            _ => return None,
        })
    }
}

/// A captured semantic event.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub id: String,
    pub project_hash: ProjectHash,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
    /// e.g. `hook:Write`, `manual`, `ingest:FILE.md`.
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<ObservationClassification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ObservationKind>,
}

impl Observation {
    pub fn is_visible(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// A coherent activity window, created on session-start and closed on
/// session-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub project_hash: ProjectHash,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StashStatus {
    Stashed,
    Resumed,
}

/// A value-copy snapshot of an observation, held inside a [`Stash`]. Stashes
/// own these outright — they survive deletion of the source observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationSnapshot {
    pub observation_id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ObservationKind>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// A preserved context thread, created when the topic detector declares a
/// shift.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stash {
    pub id: String,
    pub project_hash: ProjectHash,
    pub session_id: String,
    pub topic_label: String,
    pub summary: String,
    pub observations: Vec<ObservationSnapshot>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resumed_at: Option<DateTime<Utc>>,
    pub status: StashStatus,
}

/// Append-only audit row for every topic-detection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftDecision {
    pub id: String,
    pub session_id: String,
    pub distance: f32,
    pub threshold: f32,
    pub shifted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    pub created_at: DateTime<Utc>,
}

/// A consume-once message addressed to the next tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub project_hash: ProjectHash,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphNodeType {
    File,
    Project,
    Decision,
    Problem,
    Solution,
    Tool,
    Reference,
    Person,
}

impl GraphNodeType {
    /// Baseline extraction confidence per §4.6.
    pub fn baseline_confidence(self) -> f32 {
        match self {
            GraphNodeType::File => 0.95,
            GraphNodeType::Tool => 0.90,
            GraphNodeType::Project => 0.80,
            GraphNodeType::Decision => 0.70,
            GraphNodeType::Problem | GraphNodeType::Solution => 0.65,
            GraphNodeType::Reference | GraphNodeType::Person => 0.60,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GraphNodeType::File => "file",
            GraphNodeType::Project => "project",
            GraphNodeType::Decision => "decision",
            GraphNodeType::Problem => "problem",
            GraphNodeType::Solution => "solution",
            GraphNodeType::Tool => "tool",
            GraphNodeType::Reference => "reference",
            GraphNodeType::Person => "person",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "file" => GraphNodeType::File,
            "project" => GraphNodeType::Project,
            "decision" => GraphNodeType::Decision,
            "problem" => GraphNodeType::Problem,
            "solution" => GraphNodeType::Solution,
            "tool" => GraphNodeType::Tool,
            "reference" => GraphNodeType::Reference,
            "person" => GraphNodeType::Person,
            _ => return None,
        })
    }
}

/// A typed entity, unique by (name, type) within a project. Degree-capped
/// (§4.6).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub project_hash: ProjectHash,
    pub name: String,
    pub node_type: GraphNodeType,
    pub metadata: serde_json::Value,
    pub observation_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphEdgeType {
    Uses,
    DependsOn,
    DecidedBy,
    RelatedTo,
    PartOf,
    CausedBy,
    SolvedBy,
}

impl GraphEdgeType {
    pub fn as_str(self) -> &'static str {
        match self {
            GraphEdgeType::Uses => "uses",
            GraphEdgeType::DependsOn => "depends_on",
            GraphEdgeType::DecidedBy => "decided_by",
            GraphEdgeType::RelatedTo => "related_to",
            GraphEdgeType::PartOf => "part_of",
            GraphEdgeType::CausedBy => "caused_by",
            GraphEdgeType::SolvedBy => "solved_by",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "uses" => GraphEdgeType::Uses,
            "depends_on" => GraphEdgeType::DependsOn,
            "decided_by" => GraphEdgeType::DecidedBy,
            "related_to" => GraphEdgeType::RelatedTo,
            "part_of" => GraphEdgeType::PartOf,
            "caused_by" => GraphEdgeType::CausedBy,
            "solved_by" => GraphEdgeType::SolvedBy,
            _ => return None,
        })
    }
}

/// A typed, weighted directed relationship between two nodes. Weight decays
/// over time (§4.6).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: String,
    pub project_hash: ProjectHash,
    pub source_id: String,
    pub target_id: String,
    pub edge_type: GraphEdgeType,
    pub weight: f32,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolType {
    Builtin,
    McpServer,
    McpTool,
    SlashCommand,
    Skill,
    Plugin,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolScope {
    Global,
    Project,
    Plugin,
}

/// A known tool with provenance, ranked for §4.7's Available-Tools section.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRegistryEntry {
    pub name: String,
    pub tool_type: ToolType,
    pub scope: ToolScope,
    /// `config:*` or `hook:PostToolUse`.
    pub source: String,
    /// `None` for global-scope entries.
    pub project_hash: Option<ProjectHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_hints: Option<Vec<String>>,
    pub usage_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Append-only per-invocation row for temporal tool ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUsageEvent {
    pub tool_name: String,
    pub project_hash: ProjectHash,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMatchType {
    Fts,
    Vector,
    Hybrid,
}

/// A single ranked hit from [`crate::search::hybrid_search`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub observation: Observation,
    pub score: f32,
    pub match_type: SearchMatchType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Hook event kinds consumed over stdin (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SessionEventKind {
    PostToolUse,
    PostToolUseFailure,
    SessionStart,
    SessionEnd,
    Stop,
}

/// The hook event payload, consumed over stdin (§6). `deny_unknown_fields`
/// because this is the one input boundary that's genuinely untrusted (it's
/// produced by whatever host agent is driving the hook).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HookEvent {
    pub hook_event_name: SessionEventKind,
    pub session_id: String,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<serde_json::Value>,
    #[serde(default)]
    pub tool_response: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_event_rejects_unknown_fields() {
        let raw = r#"{"hook_event_name":"PostToolUse","session_id":"s1","evilField":"x"}"#;
        let parsed: Result<HookEvent, _> = serde_json::from_str(raw);
        assert!(parsed.is_err());
    }

    #[test]
    fn hook_event_parses_minimal_session_start() {
        let raw = r#"{"hook_event_name":"SessionStart","session_id":"s1"}"#;
        let parsed: HookEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.session_id, "s1");
        assert_eq!(parsed.hook_event_name, SessionEventKind::SessionStart);
    }

    #[test]
    fn node_type_baseline_confidences_match_spec() {
        assert_eq!(GraphNodeType::File.baseline_confidence(), 0.95);
        assert_eq!(GraphNodeType::Tool.baseline_confidence(), 0.90);
        assert_eq!(GraphNodeType::Reference.baseline_confidence(), 0.60);
    }
}
