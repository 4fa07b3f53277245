//! `topic_context`: recency-ordered list of stashed contexts, answering
//! "where was I?" after a topic shift stashed the prior thread.
//!
//! Grounded on the teacher's `tools::session_context` schema/execute shape,
//! narrowed to `TopicDetector`'s stash list (§4.5) instead of a cognitive
//! snapshot.

use laminark_core::config::Config;
use laminark_core::project::ProjectHash;
use laminark_core::storage::Store;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

const DEFAULT_LIMIT: usize = 10;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "limit": {
                "type": "integer",
                "description": "Maximum number of stashes to return (default: 10)",
                "default": DEFAULT_LIMIT,
                "minimum": 1,
                "maximum": 50
            }
        }
    })
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct TopicContextArgs {
    limit: Option<usize>,
}

pub fn execute(
    store: &Arc<Store>,
    project: &ProjectHash,
    _config: &Config,
    args: Option<Value>,
) -> Result<Value, String> {
    let args: TopicContextArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {e}"))?,
        None => TopicContextArgs::default(),
    };
    let limit = args.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 50);

    let stashes = store.list_stashes(project, limit).map_err(|e| e.to_string())?;
    if stashes.is_empty() {
        return Ok(serde_json::json!({
            "message": "No stashed contexts yet.",
            "stashes": [],
        }));
    }

    let rendered: Vec<Value> = stashes
        .iter()
        .map(|s| {
            serde_json::json!({
                "id": s.id,
                "topicLabel": s.topic_label,
                "summary": s.summary,
                "observationCount": s.observations.len(),
                "createdAt": s.created_at.to_rfc3339(),
                "resumedAt": s.resumed_at.map(|t| t.to_rfc3339()),
                "status": format!("{:?}", s.status),
            })
        })
        .collect();

    Ok(serde_json::json!({
        "message": format!("Where you were: {} stashed context(s).", rendered.len()),
        "stashes": rendered,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use laminark_core::config::Config;
    use laminark_core::models::{ObservationSnapshot, Stash, StashStatus};

    fn setup() -> (Arc<Store>, ProjectHash, Config, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path().join("test.db")).unwrap());
        (store, ProjectHash::from_raw("abc0000000000012"), Config::default(), dir)
    }

    fn stash(project: &ProjectHash, label: &str) -> Stash {
        Stash {
            id: uuid::Uuid::new_v4().to_string(),
            project_hash: project.clone(),
            session_id: "session-1".into(),
            topic_label: label.into(),
            summary: format!("Working on {label}"),
            observations: vec![ObservationSnapshot {
                observation_id: "obs-1".into(),
                content: "some content".into(),
                kind: None,
                timestamp: chrono::Utc::now(),
                embedding: None,
            }],
            created_at: chrono::Utc::now(),
            resumed_at: None,
            status: StashStatus::Stashed,
        }
    }

    #[test]
    fn empty_store_returns_a_friendly_message() {
        let (store, project, config, _dir) = setup();
        let result = execute(&store, &project, &config, None).unwrap();
        assert_eq!(result["stashes"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn lists_stashes_most_recent_first() {
        let (store, project, config, _dir) = setup();
        store.create_stash(&stash(&project, "auth work")).unwrap();
        let result = execute(&store, &project, &config, Some(serde_json::json!({"limit": 5}))).unwrap();
        let stashes = result["stashes"].as_array().unwrap();
        assert_eq!(stashes.len(), 1);
        assert_eq!(stashes[0]["topicLabel"], "auth work");
    }
}
