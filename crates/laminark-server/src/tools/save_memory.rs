//! `save_memory`: persist a manual observation.
//!
//! Grounded on the teacher's `tools::ingest` shape (schema + execute over
//! `Arc<Store>`), narrowed to the single `content`/`title` pair this spec
//! calls for. Content is redacted before it ever reaches the store, the
//! same as the hook admission path.

use laminark_core::config::Config;
use laminark_core::project::ProjectHash;
use laminark_core::redaction;
use laminark_core::storage::{ListFilters, Store};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// A duplicate is the same (post-redaction) content saved manually within
/// this window.
const DEDUP_WINDOW_HOURS: i64 = 24;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "content": {
                "type": "string",
                "description": "The observation to remember"
            },
            "title": {
                "type": "string",
                "description": "Optional title; derived from the content's first line if omitted"
            }
        },
        "required": ["content"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveMemoryArgs {
    content: String,
    title: Option<String>,
}

pub fn execute(
    store: &Arc<Store>,
    project: &ProjectHash,
    config: &Config,
    args: Option<Value>,
) -> Result<Value, String> {
    let args: SaveMemoryArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {e}"))?,
        None => return Err("Missing arguments".to_string()),
    };

    if args.content.trim().is_empty() {
        return Err("content cannot be empty".to_string());
    }

    let (redacted, _matches) = redaction::redact(&args.content, &config.redaction);
    let title = args.title.or_else(|| derive_title(&redacted));

    if let Some(existing) = find_recent_duplicate(store, project, &redacted).map_err(|e| e.to_string())? {
        return Ok(serde_json::json!({
            "id": existing.id,
            "title": existing.title,
            "duplicate": true,
        }));
    }

    let observation = store
        .create_observation(project, title.clone(), redacted, "manual".to_string(), None)
        .map_err(|e| e.to_string())?;

    Ok(serde_json::json!({
        "id": observation.id,
        "title": observation.title,
        "duplicate": false,
    }))
}

fn derive_title(content: &str) -> Option<String> {
    let first_line = content.lines().next()?.trim();
    if first_line.is_empty() {
        return None;
    }
    Some(first_line.chars().take(80).collect())
}

fn find_recent_duplicate(
    store: &Store,
    project: &ProjectHash,
    content: &str,
) -> laminark_core::error::Result<Option<laminark_core::models::Observation>> {
    let cutoff = chrono::Utc::now() - chrono::Duration::hours(DEDUP_WINDOW_HOURS);
    let recent = store.list_observations(project, &ListFilters { session_id: None, include_deleted: false, limit: 200 })?;
    Ok(recent.into_iter().find(|o| o.created_at >= cutoff && o.content == content))
}
