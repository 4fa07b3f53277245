//! `recall`: unified read surface — search, view a single observation,
//! soft-delete (purge), and restore.
//!
//! Grounded on the teacher's `tools::search_unified` (schema/execute shape,
//! detail-level formatting) merged with `tools::restore`'s purge/restore
//! pair, narrowed to the four actions this spec names. `search` embeds the
//! query via the shared [`EmbeddingWorker`] before calling
//! `laminark_core::search::hybrid_search`, which still degrades gracefully
//! to keyword-only when that embed call returns `None`.

use laminark_core::budget::{estimate_tokens, truncate_chars_at_line_boundary, truncate_items_to_token_budget};
use laminark_core::config::Config;
use laminark_core::models::{Observation, SearchResult};
use laminark_core::project::ProjectHash;
use laminark_core::search::hybrid_search;
use laminark_core::storage::Store;
use laminark_core::EmbeddingWorker;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

const LIST_TOKEN_BUDGET: usize = 2_000;
const FULL_VIEW_TOKEN_BUDGET: usize = 4_000;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "action": {
                "type": "string",
                "enum": ["search", "view", "purge", "restore"],
                "description": "Which operation to perform"
            },
            "query": { "type": "string", "description": "Required for action=search" },
            "id": { "type": "string", "description": "Required for action=view, purge, restore" },
            "detail": {
                "type": "string",
                "enum": ["compact", "timeline", "full"],
                "default": "compact",
                "description": "Level of detail for search/view results"
            },
            "limit": { "type": "integer", "default": 10, "minimum": 1, "maximum": 50 },
            "includePurged": { "type": "boolean", "default": false }
        },
        "required": ["action"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecallArgs {
    action: String,
    query: Option<String>,
    id: Option<String>,
    #[serde(default = "default_detail")]
    detail: String,
    limit: Option<i64>,
    #[serde(default)]
    include_purged: bool,
}

fn default_detail() -> String {
    "compact".to_string()
}

pub fn execute(
    store: &Arc<Store>,
    project: &ProjectHash,
    _config: &Config,
    embedding_worker: &EmbeddingWorker,
    args: Option<Value>,
) -> Result<Value, String> {
    let args: RecallArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {e}"))?,
        None => return Err("Missing arguments".to_string()),
    };
    let limit = args.limit.unwrap_or(10).clamp(1, 50) as usize;

    let mut result = match args.action.as_str() {
        "search" => search(store, project, embedding_worker, &args, limit),
        "view" => view(store, project, &args),
        "purge" => purge(store, project, &args),
        "restore" => restore(store, project, &args),
        other => Err(format!("Unknown action '{other}'. Must be search, view, purge, or restore.")),
    }?;

    if let Some(banner) = consume_notification_banner(store, project) {
        if let Value::Object(map) = &mut result {
            map.insert("notification".to_string(), Value::String(banner));
        }
    }

    Ok(result)
}

/// Drain pending notifications (e.g. a topic shift that just stashed the
/// prior conversation) and render them as a single `[Laminark] ...` banner,
/// consumed on this read so it surfaces exactly once.
fn consume_notification_banner(store: &Store, project: &ProjectHash) -> Option<String> {
    let pending = store.consume_pending_notifications(project).ok()?;
    if pending.is_empty() {
        return None;
    }
    let joined = pending.into_iter().map(|n| n.text).collect::<Vec<_>>().join(" ");
    Some(format!("[Laminark] {joined}"))
}

fn search(
    store: &Store,
    project: &ProjectHash,
    embedding_worker: &EmbeddingWorker,
    args: &RecallArgs,
    limit: usize,
) -> Result<Value, String> {
    let query = args.query.as_deref().filter(|q| !q.trim().is_empty()).ok_or("action=search requires a non-empty query")?;
    let query_vector = embedding_worker.embed_blocking(query);
    let results = hybrid_search(store, project, query, query_vector.as_deref(), limit).map_err(|e| e.to_string())?;

    let rendered: Vec<String> = results.iter().map(|r| format_result(r, &args.detail)).collect();
    let kept = truncate_items_to_token_budget(rendered, "\n---\n", LIST_TOKEN_BUDGET);

    Ok(serde_json::json!({
        "query": query,
        "total": kept.len(),
        "truncated": kept.len() < results.len(),
        "results": kept,
    }))
}

fn view(store: &Store, project: &ProjectHash, args: &RecallArgs) -> Result<Value, String> {
    let id = args.id.as_deref().ok_or("action=view requires id")?;
    let observation = if args.include_purged {
        store.get_observation_including_deleted(id).map_err(|e| e.to_string())?
    } else {
        store.get_observation(project, id).map_err(|e| e.to_string())?
    };
    let observation = observation.ok_or_else(|| format!("No observation with id '{id}'"))?;

    let rendered = format_observation_full(&observation);
    let truncated = truncate_chars_at_line_boundary(&rendered, FULL_VIEW_TOKEN_BUDGET * 4);
    Ok(serde_json::json!({
        "id": observation.id,
        "truncated": estimate_tokens(&truncated) < estimate_tokens(&rendered),
        "content": truncated,
    }))
}

fn purge(store: &Store, project: &ProjectHash, args: &RecallArgs) -> Result<Value, String> {
    let id = args.id.as_deref().ok_or("action=purge requires id")?;
    store.soft_delete_observation(project, id).map_err(|e| e.to_string())?;
    Ok(serde_json::json!({ "id": id, "purged": true }))
}

fn restore(store: &Store, project: &ProjectHash, args: &RecallArgs) -> Result<Value, String> {
    let id = args.id.as_deref().ok_or("action=restore requires id")?;
    store.restore_observation(project, id).map_err(|e| e.to_string())?;
    Ok(serde_json::json!({ "id": id, "restored": true }))
}

fn format_result(r: &SearchResult, detail: &str) -> String {
    match detail {
        "timeline" => format!("[{}] {} — {}", r.observation.created_at.to_rfc3339(), r.observation.id, first_line(&r.observation.content)),
        "full" => format_observation_full(&r.observation),
        _ => format!("{} (score {:.3}, {:?}): {}", r.observation.id, r.score, r.match_type, first_line(&r.observation.content)),
    }
}

fn format_observation_full(o: &Observation) -> String {
    format!(
        "id: {}\nsource: {}\ncreatedAt: {}\ntitle: {}\ncontent:\n{}",
        o.id,
        o.source,
        o.created_at.to_rfc3339(),
        o.title.clone().unwrap_or_default(),
        o.content,
    )
}

fn first_line(content: &str) -> String {
    content.lines().next().unwrap_or("").chars().take(160).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use laminark_core::config::Config;
    use laminark_core::embeddings::piggyback::PiggybackCache;

    fn setup() -> (Arc<Store>, ProjectHash, Config, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path().join("test.db")).unwrap());
        (store, ProjectHash::from_raw("abc0000000000011"), Config::default(), dir)
    }

    fn worker() -> EmbeddingWorker {
        EmbeddingWorker::new(
            laminark_core::config::EmbeddingMode::default(),
            Arc::new(PiggybackCache::new(laminark_core::EMBEDDING_DIMENSIONS)),
        )
    }

    #[test]
    fn search_finds_a_keyword_match() {
        let (store, project, config, _dir) = setup();
        store.create_observation(&project, None, "Decided to use JWT for auth".into(), "manual".into(), None).unwrap();
        let result =
            execute(&store, &project, &config, &worker(), Some(serde_json::json!({"action": "search", "query": "JWT"}))).unwrap();
        assert_eq!(result["total"], 1);
    }

    #[test]
    fn view_returns_an_error_string_for_a_missing_id() {
        let (store, project, config, _dir) = setup();
        let err =
            execute(&store, &project, &config, &worker(), Some(serde_json::json!({"action": "view", "id": "nope"}))).unwrap_err();
        assert!(err.contains("nope"));
    }

    #[test]
    fn purge_then_view_without_include_purged_is_not_found() {
        let (store, project, config, _dir) = setup();
        let obs = store.create_observation(&project, None, "to purge".into(), "manual".into(), None).unwrap();
        execute(&store, &project, &config, &worker(), Some(serde_json::json!({"action": "purge", "id": obs.id}))).unwrap();
        let err =
            execute(&store, &project, &config, &worker(), Some(serde_json::json!({"action": "view", "id": obs.id}))).unwrap_err();
        assert!(err.contains(&obs.id));
    }

    #[test]
    fn a_pending_notification_is_surfaced_once_as_a_banner() {
        let (store, project, config, _dir) = setup();
        store.create_observation(&project, None, "Decided to use JWT for auth".into(), "manual".into(), None).unwrap();
        store.enqueue_notification(&project, "previous context stashed").unwrap();

        let first =
            execute(&store, &project, &config, &worker(), Some(serde_json::json!({"action": "search", "query": "JWT"}))).unwrap();
        let banner = first["notification"].as_str().unwrap();
        assert!(banner.starts_with("[Laminark]"));
        assert!(banner.contains("previous context stashed"));

        let second =
            execute(&store, &project, &config, &worker(), Some(serde_json::json!({"action": "search", "query": "JWT"}))).unwrap();
        assert!(second.get("notification").is_none());
    }

    #[test]
    fn restore_makes_a_purged_observation_visible_again() {
        let (store, project, config, _dir) = setup();
        let obs = store.create_observation(&project, None, "to restore".into(), "manual".into(), None).unwrap();
        execute(&store, &project, &config, &worker(), Some(serde_json::json!({"action": "purge", "id": obs.id}))).unwrap();
        execute(&store, &project, &config, &worker(), Some(serde_json::json!({"action": "restore", "id": obs.id}))).unwrap();
        let result =
            execute(&store, &project, &config, &worker(), Some(serde_json::json!({"action": "view", "id": obs.id}))).unwrap();
        assert_eq!(result["id"], obs.id);
    }
}
