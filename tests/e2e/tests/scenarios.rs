//! Concrete end-to-end scenarios exercising the request domain
//! (`HookIngest`), the search surface (`hybrid_search`), topic-shift
//! detection (`TopicDetector`), and the knowledge graph's degree cap, each
//! against a fresh on-disk store.

use laminark_core::broadcast::Broadcast;
use laminark_core::config::Config;
use laminark_core::embeddings::piggyback::PiggybackCache;
use laminark_core::hooks::{HookIngest, HookOutcome};
use laminark_core::models::{GraphEdgeType, GraphNodeType, HookEvent, SearchMatchType, SessionEventKind};
use laminark_core::project::ProjectHash;
use laminark_core::search::hybrid_search;
use laminark_core::storage::Store;
use laminark_core::topic::TopicDetector;
use laminark_core::EmbeddingWorker;
use std::sync::Arc;

fn harness() -> (Arc<Store>, Arc<Broadcast>, Config, ProjectHash, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(Store::open(dir.path().join("test.db")).unwrap());
    let broadcast = Arc::new(Broadcast::new());
    let project = ProjectHash::from_raw("e2e0000000000001");
    (store, broadcast, Config::default(), project, dir)
}

fn test_embedding_worker() -> EmbeddingWorker {
    EmbeddingWorker::new(
        laminark_core::config::EmbeddingMode::default(),
        Arc::new(PiggybackCache::new(laminark_core::EMBEDDING_DIMENSIONS)),
    )
}

fn post_tool_use(tool_name: &str, input: serde_json::Value, session_id: &str) -> HookEvent {
    HookEvent {
        hook_event_name: SessionEventKind::PostToolUse,
        session_id: session_id.to_string(),
        tool_name: Some(tool_name.to_string()),
        tool_input: Some(input),
        tool_response: None,
    }
}

/// Scenario 1: write-then-search in keyword-only mode.
#[test]
fn write_then_search_keyword_only() {
    let (store, _broadcast, _config, project, _dir) = harness();
    store
        .create_observation(
            &project,
            None,
            "Auth: Decided to use JWT for session management".into(),
            "manual".into(),
            None,
        )
        .unwrap();

    let results = hybrid_search(&store, &project, "JWT", None, 10).unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].observation.content.contains("JWT"));
    assert_eq!(results[0].match_type, SearchMatchType::Fts);
}

/// Scenario 2: noise rejection. A long `npm install` log produces no
/// observation.
#[test]
fn noise_is_rejected() {
    let (store, broadcast, config, project, _dir) = harness();
    let ingest = HookIngest::new(store.clone(), broadcast, config, project.clone(), test_embedding_worker());

    let mut progress = String::from("npm install\n");
    for i in 0..2000 {
        progress.push_str(&format!("added package-{i}\n"));
    }
    let event = post_tool_use("Bash", serde_json::json!({"command": "npm install"}), "s1");
    let mut event = event;
    event.tool_response = Some(serde_json::json!({"stdout": progress}));

    let outcome = ingest.handle(event).unwrap();
    assert!(matches!(outcome, HookOutcome::Dropped { reason: "noise" }));

    let count = hybrid_search(&store, &project, "npm", None, 10).unwrap().len();
    assert_eq!(count, 0);
}

/// Scenario 3: privacy redaction. A leaked API key is stored redacted, not
/// in the clear.
#[test]
fn credential_is_redacted_before_persisting() {
    let (store, broadcast, config, project, _dir) = harness();
    let ingest = HookIngest::new(store.clone(), broadcast, config, project.clone(), test_embedding_worker());

    let mut event = post_tool_use("Bash", serde_json::json!({"command": "printenv"}), "s1");
    event.tool_response = Some(serde_json::json!({"stdout": "API_KEY=sk-abcdefghijklmnopqrstuvwxyz0123456789"}));

    let outcome = ingest.handle(event).unwrap();
    assert!(matches!(outcome, HookOutcome::Admitted { .. }));

    assert!(hybrid_search(&store, &project, "sk-abc", None, 10).unwrap().is_empty());
    assert_eq!(hybrid_search(&store, &project, "REDACTED", None, 10).unwrap().len(), 1);
}

/// Scenario 4: a run of clustered observations followed by one far-off
/// observation trips a topic shift, producing a stash and a pending
/// notification.
#[test]
fn topic_shift_produces_a_stash_and_a_notification() {
    let (store, broadcast, config, project, _dir) = harness();
    let topic_detector = TopicDetector::new(config.topic.clone());
    let session_id = "session-shift";
    store.start_session(session_id, &project).unwrap();

    let clustered = [
        vec![1.0, 0.02, 0.0, 0.0],
        vec![0.98, 0.05, 0.01, 0.0],
        vec![0.99, -0.03, 0.0, 0.01],
        vec![1.0, 0.0, -0.02, 0.0],
        vec![0.97, 0.04, 0.0, -0.01],
    ];
    for (i, vector) in clustered.iter().enumerate() {
        let obs = store
            .create_observation(&project, None, format!("clustered observation {i}"), "manual".into(), Some(session_id.into()))
            .unwrap();
        let stash = topic_detector.observe(&store, &broadcast, &project, session_id, &obs.id, vector).unwrap();
        assert!(stash.is_none());
    }

    let far_off = vec![0.0, 1.0, 0.0, 0.0];
    let obs = store
        .create_observation(&project, None, "a completely unrelated observation".into(), "manual".into(), Some(session_id.into()))
        .unwrap();
    let stash = topic_detector.observe(&store, &broadcast, &project, session_id, &obs.id, &far_off).unwrap();

    let stash = stash.expect("expected a topic shift to produce a stash");
    assert_eq!(stash.observations.len(), 5);

    let pending = store.consume_pending_notifications(&project).unwrap();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].text.contains("previous context stashed"));
}

/// Scenario 5: inserting edges past the degree cap evicts the lowest-weight
/// edge, keeping degree at the cap.
#[test]
fn degree_cap_evicts_the_lowest_weight_edge() {
    let (store, _broadcast, _config, project, _dir) = harness();
    let source = store.upsert_graph_node(&project, "a.rs", GraphNodeType::File, "obs1", serde_json::json!({})).unwrap();

    for i in 0..51 {
        let target = store
            .upsert_graph_node(&project, &format!("target-{i}.rs"), GraphNodeType::File, "obs1", serde_json::json!({}))
            .unwrap();
        store
            .insert_graph_edge(&project, &source.id, &target.id, GraphEdgeType::DependsOn, (i as f32) / 100.0, None, 50)
            .unwrap();
    }

    assert_eq!(store.node_degree(&source.id).unwrap(), 50);
    let (nodes, edges) = store.neighbors(&source.id, 1, None).unwrap();
    assert_eq!(edges.len(), 50);
    assert!(!nodes.iter().any(|n| n.name == "target-0.rs"), "the lowest-weight edge's target should have been evicted");
}
