//! Round-trip and idempotence laws: properties that must hold regardless of
//! how many times an operation runs or in what order two related operations
//! happen.

use laminark_core::broadcast::Broadcast;
use laminark_core::models::{GraphNodeType, ObservationSnapshot, Stash, StashStatus};
use laminark_core::project::ProjectHash;
use laminark_core::storage::Store;

/// Migrating a fresh database then reopening the same file is a no-op: the
/// second open must succeed and the data written under the first open must
/// still be there, unchanged, afterward.
#[test]
fn reopening_an_already_migrated_database_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roundtrip.db");
    let project = ProjectHash::from_raw("abc0000000000021");

    let first = Store::open(&path).unwrap();
    let obs = first
        .create_observation(&project, None, "written under the first open".into(), "manual".into(), None)
        .unwrap();
    drop(first);

    let second = Store::open(&path).unwrap();
    let reread = second.get_observation(&project, &obs.id).unwrap().expect("observation should survive reopen");
    assert_eq!(reread.content, "written under the first open");

    let third = Store::open(&path).unwrap();
    let reread_again = third.get_observation(&project, &obs.id).unwrap().expect("observation should survive a second reopen");
    assert_eq!(reread_again.content, "written under the first open");
}

/// Upserting the same (project, name, type) node twice returns the same id
/// and folds the second `observation_id` into the existing node's set rather
/// than creating a duplicate node or a duplicate link.
#[test]
fn upserting_the_same_node_twice_does_not_duplicate_it() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("test.db")).unwrap();
    let project = ProjectHash::from_raw("abc0000000000022");

    let first = store.upsert_graph_node(&project, "src/auth.rs", GraphNodeType::File, "obs-a", serde_json::json!({})).unwrap();
    let second = store.upsert_graph_node(&project, "src/auth.rs", GraphNodeType::File, "obs-b", serde_json::json!({})).unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.observation_ids, vec!["obs-a".to_string(), "obs-b".to_string()]);

    let third = store.upsert_graph_node(&project, "src/auth.rs", GraphNodeType::File, "obs-a", serde_json::json!({})).unwrap();
    assert_eq!(third.observation_ids, vec!["obs-a".to_string(), "obs-b".to_string()], "re-upserting a known observation id must not duplicate it");
}

/// A stash owns a value copy of each observation it captured. Soft-deleting
/// the source observation afterward must not affect what the stash returns
/// on resume.
#[test]
fn resuming_a_stash_survives_deletion_of_its_source_observation() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("test.db")).unwrap();
    let project = ProjectHash::from_raw("abc0000000000023");

    let obs = store
        .create_observation(&project, None, "the decision that got stashed".into(), "manual".into(), Some("session-a".into()))
        .unwrap();

    let snapshot = ObservationSnapshot {
        observation_id: obs.id.clone(),
        content: obs.content.clone(),
        kind: None,
        timestamp: obs.created_at,
        embedding: None,
    };
    let stash = Stash {
        id: uuid::Uuid::new_v4().to_string(),
        project_hash: project.clone(),
        session_id: "session-a".to_string(),
        topic_label: "the decision that got stashed".to_string(),
        summary: "the decision that got stashed".to_string(),
        observations: vec![snapshot],
        created_at: chrono::Utc::now(),
        resumed_at: None,
        status: StashStatus::Stashed,
    };
    store.create_stash(&stash).unwrap();

    store.soft_delete_observation(&project, &obs.id).unwrap();
    assert!(store.get_observation(&project, &obs.id).unwrap().is_none(), "the source observation should now read as deleted");

    let resumed = store.list_stashes(&project, 10).unwrap();
    assert_eq!(resumed.len(), 1);
    assert_eq!(resumed[0].observations[0].content, "the decision that got stashed");
}

/// Replaying the event ring buffer from `lastId = N - 1` after N broadcasts
/// delivers exactly event N, never the events before it.
#[test]
fn replay_since_the_second_to_last_event_delivers_only_the_last_one() {
    let heartbeat = || laminark_core::broadcast::BroadcastEvent::Heartbeat { uptime_secs: 1, timestamp: chrono::Utc::now() };
    let broadcast = Broadcast::new();
    broadcast.publish(heartbeat());
    broadcast.publish(heartbeat());
    let last_id = broadcast.publish(heartbeat());

    let replayed = broadcast.replay_since(last_id - 1);
    assert_eq!(replayed.len(), 1);
    assert_eq!(replayed[0].id, last_id);
}
