//! `graph_stats`: health dashboard over the typed knowledge graph.
//!
//! Grounded on the teacher's `tools::health` shape, rebuilt over the
//! per-project counters `Store` already exposes (`graph_stats_raw`,
//! `node_type_distribution`, `degree_stats`, `hotspot_nodes`,
//! `duplicate_node_candidates`).

use laminark_core::config::Config;
use laminark_core::project::ProjectHash;
use laminark_core::storage::Store;
use serde_json::Value;
use std::sync::Arc;

const HOTSPOT_LIMIT: usize = 5;
/// An edge past this fraction of its configured max age is flagged stale —
/// still alive, but due for a curation pass before it would be deleted.
const STALENESS_AGE_FRACTION: f64 = 0.8;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {}
    })
}

pub fn execute(
    store: &Arc<Store>,
    project: &ProjectHash,
    config: &Config,
    _args: Option<Value>,
) -> Result<Value, String> {
    let (node_count, edge_count) = store.graph_stats_raw(project).map_err(|e| e.to_string())?;
    let type_distribution = store.node_type_distribution(project).map_err(|e| e.to_string())?;
    let (avg_degree, max_degree) = store.degree_stats(project).map_err(|e| e.to_string())?;
    let hotspots = store.hotspot_nodes(project, HOTSPOT_LIMIT).map_err(|e| e.to_string())?;
    let duplicates = store.duplicate_node_candidates(project).map_err(|e| e.to_string())?;

    let staleness_threshold_days = config.graph.max_age_days as f64 * STALENESS_AGE_FRACTION;

    Ok(serde_json::json!({
        "nodeCount": node_count,
        "edgeCount": edge_count,
        "typeDistribution": type_distribution.into_iter().map(|(t, c)| serde_json::json!({"nodeType": t, "count": c})).collect::<Vec<_>>(),
        "averageDegree": avg_degree,
        "maxDegree": max_degree,
        "hotspots": hotspots.iter().map(|(n, degree)| serde_json::json!({
            "id": n.id, "name": n.name, "nodeType": n.node_type.as_str(), "degree": degree,
        })).collect::<Vec<_>>(),
        "duplicateCandidates": duplicates.iter().map(|(a, b)| serde_json::json!({
            "canonical": { "id": a.id, "name": a.name },
            "duplicate": { "id": b.id, "name": b.name },
        })).collect::<Vec<_>>(),
        "stalenessFlags": {
            "ageThresholdDays": staleness_threshold_days,
            "note": "edges older than this fraction of maxAgeDays are due for the next curation pass",
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use laminark_core::config::Config;

    fn setup() -> (Arc<Store>, ProjectHash, Config, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path().join("test.db")).unwrap());
        (store, ProjectHash::from_raw("abc0000000000014"), Config::default(), dir)
    }

    #[test]
    fn reports_zero_counts_on_an_empty_graph() {
        let (store, project, config, _dir) = setup();
        let result = execute(&store, &project, &config, None).unwrap();
        assert_eq!(result["nodeCount"], 0);
        assert_eq!(result["edgeCount"], 0);
    }

    #[test]
    fn counts_nodes_after_an_upsert() {
        let (store, project, config, _dir) = setup();
        let obs = store.create_observation(&project, None, "x".into(), "manual".into(), None).unwrap();
        store
            .upsert_graph_node(&project, "src/lib.rs", laminark_core::models::GraphNodeType::File, &obs.id, serde_json::json!({}))
            .unwrap();
        let result = execute(&store, &project, &config, None).unwrap();
        assert_eq!(result["nodeCount"], 1);
    }
}
