//! GraphPipeline (§4.6): wires extraction, the quality gate, relationship
//! detection, and the Store's own decay/curation primitives into the single
//! entry point the orchestrator's background loops call.

use crate::broadcast::{Broadcast, BroadcastEvent};
use crate::config::GraphConfig;
use crate::error::Result;
use crate::graph::extract::{self, ExtractedEntity};
use crate::graph::relationships;
use crate::models::{GraphNodeType, Observation};
use crate::project::ProjectHash;
use crate::storage::Store;
use chrono::Utc;

const MAX_FILE_NODES_PER_OBSERVATION: usize = 5;
const NON_CHANGE_FILE_CONFIDENCE_MULTIPLIER: f32 = 0.74;
const MIN_ENTITY_NAME_LEN: usize = 3;
const MAX_ENTITY_NAME_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalLevel {
    /// Pure navigation: no extraction at all.
    Skip,
    /// Entities only, no relationship detection.
    Medium,
    /// Full treatment: entities and relationships.
    High,
}

fn signal_gate(tool_name: Option<&str>) -> SignalLevel {
    match tool_name {
        Some("Read") | Some("Glob") | Some("Grep") => SignalLevel::Skip,
        Some("Write") | Some("Edit") | Some("MultiEdit") | Some("NotebookEdit") => SignalLevel::High,
        _ => SignalLevel::Medium,
    }
}

/// Resolve overlapping same-type spans (keep the higher-confidence one),
/// apply the non-change File-path discount, enforce name length bounds and
/// the configured per-type confidence floor, then cap File nodes.
fn quality_gate(mut entities: Vec<ExtractedEntity>, config: &GraphConfig, is_change_observation: bool) -> Vec<ExtractedEntity> {
    entities.sort_by(|a, b| a.span.0.cmp(&b.span.0).then(b.confidence.partial_cmp(&a.confidence).unwrap()));
    let mut resolved: Vec<ExtractedEntity> = Vec::with_capacity(entities.len());
    for entity in entities {
        let overlaps = resolved.iter().any(|kept: &ExtractedEntity| {
            kept.node_type == entity.node_type && kept.span.0 < entity.span.1 && entity.span.0 < kept.span.1
        });
        if !overlaps {
            resolved.push(entity);
        }
    }

    for entity in &mut resolved {
        if entity.node_type == GraphNodeType::File && !is_change_observation {
            entity.confidence *= NON_CHANGE_FILE_CONFIDENCE_MULTIPLIER;
        }
    }

    resolved.retain(|e| {
        let len = e.name.chars().count();
        len >= MIN_ENTITY_NAME_LEN && len <= MAX_ENTITY_NAME_LEN && e.confidence >= config.min_confidence_for(e.node_type)
    });

    let mut file_count = 0;
    resolved.retain(|e| {
        if e.node_type != GraphNodeType::File {
            return true;
        }
        file_count += 1;
        file_count <= MAX_FILE_NODES_PER_OBSERVATION
    });

    resolved
}

pub struct GraphPipeline {
    config: GraphConfig,
}

impl GraphPipeline {
    pub fn new(config: GraphConfig) -> Self {
        Self { config }
    }

    /// Extract entities (and, for high-signal observations, relationships)
    /// from `observation` and persist them. Skipped observations and those
    /// yielding nothing past the quality gate are a no-op, not an error.
    pub fn process_observation(
        &self,
        store: &Store,
        broadcast: &Broadcast,
        project: &ProjectHash,
        observation: &Observation,
    ) -> Result<()> {
        let tool_name = observation.source.strip_prefix("hook:");
        let level = signal_gate(tool_name);
        if level == SignalLevel::Skip {
            return Ok(());
        }

        let is_change_observation =
            matches!(tool_name, Some("Write") | Some("Edit") | Some("MultiEdit") | Some("NotebookEdit"));
        let raw = extract::extract(&observation.content);
        let gated = quality_gate(raw, &self.config, is_change_observation);
        if gated.is_empty() {
            return Ok(());
        }

        let mut node_ids = Vec::with_capacity(gated.len());
        for entity in &gated {
            let node = store.upsert_graph_node(
                project,
                &entity.name,
                entity.node_type,
                &observation.id,
                serde_json::json!({"confidence": entity.confidence}),
            )?;
            broadcast.publish(BroadcastEvent::EntityUpdated {
                node_id: node.id.clone(),
                node_name: node.name.clone(),
                timestamp: Utc::now(),
            });
            node_ids.push(node.id);
        }

        if level == SignalLevel::High {
            for rel in relationships::detect(&gated, self.config.min_edge_confidence) {
                store.insert_graph_edge(
                    project,
                    &node_ids[rel.source_index],
                    &node_ids[rel.target_index],
                    rel.edge_type,
                    rel.weight,
                    None,
                    self.config.max_degree,
                )?;
            }
        }

        Ok(())
    }

    /// Periodic decay-then-dedup sweep (§4.6 step e): exponential weight
    /// decay and stale-edge deletion, followed by a merge pass over
    /// name-similarity duplicate candidates. Run on a single background
    /// loop tick, never concurrently with another curation pass.
    pub fn curate(&self, store: &Store, project: &ProjectHash) -> Result<CurationReport> {
        let (decayed, deleted) = store.apply_edge_decay(
            self.config.half_life_days,
            self.config.decay_floor,
            self.config.delete_threshold,
            self.config.max_age_days,
        )?;

        let mut merged = 0;
        for (canonical, duplicate) in store.duplicate_node_candidates(project)? {
            store.merge_nodes(&canonical.id, &duplicate.id)?;
            merged += 1;
        }

        Ok(CurationReport { edges_decayed: decayed, edges_deleted: deleted, nodes_merged: merged })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CurationReport {
    pub edges_decayed: usize,
    pub edges_deleted: usize,
    pub nodes_merged: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::Broadcast;
    use crate::config::GraphConfig;

    fn obs(store: &Store, project: &ProjectHash, content: &str, source: &str) -> Observation {
        store.create_observation(project, None, content.to_string(), source.to_string(), None).unwrap()
    }

    fn setup() -> (GraphPipeline, Store, Broadcast, ProjectHash, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("test.db")).unwrap();
        (GraphPipeline::new(GraphConfig::default()), store, Broadcast::new(), ProjectHash::from_raw("abc0000000000004"), dir)
    }

    #[test]
    fn read_tool_is_skipped_entirely() {
        let (pipeline, store, broadcast, project, _dir) = setup();
        let observation = obs(&store, &project, "Read src/lib.rs", "hook:Read");
        pipeline.process_observation(&store, &broadcast, &project, &observation).unwrap();
        assert!(store.find_graph_nodes(&project, "lib.rs", None, 10).unwrap().is_empty());
    }

    #[test]
    fn write_tool_extracts_a_file_node() {
        let (pipeline, store, broadcast, project, _dir) = setup();
        let observation = obs(&store, &project, "Write src/lib.rs content", "hook:Write");
        pipeline.process_observation(&store, &broadcast, &project, &observation).unwrap();
        let nodes = store.find_graph_nodes(&project, "lib.rs", None, 10).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].node_type, GraphNodeType::File);
    }

    #[test]
    fn write_tool_links_tool_and_file_with_an_edge() {
        let (pipeline, store, broadcast, project, _dir) = setup();
        let observation = obs(&store, &project, "Write src/lib.rs content, using Bash too", "hook:Write");
        pipeline.process_observation(&store, &broadcast, &project, &observation).unwrap();
        let file_node = &store.find_graph_nodes(&project, "lib.rs", None, 10).unwrap()[0];
        assert!(store.node_degree(&file_node.id).unwrap() > 0);
    }

    #[test]
    fn more_than_five_file_paths_are_capped() {
        let content = (0..8).map(|i| format!("file{i}.rs")).collect::<Vec<_>>().join(" ");
        let (pipeline, store, broadcast, project, _dir) = setup();
        let observation = obs(&store, &project, &content, "hook:Write");
        pipeline.process_observation(&store, &broadcast, &project, &observation).unwrap();
        let mut total = 0;
        for i in 0..8 {
            total += store.find_graph_nodes(&project, &format!("file{i}.rs"), None, 10).unwrap().len();
        }
        assert!(total <= MAX_FILE_NODES_PER_OBSERVATION);
    }

    #[test]
    fn curate_runs_without_error_on_an_empty_graph() {
        let (pipeline, store, _broadcast, project, _dir) = setup();
        let report = pipeline.curate(&store, &project).unwrap();
        assert_eq!(report.nodes_merged, 0);
    }

    #[test]
    fn a_per_type_floor_above_baseline_confidence_rejects_that_type_outright() {
        let mut config = GraphConfig::default();
        config.min_confidence_by_type.insert(GraphNodeType::Reference, 0.99);
        let pipeline = GraphPipeline::new(config);

        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("test.db")).unwrap();
        let broadcast = Broadcast::new();
        let project = ProjectHash::from_raw("abc0000000000009");
        let observation = obs(&store, &project, "see https://example.com/docs for details", "hook:Write");

        pipeline.process_observation(&store, &broadcast, &project, &observation).unwrap();
        assert!(store.find_graph_nodes(&project, "example.com", None, 10).unwrap().is_empty());
    }
}
