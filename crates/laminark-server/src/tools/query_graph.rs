//! `query_graph`: search entities by name, then traverse the neighborhood
//! of the best match up to a caller-chosen depth.
//!
//! Grounded on the teacher's `tools::graph` schema/execute shape, rebuilt
//! over the typed knowledge graph this crate builds instead of the
//! teacher's FSRS association graph. `find_graph_nodes` already orders
//! exact-name matches first, so entity lookup here is "exact then fuzzy"
//! for free.

use laminark_core::budget::truncate_chars_at_line_boundary;
use laminark_core::config::Config;
use laminark_core::models::{GraphEdgeType, GraphNodeType};
use laminark_core::project::ProjectHash;
use laminark_core::storage::Store;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

const ENTITY_LIMIT: usize = 10;
const MAX_EXCERPTS: usize = 10;
const EXCERPT_CHARS: usize = 200;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "query": { "type": "string", "description": "Entity name to search for" },
            "entityType": {
                "type": "string",
                "enum": ["file", "project", "decision", "problem", "solution", "tool", "reference", "person"]
            },
            "depth": {
                "type": "integer",
                "description": "Neighborhood traversal depth",
                "default": 1,
                "minimum": 1,
                "maximum": 4
            },
            "edgeTypes": {
                "type": "array",
                "items": {
                    "type": "string",
                    "enum": ["uses", "depends_on", "decided_by", "related_to", "part_of", "caused_by", "solved_by"]
                }
            }
        },
        "required": ["query"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryGraphArgs {
    query: String,
    entity_type: Option<String>,
    #[serde(default = "default_depth")]
    depth: usize,
    edge_types: Option<Vec<String>>,
}

fn default_depth() -> usize {
    1
}

pub fn execute(
    store: &Arc<Store>,
    project: &ProjectHash,
    _config: &Config,
    args: Option<Value>,
) -> Result<Value, String> {
    let args: QueryGraphArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {e}"))?,
        None => return Err("Missing arguments".to_string()),
    };
    if args.query.trim().is_empty() {
        return Err("query cannot be empty".to_string());
    }
    let depth = args.depth.clamp(1, 4);

    let node_type = match &args.entity_type {
        Some(s) => Some(GraphNodeType::parse(s).ok_or_else(|| format!("Unknown entityType '{s}'"))?),
        None => None,
    };
    let edge_types = match &args.edge_types {
        Some(list) => Some(
            list.iter()
                .map(|s| GraphEdgeType::parse(s).ok_or_else(|| format!("Unknown edge type '{s}'")))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        None => None,
    };

    let entities = store.find_graph_nodes(project, &args.query, node_type, ENTITY_LIMIT).map_err(|e| e.to_string())?;
    if entities.is_empty() {
        return Ok(serde_json::json!({
            "query": args.query,
            "entities": [],
            "neighborhood": { "nodes": [], "edges": [] },
            "excerpts": [],
        }));
    }

    let best = &entities[0];
    let (neighbor_nodes, neighbor_edges) = store
        .neighbors(&best.id, depth, edge_types.as_deref())
        .map_err(|e| e.to_string())?;

    let mut excerpt_observation_ids: Vec<&String> = entities.iter().flat_map(|n| n.observation_ids.iter()).collect();
    excerpt_observation_ids.truncate(MAX_EXCERPTS);

    let mut excerpts = Vec::with_capacity(excerpt_observation_ids.len());
    for id in excerpt_observation_ids {
        if let Some(observation) = store.get_observation(project, id).map_err(|e| e.to_string())? {
            excerpts.push(serde_json::json!({
                "observationId": observation.id,
                "excerpt": truncate_chars_at_line_boundary(&observation.content, EXCERPT_CHARS),
            }));
        }
    }

    Ok(serde_json::json!({
        "query": args.query,
        "entities": entities.iter().map(entity_to_json).collect::<Vec<_>>(),
        "neighborhood": {
            "nodes": neighbor_nodes.iter().map(entity_to_json).collect::<Vec<_>>(),
            "edges": neighbor_edges.iter().map(|e| serde_json::json!({
                "id": e.id,
                "sourceId": e.source_id,
                "targetId": e.target_id,
                "edgeType": e.edge_type.as_str(),
                "weight": e.weight,
            })).collect::<Vec<_>>(),
        },
        "excerpts": excerpts,
    }))
}

fn entity_to_json(node: &laminark_core::models::GraphNode) -> Value {
    serde_json::json!({
        "id": node.id,
        "name": node.name,
        "nodeType": node.node_type.as_str(),
        "observationCount": node.observation_ids.len(),
    })
}
