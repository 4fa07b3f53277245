//! Relationship detection (§4.6 step c): infer typed edges between entities
//! that co-occur in the same high-signal observation. Deliberately simple —
//! proximity/co-occurrence plus a small set of type-pair rules, no parsing
//! of natural-language argument structure.

use crate::graph::extract::ExtractedEntity;
use crate::models::GraphEdgeType;

/// A candidate edge between two entities from the same extraction pass,
/// referenced by index into the slice passed to [`detect`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRelationship {
    pub source_index: usize,
    pub target_index: usize,
    pub edge_type: GraphEdgeType,
    pub weight: f32,
}

use crate::models::GraphNodeType as T;

fn rule_for(a: T, b: T) -> Option<(GraphEdgeType, f32, bool)> {
    // bool = whether (a, b) order matches (source, target) for this rule
    match (a, b) {
        (T::Tool, T::File) => Some((GraphEdgeType::Uses, 0.8, true)),
        (T::File, T::Tool) => Some((GraphEdgeType::Uses, 0.8, false)),
        (T::Problem, T::Solution) => Some((GraphEdgeType::SolvedBy, 0.75, true)),
        (T::Solution, T::Problem) => Some((GraphEdgeType::SolvedBy, 0.75, false)),
        (T::File, T::Decision) => Some((GraphEdgeType::DecidedBy, 0.6, true)),
        (T::Decision, T::File) => Some((GraphEdgeType::DecidedBy, 0.6, false)),
        (T::Problem, T::File) | (T::File, T::Problem) => Some((GraphEdgeType::CausedBy, 0.55, true)),
        _ => None,
    }
}

/// Pairwise co-occurrence over `entities`, already quality-gated and
/// deduplicated by the caller. `min_confidence` drops anything below the
/// configured edge-confidence floor (§4.6's `minEdgeConfidence`).
pub fn detect(entities: &[ExtractedEntity], min_confidence: f32) -> Vec<ExtractedRelationship> {
    let mut out = Vec::new();
    for i in 0..entities.len() {
        for j in (i + 1)..entities.len() {
            let a = &entities[i];
            let b = &entities[j];
            if a.node_type == b.node_type {
                continue;
            }
            let Some((edge_type, weight, forward)) = rule_for(a.node_type, b.node_type) else {
                continue;
            };
            if weight < min_confidence {
                continue;
            }
            let (source_index, target_index) = if forward { (i, j) } else { (j, i) };
            out.push(ExtractedRelationship { source_index, target_index, edge_type, weight });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(name: &str, node_type: T) -> ExtractedEntity {
        ExtractedEntity { name: name.to_string(), node_type, confidence: node_type.baseline_confidence(), span: (0, 0) }
    }

    #[test]
    fn tool_and_file_co_occurrence_yields_uses_edge() {
        let entities = vec![entity("Write", T::Tool), entity("src/lib.rs", T::File)];
        let rels = detect(&entities, 0.45);
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].edge_type, GraphEdgeType::Uses);
        assert_eq!(rels[0].source_index, 0);
        assert_eq!(rels[0].target_index, 1);
    }

    #[test]
    fn same_type_pair_is_never_related() {
        let entities = vec![entity("a.rs", T::File), entity("b.rs", T::File)];
        assert!(detect(&entities, 0.0).is_empty());
    }

    #[test]
    fn low_weight_edges_are_dropped_by_min_confidence() {
        let entities = vec![entity("something broke", T::Problem), entity("a.rs", T::File)];
        let rels = detect(&entities, 0.9);
        assert!(rels.is_empty());
    }
}
