//! Search.
//!
//! Keyword search (FTS5/BM25) and vector search (HNSW) fused by Reciprocal
//! Rank Fusion. No query expansion stage — the fusion constant (k=60) and
//! weighting already match what two independently strong rankers need.

pub mod hybrid;
pub mod vector;

pub use hybrid::{reciprocal_rank_fusion, HybridSearchConfig, HybridSearcher};
pub use vector::{
    VectorIndex, VectorIndexConfig, VectorIndexStats, VectorSearchError, DEFAULT_CONNECTIVITY,
    DEFAULT_DIMENSIONS,
};

use crate::error::Result;
use crate::models::{SearchMatchType, SearchResult};
use crate::project::ProjectHash;
use crate::storage::Store;
use std::collections::HashMap;

/// Keyword + vector search, fused by RRF, degrading gracefully to
/// keyword-only when no query vector is available (no embedding backend,
/// or the embed call hasn't completed within its timeout).
pub fn hybrid_search(
    store: &Store,
    project: &ProjectHash,
    query: &str,
    query_vector: Option<&[f32]>,
    limit: usize,
) -> Result<Vec<SearchResult>> {
    let searcher = HybridSearcher::new();
    let source_limit = searcher.effective_source_limit(limit);

    let keyword_hits = store.keyword_search(project, query, source_limit)?;
    let keyword_ranked: Vec<(String, f32)> =
        keyword_hits.iter().map(|(obs, score, _)| (obs.id.clone(), *score)).collect();
    let snippets: HashMap<String, String> = keyword_hits
        .iter()
        .filter_map(|(obs, _, snippet)| snippet.clone().map(|s| (obs.id.clone(), s)))
        .collect();

    #[cfg(feature = "vector-search")]
    let vector_ranked: Vec<(String, f32)> = match query_vector {
        Some(v) if store.has_vector_support() => store.vector_search(v, source_limit)?,
        _ => Vec::new(),
    };
    #[cfg(not(feature = "vector-search"))]
    let vector_ranked: Vec<(String, f32)> = Vec::new();

    let fused = if vector_ranked.is_empty() {
        keyword_ranked
            .iter()
            .enumerate()
            .map(|(rank, (id, _))| (id.clone(), 1.0 / (60.0 + rank as f32)))
            .collect::<Vec<_>>()
    } else {
        searcher.fuse_rrf(&keyword_ranked, &vector_ranked)
    };

    let keyword_ids: std::collections::HashSet<&String> =
        keyword_ranked.iter().map(|(id, _)| id).collect();
    let vector_ids: std::collections::HashSet<&String> =
        vector_ranked.iter().map(|(id, _)| id).collect();

    let mut results = Vec::with_capacity(limit.min(fused.len()));
    for (id, score) in fused.into_iter().take(limit) {
        let Some(observation) = store.get_observation(project, &id)? else {
            continue;
        };
        let match_type = match (keyword_ids.contains(&id), vector_ids.contains(&id)) {
            (true, true) => SearchMatchType::Hybrid,
            (true, false) => SearchMatchType::Fts,
            (false, true) => SearchMatchType::Vector,
            (false, false) => SearchMatchType::Hybrid,
        };
        results.push(SearchResult {
            observation,
            score,
            match_type,
            snippet: snippets.get(&id).cloned(),
        });
    }
    Ok(results)
}
