//! # Laminark Core
//!
//! Local-first memory and context infrastructure for a coding agent: event
//! admission and redaction, session tracking, hybrid keyword+vector search,
//! topic-shift detection with context stashing, and a typed knowledge graph
//! with temporal decay.
//!
//! Everything here is process-local. Nothing phones home; the only
//! persistence is the project-scoped SQLite database under the data
//! directory [`config::Config::load`] resolves.
//!
//! ## Feature flags
//!
//! - `embeddings` (default): local ONNX embedding generation via `fastembed`.
//! - `vector-search` (default): HNSW vector search via `usearch`.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod broadcast;
pub mod budget;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod hooks;
pub mod models;
pub mod orchestrator;
pub mod project;
pub mod redaction;
pub mod storage;
pub mod topic;

#[cfg(feature = "embeddings")]
#[cfg_attr(docsrs, doc(cfg(feature = "embeddings")))]
pub mod embeddings;

#[cfg(feature = "vector-search")]
#[cfg_attr(docsrs, doc(cfg(feature = "vector-search")))]
pub mod search;

pub use broadcast::{Broadcast, BroadcastEvent, Envelope};
pub use config::Config;
pub use error::{Error, Result};
pub use graph::{CurationReport, GraphPipeline};
pub use hooks::{HookIngest, HookOutcome};
pub use models::{
    GraphEdge, GraphEdgeType, GraphNode, GraphNodeType, HookEvent, Observation,
    ObservationClassification, ObservationKind, ObservationSnapshot, SearchMatchType, SearchResult,
    Session, SessionEventKind, ShiftDecision, Stash, StashStatus, ToolRegistryEntry, ToolScope,
    ToolType, ToolUsageEvent,
};
pub use orchestrator::Orchestrator;
pub use project::ProjectHash;
pub use storage::{ListFilters, Store};
pub use topic::TopicDetector;

#[cfg(feature = "embeddings")]
pub use embeddings::{cosine_similarity, EmbeddingBackend, EmbeddingWorker, EMBEDDING_DIMENSIONS};

#[cfg(feature = "vector-search")]
pub use search::{hybrid_search, HybridSearchConfig, HybridSearcher, VectorIndex};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::{
        Broadcast, BroadcastEvent, Config, Error, GraphPipeline, HookEvent, HookIngest,
        HookOutcome, Observation, ProjectHash, Result, Store, TopicDetector,
    };

    #[cfg(feature = "embeddings")]
    pub use crate::{EmbeddingWorker, EMBEDDING_DIMENSIONS};

    #[cfg(feature = "vector-search")]
    pub use crate::{hybrid_search, HybridSearcher};
}
