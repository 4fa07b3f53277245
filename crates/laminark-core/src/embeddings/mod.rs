//! Embedding generation.
//!
//! Three backend variants (local ONNX inference, host-supplied piggyback
//! vectors, keyword-only no-op) plus a hybrid mode that wraps piggyback
//! around local and blends the two, unified behind [`EmbeddingWorker`] so
//! callers never need to know which is active.

pub mod local;
pub mod piggyback;
pub mod worker;

pub use local::{cosine_similarity, EmbeddingError, LocalEmbedder, EMBEDDING_DIMENSIONS};
pub use piggyback::PiggybackCache;
pub use worker::{EmbeddingBackend, EmbeddingWorker};
