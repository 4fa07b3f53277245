//! Embedding backend selection and the async wrapper around it.
//!
//! Embedding generation is CPU-bound (ONNX inference) and must never block
//! the async runtime or stall ingestion: every call runs on a blocking
//! thread under a 30s timeout. A timeout or backend failure yields `None`,
//! never an error — callers fall back to keyword-only search.

use super::local::{EmbeddingError, LocalEmbedder};
use super::piggyback::PiggybackCache;
use crate::config::EmbeddingMode;
use std::sync::Arc;
use std::time::Duration;

const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

/// One of the three embedding strategies named in the ambient config.
/// `Hybrid` is not a fourth strategy — it's `Piggyback` wrapping `Local`,
/// blending the two vectors rather than picking one.
pub enum EmbeddingBackend {
    Local(LocalEmbedder),
    Piggyback(Arc<PiggybackCache>),
    Hybrid(Arc<PiggybackCache>, LocalEmbedder),
    KeywordOnly,
}

impl EmbeddingBackend {
    pub fn for_mode(mode: EmbeddingMode, piggyback: Arc<PiggybackCache>) -> Self {
        match mode {
            EmbeddingMode::Local => EmbeddingBackend::Local(LocalEmbedder::new()),
            EmbeddingMode::Piggyback => EmbeddingBackend::Piggyback(piggyback),
            // Hybrid wraps the local backend: every embed call derives a
            // piggyback signal vector and blends it 70/30 with the local
            // dense vector, falling back to whichever side actually
            // produced a vector when the other one can't.
            EmbeddingMode::Hybrid => EmbeddingBackend::Hybrid(piggyback, LocalEmbedder::new()),
        }
    }

    pub fn dimensions(&self) -> usize {
        match self {
            EmbeddingBackend::Local(e) => e.dimensions(),
            EmbeddingBackend::Piggyback(c) => c.dimensions(),
            EmbeddingBackend::Hybrid(_, e) => e.dimensions(),
            EmbeddingBackend::KeywordOnly => 0,
        }
    }

    pub fn is_ready(&self) -> bool {
        match self {
            EmbeddingBackend::Local(e) => e.is_ready(),
            EmbeddingBackend::Piggyback(c) => c.is_ready(),
            EmbeddingBackend::Hybrid(c, e) => c.is_ready() || e.is_ready(),
            EmbeddingBackend::KeywordOnly => false,
        }
    }

    fn embed_sync(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        match self {
            EmbeddingBackend::Local(e) => e.embed(text),
            EmbeddingBackend::Piggyback(c) => c.embed(text),
            EmbeddingBackend::Hybrid(cache, local) => {
                let piggyback_vector = cache.embed(text);
                let dense_vector = local.embed(text);
                match (piggyback_vector, dense_vector) {
                    (Ok(p), Ok(d)) => Ok(super::piggyback::blend(&p, &d)),
                    (Ok(p), Err(_)) => Ok(p),
                    (Err(_), Ok(d)) => Ok(d),
                    (Err(e), Err(_)) => Err(e),
                }
            }
            EmbeddingBackend::KeywordOnly => {
                Err(EmbeddingError::InvalidInput("keyword-only mode has no embedder".into()))
            }
        }
    }
}

/// Shared handle to the embedding backend, cheap to clone and safe to hold
/// across the background sweep loop and every tool call.
#[derive(Clone)]
pub struct EmbeddingWorker {
    backend: Arc<EmbeddingBackend>,
}

impl EmbeddingWorker {
    pub fn new(mode: EmbeddingMode, piggyback: Arc<PiggybackCache>) -> Self {
        Self { backend: Arc::new(EmbeddingBackend::for_mode(mode, piggyback)) }
    }

    pub fn dimensions(&self) -> usize {
        self.backend.dimensions()
    }

    pub fn is_ready(&self) -> bool {
        self.backend.is_ready()
    }

    /// Embed `text`, off the async runtime, bounded by a 30s timeout.
    /// Returns `None` on any failure or timeout rather than propagating an
    /// error — embedding is always an optional enhancement over keyword
    /// search, never a required step.
    pub async fn embed(&self, text: String) -> Option<Vec<f32>> {
        let backend = self.backend.clone();
        let task = tokio::task::spawn_blocking(move || backend.embed_sync(&text));
        match tokio::time::timeout(EMBED_TIMEOUT, task).await {
            Ok(Ok(Ok(vector))) => Some(vector),
            Ok(Ok(Err(e))) => {
                tracing::debug!("embedding unavailable: {e}");
                None
            }
            Ok(Err(e)) => {
                tracing::warn!("embedding task panicked: {e}");
                None
            }
            Err(_) => {
                tracing::warn!("embedding timed out after {EMBED_TIMEOUT:?}");
                None
            }
        }
    }

    /// Same contract as [`EmbeddingWorker::embed`], for callers with no
    /// tokio runtime to spawn onto (the `hook` binary's request domain runs
    /// fully synchronously). Bounds the embed call with the same timeout
    /// via a plain OS thread rather than `tokio::task::spawn_blocking`.
    pub fn embed_blocking(&self, text: &str) -> Option<Vec<f32>> {
        let backend = self.backend.clone();
        let text = text.to_string();
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(backend.embed_sync(&text));
        });
        match rx.recv_timeout(EMBED_TIMEOUT) {
            Ok(Ok(vector)) => Some(vector),
            Ok(Err(e)) => {
                tracing::debug!("embedding unavailable: {e}");
                None
            }
            Err(_) => {
                tracing::warn!("embedding timed out after {EMBED_TIMEOUT:?}");
                None
            }
        }
    }
}
