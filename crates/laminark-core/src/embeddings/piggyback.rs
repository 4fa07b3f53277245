//! Piggyback embedding backend.
//!
//! Laminark never calls an external embedding API itself. In piggyback mode
//! it first reuses vectors the host agent already computed for its own
//! retrieval calls — submitted via [`PiggybackCache::submit`] — and, when
//! nothing was submitted for a given text, falls back to a cheap heuristic
//! vector derived from the text itself (file extensions touched, error and
//! decision keyword hits) rather than failing outright.

use super::local::EmbeddingError;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Keyword/extension buckets the heuristic derivation hashes into fixed
/// slots of the output vector. Order only matters in that it is stable
/// across calls — changing it reshuffles which slot a signal lands in but
/// doesn't change the method's behavior.
const DECISION_KEYWORDS: &[&str] = &["decided", "decision", "chose", "because", "rationale", "plan"];
const PROBLEM_KEYWORDS: &[&str] = &["error", "failed", "exception", "panic", "bug", "crash"];
const WATCHED_EXTENSIONS: &[&str] =
    &[".rs", ".py", ".js", ".ts", ".go", ".java", ".rb", ".md", ".toml", ".json", ".yaml", ".yml", ".sql"];

/// Weight given to the wrapped backend's dense vector when [`blend`]s a
/// piggyback-derived vector with it. The piggyback side gets the remainder.
const WRAPPED_BACKEND_WEIGHT: f32 = 0.7;

/// LRU cache of externally-supplied vectors, keyed by exact text match,
/// with a heuristic fallback for text nobody submitted a vector for.
pub struct PiggybackCache {
    entries: Mutex<LruCache<String, Vec<f32>>>,
    dimensions: usize,
}

impl PiggybackCache {
    pub fn new(dimensions: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(NonZeroUsize::new(256).unwrap())),
            dimensions,
        }
    }

    /// Record a vector the host agent computed for `text`.
    pub fn submit(&self, text: &str, vector: Vec<f32>) {
        if vector.len() != self.dimensions {
            tracing::warn!(
                "piggyback vector for {:.40} has {} dims, expected {}",
                text,
                vector.len(),
                self.dimensions
            );
            return;
        }
        self.entries.lock().expect("piggyback cache lock poisoned").put(text.to_string(), vector);
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// An exact-match submitted vector if one exists, otherwise a vector
    /// heuristically derived from `text`'s own content. Only errors on
    /// empty input — once past that, this never fails.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::InvalidInput("text cannot be empty".into()));
        }
        if let Some(vector) = self.entries.lock().expect("piggyback cache lock poisoned").get(text).cloned() {
            return Ok(vector);
        }
        Ok(derive_signal_vector(text, self.dimensions))
    }

    /// A submission has actually been recorded, so an exact-match lookup is
    /// possible. The heuristic fallback in [`PiggybackCache::embed`] works
    /// regardless, but callers checking readiness want to know whether any
    /// real host-supplied vectors are in play.
    pub fn is_ready(&self) -> bool {
        !self.entries.lock().expect("piggyback cache lock poisoned").is_empty()
    }
}

/// Derive a sparse signal vector from `text`: each keyword or extension hit
/// bumps one slot of a zero vector, which is then L2-normalized. Distinct
/// texts sharing no signals are orthogonal; texts sharing signals land
/// closer together than two arbitrary vectors would, which is the most a
/// heuristic fallback can promise without running a real model.
fn derive_signal_vector(text: &str, dimensions: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dimensions.max(1)];
    let lower = text.to_lowercase();

    let mut bump = |slot: usize| {
        if !vector.is_empty() {
            vector[slot % vector.len()] += 1.0;
        }
    };

    for (i, kw) in DECISION_KEYWORDS.iter().enumerate() {
        if lower.contains(kw) {
            bump(i);
        }
    }
    for (i, kw) in PROBLEM_KEYWORDS.iter().enumerate() {
        if lower.contains(kw) {
            bump(DECISION_KEYWORDS.len() + i);
        }
    }
    for (i, ext) in WATCHED_EXTENSIONS.iter().enumerate() {
        if lower.contains(ext) {
            bump(DECISION_KEYWORDS.len() + PROBLEM_KEYWORDS.len() + i);
        }
    }

    if dimensions == 0 {
        return Vec::new();
    }
    normalize(vector)
}

/// Blend a piggyback vector with another backend's dense vector, 70/30 in
/// the dense vector's favor, then renormalize to unit length. Vectors of
/// unequal length (the dense backend runs at a different dimensionality
/// than this cache was configured for) can't be blended; the dense vector
/// wins in that case since it carries more genuine signal.
pub fn blend(piggyback: &[f32], dense: &[f32]) -> Vec<f32> {
    if piggyback.len() != dense.len() {
        return dense.to_vec();
    }
    let blended: Vec<f32> = piggyback
        .iter()
        .zip(dense.iter())
        .map(|(p, d)| (1.0 - WRAPPED_BACKEND_WEIGHT) * p + WRAPPED_BACKEND_WEIGHT * d)
        .collect();
    normalize(blended)
}

fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_then_embed_round_trips() {
        let cache = PiggybackCache::new(3);
        cache.submit("hello", vec![0.1, 0.2, 0.3]);
        assert_eq!(cache.embed("hello").unwrap(), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn embed_without_submission_derives_a_heuristic_vector() {
        let cache = PiggybackCache::new(32);
        let vector = cache.embed("Decided to use SQLite because of simplicity").unwrap();
        assert_eq!(vector.len(), 32);
        assert!(vector.iter().any(|x| *x != 0.0), "derived vector should have at least one non-zero signal");
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.0001, "derived vector should be unit length");
    }

    #[test]
    fn embed_of_empty_text_errors() {
        let cache = PiggybackCache::new(3);
        assert!(cache.embed("").is_err());
    }

    #[test]
    fn submit_rejects_wrong_dimensions_but_embed_still_falls_through_to_heuristic() {
        let cache = PiggybackCache::new(3);
        cache.submit("bad", vec![0.1, 0.2]);
        assert_eq!(cache.embed("bad").unwrap().len(), 3);
    }

    #[test]
    fn texts_sharing_no_signals_derive_to_distinct_vectors() {
        let cache = PiggybackCache::new(32);
        let a = cache.embed("touched auth.rs").unwrap();
        let b = cache.embed("ran a totally unrelated shell command").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn blend_weights_the_dense_vector_more_heavily() {
        let piggyback = vec![1.0, 0.0];
        let dense = vec![0.0, 1.0];
        let blended = blend(&piggyback, &dense);
        assert!(blended[1] > blended[0], "dense vector carries 70% of the weight");
    }

    #[test]
    fn blend_of_mismatched_lengths_falls_back_to_dense() {
        let piggyback = vec![1.0, 0.0, 0.0];
        let dense = vec![0.0, 1.0];
        assert_eq!(blend(&piggyback, &dense), dense);
    }
}
