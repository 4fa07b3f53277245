//! Crate-wide error type.
//!
//! Most degradation cases described by the error taxonomy do not reach this
//! type at all — callers get a smaller/keyword-only result instead of an
//! `Err`. This enum covers what's left: storage failures, bad input, and the
//! fatal case of a store that refuses to open.

use thiserror::Error;

/// Crate-wide error type.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("migration failed at version {version}: {source}")]
    Migration {
        version: u32,
        #[source]
        source: rusqlite::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unavailable: {0}")]
    Unavailable(&'static str),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
