//! Storage layer.
//!
//! SQLite-backed with FTS5 full-text search, an optional HNSW vector index,
//! and project-scoped repositories over a numbered migration sequence.

mod migrations;
mod sqlite;

pub use migrations::{get_current_version, Migration, MIGRATIONS};
pub use sqlite::{ListFilters, Store};
