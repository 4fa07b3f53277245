//! Database migrations.
//!
//! Each migration is an idempotent, additive SQL batch applied inside a
//! transaction (`execute_batch`). A `schema_version` table tracks what has
//! already run so a fresh database and an already-migrated one converge to
//! the same schema.

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "initial schema: observations, sessions, FTS5 index",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "stashes, shift decisions, notifications",
        up: MIGRATION_V2_UP,
    },
    Migration {
        version: 3,
        description: "graph nodes and edges",
        up: MIGRATION_V3_UP,
    },
    Migration {
        version: 4,
        description: "tool registry and usage events",
        up: MIGRATION_V4_UP,
    },
];

#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS observations (
    id TEXT PRIMARY KEY,
    project_hash TEXT NOT NULL,
    title TEXT,
    content TEXT NOT NULL,
    source TEXT NOT NULL,
    session_id TEXT,
    embedding BLOB,
    embedding_model TEXT,
    classification TEXT,
    kind TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_observations_project ON observations(project_hash);
CREATE INDEX IF NOT EXISTS idx_observations_session ON observations(session_id);
CREATE INDEX IF NOT EXISTS idx_observations_created ON observations(created_at);
CREATE INDEX IF NOT EXISTS idx_observations_deleted ON observations(deleted_at);

CREATE VIRTUAL TABLE IF NOT EXISTS observation_fts USING fts5(
    id UNINDEXED,
    title,
    content,
    content='observations',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS observations_ai AFTER INSERT ON observations BEGIN
    INSERT INTO observation_fts(rowid, id, title, content)
    VALUES (NEW.rowid, NEW.id, NEW.title, NEW.content);
END;

CREATE TRIGGER IF NOT EXISTS observations_ad AFTER DELETE ON observations BEGIN
    INSERT INTO observation_fts(observation_fts, rowid, id, title, content)
    VALUES ('delete', OLD.rowid, OLD.id, OLD.title, OLD.content);
END;

CREATE TRIGGER IF NOT EXISTS observations_au AFTER UPDATE ON observations BEGIN
    INSERT INTO observation_fts(observation_fts, rowid, id, title, content)
    VALUES ('delete', OLD.rowid, OLD.id, OLD.title, OLD.content);
    INSERT INTO observation_fts(rowid, id, title, content)
    VALUES (NEW.rowid, NEW.id, NEW.title, NEW.content);
END;

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    project_hash TEXT NOT NULL,
    started_at TEXT NOT NULL,
    ended_at TEXT,
    summary TEXT
);

CREATE INDEX IF NOT EXISTS idx_sessions_project ON sessions(project_hash);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);

INSERT INTO schema_version (version, applied_at) VALUES (1, datetime('now'));
"#;

const MIGRATION_V2_UP: &str = r#"
CREATE TABLE IF NOT EXISTS stashes (
    id TEXT PRIMARY KEY,
    project_hash TEXT NOT NULL,
    session_id TEXT NOT NULL,
    topic_label TEXT NOT NULL,
    summary TEXT NOT NULL,
    observations_json TEXT NOT NULL,
    created_at TEXT NOT NULL,
    resumed_at TEXT,
    status TEXT NOT NULL DEFAULT 'stashed'
);

CREATE INDEX IF NOT EXISTS idx_stashes_project ON stashes(project_hash);
CREATE INDEX IF NOT EXISTS idx_stashes_created ON stashes(created_at);

CREATE TABLE IF NOT EXISTS shift_decisions (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    distance REAL NOT NULL,
    threshold REAL NOT NULL,
    shifted INTEGER NOT NULL,
    confidence REAL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_shift_decisions_session ON shift_decisions(session_id);

CREATE TABLE IF NOT EXISTS notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_hash TEXT NOT NULL,
    text TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notifications_project ON notifications(project_hash);

INSERT INTO schema_version (version, applied_at) VALUES (2, datetime('now'));
"#;

const MIGRATION_V3_UP: &str = r#"
CREATE TABLE IF NOT EXISTS graph_nodes (
    id TEXT PRIMARY KEY,
    project_hash TEXT NOT NULL,
    name TEXT NOT NULL,
    node_type TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    observation_ids TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(project_hash, name, node_type)
);

CREATE INDEX IF NOT EXISTS idx_graph_nodes_project ON graph_nodes(project_hash);
CREATE INDEX IF NOT EXISTS idx_graph_nodes_type ON graph_nodes(node_type);

CREATE TABLE IF NOT EXISTS graph_edges (
    id TEXT PRIMARY KEY,
    project_hash TEXT NOT NULL,
    source_id TEXT NOT NULL REFERENCES graph_nodes(id) ON DELETE CASCADE,
    target_id TEXT NOT NULL REFERENCES graph_nodes(id) ON DELETE CASCADE,
    edge_type TEXT NOT NULL,
    weight REAL NOT NULL DEFAULT 1.0,
    created_at TEXT NOT NULL,
    metadata TEXT
);

CREATE INDEX IF NOT EXISTS idx_graph_edges_project ON graph_edges(project_hash);
CREATE INDEX IF NOT EXISTS idx_graph_edges_source ON graph_edges(source_id);
CREATE INDEX IF NOT EXISTS idx_graph_edges_target ON graph_edges(target_id);

INSERT INTO schema_version (version, applied_at) VALUES (3, datetime('now'));
"#;

const MIGRATION_V4_UP: &str = r#"
CREATE TABLE IF NOT EXISTS tool_registry (
    name TEXT NOT NULL,
    tool_type TEXT NOT NULL,
    scope TEXT NOT NULL,
    source TEXT NOT NULL,
    project_hash TEXT NOT NULL DEFAULT '',
    description TEXT,
    server_name TEXT,
    trigger_hints TEXT,
    usage_count INTEGER NOT NULL DEFAULT 0,
    last_used_at TEXT,
    PRIMARY KEY (name, project_hash)
);

CREATE TABLE IF NOT EXISTS tool_usage_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tool_name TEXT NOT NULL,
    project_hash TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tool_usage_tool ON tool_usage_events(tool_name, project_hash);
CREATE INDEX IF NOT EXISTS idx_tool_usage_timestamp ON tool_usage_events(timestamp);

INSERT INTO schema_version (version, applied_at) VALUES (4, datetime('now'));
"#;

pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Apply every migration newer than the database's current version, each in
/// its own `execute_batch` transaction.
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn).unwrap_or(0);
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                "applying migration v{}: {}",
                migration.version,
                migration.description
            );
            conn.execute_batch(migration.up)?;
            applied += 1;
        }
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn migrating_twice_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        let first = apply_migrations(&conn).unwrap();
        assert_eq!(first, MIGRATIONS.len() as u32);
        let second = apply_migrations(&conn).unwrap();
        assert_eq!(second, 0);
    }

    #[test]
    fn fresh_database_lands_on_latest_version() {
        let conn = Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        let version = get_current_version(&conn).unwrap();
        assert_eq!(version, MIGRATIONS.last().unwrap().version);
    }
}
