//! SQLite-backed store.
//!
//! Two connections share one database file: `writer` serializes all
//! mutation, `reader` serves concurrent reads. Every method takes `&self`
//! (interior mutability via the connection mutexes), so `Store` is
//! `Send + Sync` and callers hold it as `Arc<Store>` with no outer lock.

use crate::error::{Error, Result};
use crate::models::{
    GraphEdge, GraphEdgeType, GraphNode, GraphNodeType, Notification, Observation,
    ObservationClassification, ObservationSnapshot, Stash, StashStatus, ToolRegistryEntry,
    ToolScope, ToolType,
};
use crate::project::ProjectHash;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::Mutex;

#[cfg(feature = "vector-search")]
use crate::search::vector::VectorIndex;

/// Filters accepted by [`Store::list_observations`].
#[derive(Debug, Clone, Default)]
pub struct ListFilters {
    pub session_id: Option<String>,
    pub include_deleted: bool,
    pub limit: usize,
}

pub struct Store {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    #[cfg(feature = "vector-search")]
    vector_index: Mutex<VectorIndex>,
    has_vector_support: bool,
}

impl Store {
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;
             PRAGMA mmap_size = 268435456;",
        )?;
        Ok(())
    }

    /// Open (creating if absent) the database at `path`, applying
    /// migrations and restricting file permissions to the owner on Unix.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700));
            }
        }

        let writer_conn = Connection::open(&path)?;
        Self::configure_connection(&writer_conn)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600));
        }

        super::migrations::apply_migrations(&writer_conn)
            .map_err(|e| Error::Migration { version: 0, source: e })?;

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        #[cfg(feature = "vector-search")]
        let (vector_index, has_vector_support) = match VectorIndex::new() {
            Ok(idx) => (idx, true),
            Err(e) => {
                tracing::warn!("vector index unavailable, degrading to keyword-only: {e}");
                (
                    VectorIndex::with_config(crate::search::vector::VectorIndexConfig {
                        dimensions: crate::search::vector::DEFAULT_DIMENSIONS,
                        ..Default::default()
                    })
                    .expect("fallback vector index config is always valid"),
                    false,
                )
            }
        };

        let store = Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            #[cfg(feature = "vector-search")]
            vector_index: Mutex::new(vector_index),
            #[cfg(not(feature = "vector-search"))]
            has_vector_support: false,
            #[cfg(feature = "vector-search")]
            has_vector_support,
        };

        #[cfg(feature = "vector-search")]
        store.load_embeddings_into_index()?;

        Ok(store)
    }

    pub fn has_vector_support(&self) -> bool {
        self.has_vector_support
    }

    #[cfg(feature = "vector-search")]
    fn load_embeddings_into_index(&self) -> Result<()> {
        let reader = self.reader.lock().expect("reader lock poisoned");
        let mut stmt = reader.prepare(
            "SELECT id, embedding FROM observations WHERE embedding IS NOT NULL AND deleted_at IS NULL",
        )?;
        let rows: Vec<(String, Vec<u8>)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .filter_map(|r| r.ok())
            .collect();
        drop(stmt);
        drop(reader);

        let mut index = self.vector_index.lock().expect("vector index lock poisoned");
        for (id, bytes) in rows {
            let vector = bytes_to_vector(&bytes);
            if vector.len() == index.dimensions() {
                if let Err(e) = index.add(&id, &vector) {
                    tracing::warn!("failed to load embedding for {id}: {e}");
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Observations
    // ------------------------------------------------------------------

    pub fn create_observation(
        &self,
        project: &ProjectHash,
        title: Option<String>,
        content: String,
        source: String,
        session_id: Option<String>,
    ) -> Result<Observation> {
        let now = Utc::now();
        let id = uuid::Uuid::new_v4().to_string();
        let conn = self.writer.lock().expect("writer lock poisoned");
        conn.execute(
            "INSERT INTO observations
             (id, project_hash, title, content, source, session_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                id,
                project.as_str(),
                title,
                content,
                source,
                session_id,
                now.to_rfc3339(),
            ],
        )?;
        Ok(Observation {
            id,
            project_hash: project.clone(),
            title,
            content,
            source,
            session_id,
            embedding_model: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            classification: None,
            kind: None,
        })
    }

    pub fn get_observation(&self, project: &ProjectHash, id: &str) -> Result<Option<Observation>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        conn.query_row(
            "SELECT id, project_hash, title, content, source, session_id, embedding_model,
                    classification, kind, created_at, updated_at, deleted_at
             FROM observations WHERE id = ?1 AND project_hash = ?2 AND deleted_at IS NULL",
            params![id, project.as_str()],
            row_to_observation,
        )
        .optional()
        .map_err(Error::from)
    }

    pub fn get_observation_including_deleted(&self, id: &str) -> Result<Option<Observation>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        conn.query_row(
            "SELECT id, project_hash, title, content, source, session_id, embedding_model,
                    classification, kind, created_at, updated_at, deleted_at
             FROM observations WHERE id = ?1",
            params![id],
            row_to_observation,
        )
        .optional()
        .map_err(Error::from)
    }

    pub fn update_observation_embedding(&self, id: &str, vector: &[f32], model: &str) -> Result<()> {
        let bytes = vector_to_bytes(vector);
        let conn = self.writer.lock().expect("writer lock poisoned");
        conn.execute(
            "UPDATE observations SET embedding = ?1, embedding_model = ?2, updated_at = ?3 WHERE id = ?4",
            params![bytes, model, Utc::now().to_rfc3339(), id],
        )?;
        drop(conn);

        #[cfg(feature = "vector-search")]
        {
            let mut index = self.vector_index.lock().expect("vector index lock poisoned");
            if vector.len() == index.dimensions() {
                let _ = index.add(id, vector);
            }
        }
        Ok(())
    }

    pub fn set_observation_classification(
        &self,
        id: &str,
        classification: ObservationClassification,
    ) -> Result<()> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        conn.execute(
            "UPDATE observations SET classification = ?1, updated_at = ?2 WHERE id = ?3",
            params![classification.as_str(), Utc::now().to_rfc3339(), id],
        )?;
        Ok(())
    }

    pub fn soft_delete_observation(&self, project: &ProjectHash, id: &str) -> Result<()> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        conn.execute(
            "UPDATE observations SET deleted_at = ?1 WHERE id = ?2 AND project_hash = ?3",
            params![Utc::now().to_rfc3339(), id, project.as_str()],
        )?;
        Ok(())
    }

    pub fn restore_observation(&self, project: &ProjectHash, id: &str) -> Result<()> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        conn.execute(
            "UPDATE observations SET deleted_at = NULL WHERE id = ?1 AND project_hash = ?2",
            params![id, project.as_str()],
        )?;
        Ok(())
    }

    pub fn list_observations(
        &self,
        project: &ProjectHash,
        filters: &ListFilters,
    ) -> Result<Vec<Observation>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let deleted_clause = if filters.include_deleted {
            ""
        } else {
            "AND deleted_at IS NULL"
        };
        let limit = if filters.limit == 0 { 100 } else { filters.limit };
        let sql = format!(
            "SELECT id, project_hash, title, content, source, session_id, embedding_model,
                    classification, kind, created_at, updated_at, deleted_at
             FROM observations WHERE project_hash = ?1 {deleted_clause}
             {} ORDER BY created_at DESC LIMIT ?2",
            if filters.session_id.is_some() { "AND session_id = ?3" } else { "" }
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = if let Some(session_id) = &filters.session_id {
            stmt.query_map(
                params![project.as_str(), limit as i64, session_id],
                row_to_observation,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            stmt.query_map(params![project.as_str(), limit as i64], row_to_observation)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };
        Ok(rows)
    }

    /// Observations that have not yet been embedded, across all projects —
    /// consumed by the background embedding sweep.
    pub fn unembedded_observations(&self, limit: usize) -> Result<Vec<Observation>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, project_hash, title, content, source, session_id, embedding_model,
                    classification, kind, created_at, updated_at, deleted_at
             FROM observations WHERE embedding IS NULL AND deleted_at IS NULL
             ORDER BY created_at ASC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], row_to_observation)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// FTS5 BM25 keyword search, title weighted 2x content. Never errors
    /// upward for a bad query shape — sanitizes first.
    pub fn keyword_search(
        &self,
        project: &ProjectHash,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(Observation, f32, Option<String>)>> {
        let sanitized = sanitize_fts5_query(query);
        if sanitized.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.reader.lock().expect("reader lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT o.id, o.project_hash, o.title, o.content, o.source, o.session_id,
                    o.embedding_model, o.classification, o.kind, o.created_at, o.updated_at,
                    o.deleted_at, bm25(observation_fts, 2.0, 1.0) as rank,
                    snippet(observation_fts, 2, '', '', '...', 12) as snippet
             FROM observation_fts
             JOIN observations o ON o.id = observation_fts.id
             WHERE observation_fts MATCH ?1 AND o.project_hash = ?2 AND o.deleted_at IS NULL
             ORDER BY rank LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![sanitized, project.as_str(), limit as i64], |row| {
                let obs = row_to_observation(row)?;
                let rank: f64 = row.get(12)?;
                let snippet: Option<String> = row.get(13)?;
                Ok((obs, (-rank).max(0.0) as f32, snippet))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    #[cfg(feature = "vector-search")]
    pub fn vector_search(&self, query: &[f32], limit: usize) -> Result<Vec<(String, f32)>> {
        let index = self.vector_index.lock().expect("vector index lock poisoned");
        Ok(index.search(query, limit).unwrap_or_default())
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    pub fn start_session(&self, id: &str, project: &ProjectHash) -> Result<()> {
        let now = Utc::now();
        let conn = self.writer.lock().expect("writer lock poisoned");
        conn.execute(
            "INSERT INTO sessions (id, project_hash, started_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO NOTHING",
            params![id, project.as_str(), now.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn end_session(&self, id: &str, summary: Option<String>) -> Result<()> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        conn.execute(
            "UPDATE sessions SET ended_at = ?1, summary = ?2 WHERE id = ?3",
            params![Utc::now().to_rfc3339(), summary, id],
        )?;
        Ok(())
    }

    pub fn get_session(&self, id: &str) -> Result<Option<crate::models::Session>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        conn.query_row(
            "SELECT id, project_hash, started_at, ended_at, summary FROM sessions WHERE id = ?1",
            params![id],
            row_to_session,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Most recent ended session for a project, used to seed
    /// ContextAssembler's prior-summary section.
    pub fn last_session_summary(&self, project: &ProjectHash) -> Result<Option<crate::models::Session>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        conn.query_row(
            "SELECT id, project_hash, started_at, ended_at, summary FROM sessions
             WHERE project_hash = ?1 AND ended_at IS NOT NULL
             ORDER BY ended_at DESC LIMIT 1",
            params![project.as_str()],
            row_to_session,
        )
        .optional()
        .map_err(Error::from)
    }

    // ------------------------------------------------------------------
    // Stashes
    // ------------------------------------------------------------------

    pub fn create_stash(&self, stash: &Stash) -> Result<()> {
        let observations_json = serde_json::to_string(&stash.observations)?;
        let conn = self.writer.lock().expect("writer lock poisoned");
        conn.execute(
            "INSERT INTO stashes
             (id, project_hash, session_id, topic_label, summary, observations_json, created_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                stash.id,
                stash.project_hash.as_str(),
                stash.session_id,
                stash.topic_label,
                stash.summary,
                observations_json,
                stash.created_at.to_rfc3339(),
                status_str(stash.status),
            ],
        )?;
        Ok(())
    }

    pub fn list_stashes(&self, project: &ProjectHash, limit: usize) -> Result<Vec<Stash>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, project_hash, session_id, topic_label, summary, observations_json,
                    created_at, resumed_at, status
             FROM stashes WHERE project_hash = ?1 ORDER BY created_at DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![project.as_str(), limit as i64], row_to_stash)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn mark_stash_resumed(&self, id: &str) -> Result<()> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        conn.execute(
            "UPDATE stashes SET resumed_at = ?1, status = 'resumed' WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Shift decisions
    // ------------------------------------------------------------------

    pub fn record_shift_decision(&self, decision: &crate::models::ShiftDecision) -> Result<()> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        conn.execute(
            "INSERT INTO shift_decisions (id, session_id, distance, threshold, shifted, confidence, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                decision.id,
                decision.session_id,
                decision.distance,
                decision.threshold,
                decision.shifted as i64,
                decision.confidence,
                decision.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    pub fn enqueue_notification(&self, project: &ProjectHash, text: &str) -> Result<()> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        conn.execute(
            "INSERT INTO notifications (project_hash, text, created_at) VALUES (?1, ?2, ?3)",
            params![project.as_str(), text, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Drains every pending notification for the project (consume-on-read).
    pub fn consume_pending_notifications(&self, project: &ProjectHash) -> Result<Vec<Notification>> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT project_hash, text, created_at FROM notifications WHERE project_hash = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map(params![project.as_str()], |row| {
                Ok(Notification {
                    project_hash: ProjectHash::from_raw(row.get::<_, String>(0)?),
                    text: row.get(1)?,
                    created_at: parse_ts(row.get::<_, String>(2)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(stmt);
        conn.execute(
            "DELETE FROM notifications WHERE project_hash = ?1",
            params![project.as_str()],
        )?;
        Ok(rows)
    }

    // ------------------------------------------------------------------
    // Graph nodes & edges
    // ------------------------------------------------------------------

    /// Upsert a node by (project, name, type): insert if new, else append
    /// `observation_id` to its id set and deep-merge `metadata_patch`.
    pub fn upsert_graph_node(
        &self,
        project: &ProjectHash,
        name: &str,
        node_type: GraphNodeType,
        observation_id: &str,
        metadata_patch: serde_json::Value,
    ) -> Result<GraphNode> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        let existing = conn
            .query_row(
                "SELECT id, metadata, observation_ids FROM graph_nodes
                 WHERE project_hash = ?1 AND name = ?2 AND node_type = ?3",
                params![project.as_str(), name, node_type.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let now = Utc::now();
        match existing {
            Some((id, metadata_raw, obs_ids_raw)) => {
                let mut metadata: serde_json::Value =
                    serde_json::from_str(&metadata_raw).unwrap_or(serde_json::json!({}));
                deep_merge(&mut metadata, metadata_patch);
                let mut obs_ids: Vec<String> = serde_json::from_str(&obs_ids_raw).unwrap_or_default();
                if !obs_ids.iter().any(|x| x == observation_id) {
                    obs_ids.push(observation_id.to_string());
                }
                conn.execute(
                    "UPDATE graph_nodes SET metadata = ?1, observation_ids = ?2, updated_at = ?3 WHERE id = ?4",
                    params![
                        serde_json::to_string(&metadata)?,
                        serde_json::to_string(&obs_ids)?,
                        now.to_rfc3339(),
                        id
                    ],
                )?;
                Ok(GraphNode {
                    id,
                    project_hash: project.clone(),
                    name: name.to_string(),
                    node_type,
                    metadata,
                    observation_ids: obs_ids,
                    created_at: now,
                    updated_at: now,
                })
            }
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                let obs_ids = vec![observation_id.to_string()];
                conn.execute(
                    "INSERT INTO graph_nodes (id, project_hash, name, node_type, metadata, observation_ids, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                    params![
                        id,
                        project.as_str(),
                        name,
                        node_type.as_str(),
                        serde_json::to_string(&metadata_patch)?,
                        serde_json::to_string(&obs_ids)?,
                        now.to_rfc3339(),
                    ],
                )?;
                Ok(GraphNode {
                    id,
                    project_hash: project.clone(),
                    name: name.to_string(),
                    node_type,
                    metadata: metadata_patch,
                    observation_ids: obs_ids,
                    created_at: now,
                    updated_at: now,
                })
            }
        }
    }

    pub fn get_graph_node(&self, id: &str) -> Result<Option<GraphNode>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        conn.query_row(
            "SELECT id, project_hash, name, node_type, metadata, observation_ids, created_at, updated_at
             FROM graph_nodes WHERE id = ?1",
            params![id],
            row_to_graph_node,
        )
        .optional()
        .map_err(Error::from)
    }

    pub fn find_graph_nodes(
        &self,
        project: &ProjectHash,
        query: &str,
        node_type: Option<GraphNodeType>,
        limit: usize,
    ) -> Result<Vec<GraphNode>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let like = format!("%{}%", query.replace('%', ""));
        let rows = match node_type {
            Some(t) => {
                let mut stmt = conn.prepare(
                    "SELECT id, project_hash, name, node_type, metadata, observation_ids, created_at, updated_at
                     FROM graph_nodes WHERE project_hash = ?1 AND node_type = ?2 AND name LIKE ?3
                     ORDER BY (name = ?4) DESC LIMIT ?5",
                )?;
                stmt.query_map(
                    params![project.as_str(), t.as_str(), like, query, limit as i64],
                    row_to_graph_node,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, project_hash, name, node_type, metadata, observation_ids, created_at, updated_at
                     FROM graph_nodes WHERE project_hash = ?1 AND name LIKE ?2
                     ORDER BY (name = ?3) DESC LIMIT ?4",
                )?;
                stmt.query_map(params![project.as_str(), like, query, limit as i64], row_to_graph_node)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        Ok(rows)
    }

    pub fn node_degree(&self, node_id: &str) -> Result<usize> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM graph_edges WHERE source_id = ?1 OR target_id = ?1",
            params![node_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Insert an edge, enforcing the degree cap by dropping the
    /// lowest-weight existing edge on whichever endpoint would overflow.
    pub fn insert_graph_edge(
        &self,
        project: &ProjectHash,
        source_id: &str,
        target_id: &str,
        edge_type: GraphEdgeType,
        weight: f32,
        metadata: Option<serde_json::Value>,
        max_degree: usize,
    ) -> Result<GraphEdge> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        for node_id in [source_id, target_id] {
            let degree: i64 = conn.query_row(
                "SELECT COUNT(*) FROM graph_edges WHERE source_id = ?1 OR target_id = ?1",
                params![node_id],
                |row| row.get(0),
            )?;
            if degree as usize >= max_degree {
                conn.execute(
                    "DELETE FROM graph_edges WHERE id = (
                        SELECT id FROM graph_edges WHERE source_id = ?1 OR target_id = ?1
                        ORDER BY weight ASC LIMIT 1
                    )",
                    params![node_id],
                )?;
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let metadata_str = metadata.as_ref().map(serde_json::to_string).transpose()?;
        conn.execute(
            "INSERT INTO graph_edges (id, project_hash, source_id, target_id, edge_type, weight, created_at, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                project.as_str(),
                source_id,
                target_id,
                edge_type.as_str(),
                weight,
                now.to_rfc3339(),
                metadata_str,
            ],
        )?;
        Ok(GraphEdge {
            id,
            project_hash: project.clone(),
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            edge_type,
            weight,
            created_at: now,
            metadata,
        })
    }

    /// Nodes and edges reachable from `node_id` within `depth` hops,
    /// optionally restricted to a set of edge types.
    pub fn neighbors(
        &self,
        node_id: &str,
        depth: usize,
        edge_types: Option<&[GraphEdgeType]>,
    ) -> Result<(Vec<GraphNode>, Vec<GraphEdge>)> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let mut frontier = vec![node_id.to_string()];
        let mut seen_nodes = std::collections::HashSet::new();
        seen_nodes.insert(node_id.to_string());
        let mut seen_edges: Vec<GraphEdge> = Vec::new();
        let mut seen_edge_ids = std::collections::HashSet::new();

        for _ in 0..depth.max(1) {
            if frontier.is_empty() {
                break;
            }
            let mut next_frontier = Vec::new();
            for current in &frontier {
                let mut stmt = conn.prepare(
                    "SELECT id, project_hash, source_id, target_id, edge_type, weight, created_at, metadata
                     FROM graph_edges WHERE source_id = ?1 OR target_id = ?1",
                )?;
                let edges = stmt
                    .query_map(params![current], row_to_graph_edge)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                for edge in edges {
                    if let Some(types) = edge_types {
                        if !types.contains(&edge.edge_type) {
                            continue;
                        }
                    }
                    if seen_edge_ids.insert(edge.id.clone()) {
                        let other = if edge.source_id == *current {
                            edge.target_id.clone()
                        } else {
                            edge.source_id.clone()
                        };
                        if seen_nodes.insert(other.clone()) {
                            next_frontier.push(other);
                        }
                        seen_edges.push(edge);
                    }
                }
            }
            frontier = next_frontier;
        }

        let mut nodes = Vec::new();
        for id in &seen_nodes {
            if let Some(node) = conn
                .query_row(
                    "SELECT id, project_hash, name, node_type, metadata, observation_ids, created_at, updated_at
                     FROM graph_nodes WHERE id = ?1",
                    params![id],
                    row_to_graph_node,
                )
                .optional()?
            {
                nodes.push(node);
            }
        }
        Ok((nodes, seen_edges))
    }

    /// Exponential decay pass over every edge's weight; deletes edges below
    /// threshold or older than `max_age_days`. Runs inside one transaction.
    pub fn apply_edge_decay(
        &self,
        half_life_days: f64,
        floor: f32,
        delete_threshold: f32,
        max_age_days: i64,
    ) -> Result<(usize, usize)> {
        let mut conn = self.writer.lock().expect("writer lock poisoned");
        let tx = conn.transaction()?;
        let now = Utc::now();

        let mut decayed = 0usize;
        let mut deleted = 0usize;
        let rows: Vec<(String, f32, DateTime<Utc>)> = {
            let mut stmt = tx.prepare("SELECT id, weight, created_at FROM graph_edges")?;
            stmt.query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, parse_ts(row.get::<_, String>(2)?)))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?
        };

        for (id, weight, created_at) in rows {
            let age_days = (now - created_at).num_seconds() as f64 / 86400.0;
            if age_days >= max_age_days as f64 {
                tx.execute("DELETE FROM graph_edges WHERE id = ?1", params![id])?;
                deleted += 1;
                continue;
            }
            let decayed_weight = (weight as f64 * (-std::f64::consts::LN_2 * age_days / half_life_days).exp())
                .max(floor as f64) as f32;
            if decayed_weight < delete_threshold {
                tx.execute("DELETE FROM graph_edges WHERE id = ?1", params![id])?;
                deleted += 1;
            } else {
                tx.execute(
                    "UPDATE graph_edges SET weight = ?1 WHERE id = ?2",
                    params![decayed_weight, id],
                )?;
                decayed += 1;
            }
        }
        tx.commit()?;
        Ok((decayed, deleted))
    }

    /// Candidate duplicate node pairs: same type, exact or near-identical
    /// name. Caller decides how to merge.
    pub fn duplicate_node_candidates(&self, project: &ProjectHash) -> Result<Vec<(GraphNode, GraphNode)>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, project_hash, name, node_type, metadata, observation_ids, created_at, updated_at
             FROM graph_nodes WHERE project_hash = ?1 ORDER BY node_type, name",
        )?;
        let nodes: Vec<GraphNode> = stmt
            .query_map(params![project.as_str()], row_to_graph_node)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut pairs = Vec::new();
        for i in 0..nodes.len() {
            for j in (i + 1)..nodes.len() {
                if nodes[i].node_type != nodes[j].node_type || nodes[i].id == nodes[j].id {
                    continue;
                }
                let lev = strsim::levenshtein(&nodes[i].name, &nodes[j].name);
                let jaro = strsim::jaro_winkler(&nodes[i].name, &nodes[j].name);
                if lev <= 2 || jaro >= 0.92 {
                    pairs.push((nodes[i].clone(), nodes[j].clone()));
                }
            }
        }
        Ok(pairs)
    }

    /// Merge `duplicate` into `canonical`: repoint its edges, union
    /// observation ids and metadata, then delete it.
    pub fn merge_nodes(&self, canonical_id: &str, duplicate_id: &str) -> Result<()> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        let (dup_obs_raw, dup_meta_raw): (String, String) = conn.query_row(
            "SELECT observation_ids, metadata FROM graph_nodes WHERE id = ?1",
            params![duplicate_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let dup_obs: Vec<String> = serde_json::from_str(&dup_obs_raw).unwrap_or_default();
        let dup_meta: serde_json::Value = serde_json::from_str(&dup_meta_raw).unwrap_or(serde_json::json!({}));

        let (canon_obs_raw, canon_meta_raw): (String, String) = conn.query_row(
            "SELECT observation_ids, metadata FROM graph_nodes WHERE id = ?1",
            params![canonical_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let mut canon_obs: Vec<String> = serde_json::from_str(&canon_obs_raw).unwrap_or_default();
        for id in dup_obs {
            if !canon_obs.contains(&id) {
                canon_obs.push(id);
            }
        }
        let mut canon_meta: serde_json::Value =
            serde_json::from_str(&canon_meta_raw).unwrap_or(serde_json::json!({}));
        deep_merge(&mut canon_meta, dup_meta);

        conn.execute(
            "UPDATE graph_nodes SET observation_ids = ?1, metadata = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                serde_json::to_string(&canon_obs)?,
                serde_json::to_string(&canon_meta)?,
                Utc::now().to_rfc3339(),
                canonical_id
            ],
        )?;
        conn.execute(
            "UPDATE graph_edges SET source_id = ?1 WHERE source_id = ?2",
            params![canonical_id, duplicate_id],
        )?;
        conn.execute(
            "UPDATE graph_edges SET target_id = ?1 WHERE target_id = ?2",
            params![canonical_id, duplicate_id],
        )?;
        conn.execute("DELETE FROM graph_nodes WHERE id = ?1", params![duplicate_id])?;
        Ok(())
    }

    pub fn graph_stats_raw(&self, project: &ProjectHash) -> Result<(i64, i64)> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let nodes: i64 = conn.query_row(
            "SELECT COUNT(*) FROM graph_nodes WHERE project_hash = ?1",
            params![project.as_str()],
            |row| row.get(0),
        )?;
        let edges: i64 = conn.query_row(
            "SELECT COUNT(*) FROM graph_edges WHERE project_hash = ?1",
            params![project.as_str()],
            |row| row.get(0),
        )?;
        Ok((nodes, edges))
    }

    pub fn node_type_distribution(&self, project: &ProjectHash) -> Result<Vec<(String, i64)>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT node_type, COUNT(*) FROM graph_nodes WHERE project_hash = ?1 GROUP BY node_type",
        )?;
        let rows = stmt
            .query_map(params![project.as_str()], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn degree_stats(&self, project: &ProjectHash) -> Result<(f64, i64)> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let mut stmt = conn.prepare("SELECT id FROM graph_nodes WHERE project_hash = ?1")?;
        let ids: Vec<String> = stmt
            .query_map(params![project.as_str()], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(stmt);
        if ids.is_empty() {
            return Ok((0.0, 0));
        }
        let mut total = 0i64;
        let mut max_degree = 0i64;
        for id in &ids {
            let degree: i64 = conn.query_row(
                "SELECT COUNT(*) FROM graph_edges WHERE source_id = ?1 OR target_id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            total += degree;
            max_degree = max_degree.max(degree);
        }
        Ok((total as f64 / ids.len() as f64, max_degree))
    }

    pub fn hotspot_nodes(&self, project: &ProjectHash, limit: usize) -> Result<Vec<(GraphNode, i64)>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT n.id, n.project_hash, n.name, n.node_type, n.metadata, n.observation_ids,
                    n.created_at, n.updated_at,
                    (SELECT COUNT(*) FROM graph_edges e WHERE e.source_id = n.id OR e.target_id = n.id) as degree
             FROM graph_nodes n WHERE n.project_hash = ?1 ORDER BY degree DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![project.as_str(), limit as i64], |row| {
                let node = row_to_graph_node(row)?;
                let degree: i64 = row.get(8)?;
                Ok((node, degree))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ------------------------------------------------------------------
    // Tool registry
    // ------------------------------------------------------------------

    pub fn upsert_tool_registry_entry(&self, entry: &ToolRegistryEntry) -> Result<()> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        let project_key = entry.project_hash.as_ref().map(|p| p.as_str()).unwrap_or("");
        conn.execute(
            "INSERT INTO tool_registry
             (name, tool_type, scope, source, project_hash, description, server_name, trigger_hints, usage_count, last_used_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(name, project_hash) DO UPDATE SET
                tool_type = excluded.tool_type,
                scope = excluded.scope,
                source = excluded.source,
                description = excluded.description,
                server_name = excluded.server_name,
                trigger_hints = excluded.trigger_hints",
            params![
                entry.name,
                tool_type_str(entry.tool_type),
                tool_scope_str(entry.scope),
                entry.source,
                project_key,
                entry.description,
                entry.server_name,
                entry.trigger_hints.as_ref().map(|h| serde_json::to_string(h).unwrap_or_default()),
                entry.usage_count as i64,
                entry.last_used_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn record_tool_usage(&self, tool_name: &str, project: &ProjectHash) -> Result<()> {
        let now = Utc::now();
        let conn = self.writer.lock().expect("writer lock poisoned");
        conn.execute(
            "INSERT INTO tool_usage_events (tool_name, project_hash, timestamp) VALUES (?1, ?2, ?3)",
            params![tool_name, project.as_str(), now.to_rfc3339()],
        )?;
        conn.execute(
            "UPDATE tool_registry SET usage_count = usage_count + 1, last_used_at = ?1
             WHERE name = ?2 AND (project_hash = ?3 OR project_hash = '')",
            params![now.to_rfc3339(), tool_name, project.as_str()],
        )?;
        Ok(())
    }

    pub fn search_tool_registry(
        &self,
        project: &ProjectHash,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ToolRegistryEntry>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let like = format!("%{}%", query.replace('%', ""));
        let mut stmt = conn.prepare(
            "SELECT name, tool_type, scope, source, project_hash, description, server_name,
                    trigger_hints, usage_count, last_used_at
             FROM tool_registry
             WHERE (project_hash = ?1 OR project_hash = '')
               AND (name LIKE ?2 OR COALESCE(description, '') LIKE ?2)
             ORDER BY usage_count DESC LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![project.as_str(), like, limit as i64], row_to_tool_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Tools visible to a project (project + global), with usage counts
    /// over the last `window_days` — raw material for ContextAssembler's
    /// ranking formula.
    pub fn recent_tool_usage_counts(
        &self,
        project: &ProjectHash,
        window_days: i64,
    ) -> Result<Vec<ToolRegistryEntry>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let cutoff = (Utc::now() - chrono::Duration::days(window_days)).to_rfc3339();
        let mut stmt = conn.prepare(
            "SELECT t.name, t.tool_type, t.scope, t.source, t.project_hash, t.description,
                    t.server_name, t.trigger_hints,
                    (SELECT COUNT(*) FROM tool_usage_events u
                     WHERE u.tool_name = t.name AND u.project_hash = ?1 AND u.timestamp >= ?2) as recent_count,
                    t.last_used_at
             FROM tool_registry t WHERE t.project_hash = ?1 OR t.project_hash = ''",
        )?;
        let rows = stmt
            .query_map(params![project.as_str(), cutoff], row_to_tool_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn row_to_observation(row: &Row) -> rusqlite::Result<Observation> {
    let classification: Option<String> = row.get(7)?;
    let kind: Option<String> = row.get(8)?;
    Ok(Observation {
        id: row.get(0)?,
        project_hash: ProjectHash::from_raw(row.get::<_, String>(1)?),
        title: row.get(2)?,
        content: row.get(3)?,
        source: row.get(4)?,
        session_id: row.get(5)?,
        embedding_model: row.get(6)?,
        classification: classification.and_then(|c| ObservationClassification::parse(&c)),
        kind: kind.and_then(|k| crate::models::ObservationKind::parse(&k)),
        created_at: parse_ts(row.get::<_, String>(9)?),
        updated_at: parse_ts(row.get::<_, String>(10)?),
        deleted_at: row.get::<_, Option<String>>(11)?.map(parse_ts),
    })
}

fn row_to_session(row: &Row) -> rusqlite::Result<crate::models::Session> {
    Ok(crate::models::Session {
        id: row.get(0)?,
        project_hash: ProjectHash::from_raw(row.get::<_, String>(1)?),
        started_at: parse_ts(row.get::<_, String>(2)?),
        ended_at: row.get::<_, Option<String>>(3)?.map(parse_ts),
        summary: row.get(4)?,
    })
}

fn row_to_stash(row: &Row) -> rusqlite::Result<Stash> {
    let observations_json: String = row.get(5)?;
    let observations: Vec<ObservationSnapshot> =
        serde_json::from_str(&observations_json).unwrap_or_default();
    let status: String = row.get(8)?;
    Ok(Stash {
        id: row.get(0)?,
        project_hash: ProjectHash::from_raw(row.get::<_, String>(1)?),
        session_id: row.get(2)?,
        topic_label: row.get(3)?,
        summary: row.get(4)?,
        observations,
        created_at: parse_ts(row.get::<_, String>(6)?),
        resumed_at: row.get::<_, Option<String>>(7)?.map(parse_ts),
        status: if status == "resumed" { StashStatus::Resumed } else { StashStatus::Stashed },
    })
}

fn row_to_graph_node(row: &Row) -> rusqlite::Result<GraphNode> {
    let metadata_raw: String = row.get(4)?;
    let obs_ids_raw: String = row.get(5)?;
    let node_type_raw: String = row.get(3)?;
    Ok(GraphNode {
        id: row.get(0)?,
        project_hash: ProjectHash::from_raw(row.get::<_, String>(1)?),
        name: row.get(2)?,
        node_type: GraphNodeType::parse(&node_type_raw).unwrap_or(GraphNodeType::Reference),
        metadata: serde_json::from_str(&metadata_raw).unwrap_or(serde_json::json!({})),
        observation_ids: serde_json::from_str(&obs_ids_raw).unwrap_or_default(),
        created_at: parse_ts(row.get::<_, String>(6)?),
        updated_at: parse_ts(row.get::<_, String>(7)?),
    })
}

fn row_to_graph_edge(row: &Row) -> rusqlite::Result<GraphEdge> {
    let edge_type_raw: String = row.get(4)?;
    let metadata_raw: Option<String> = row.get(7)?;
    Ok(GraphEdge {
        id: row.get(0)?,
        project_hash: ProjectHash::from_raw(row.get::<_, String>(1)?),
        source_id: row.get(2)?,
        target_id: row.get(3)?,
        edge_type: GraphEdgeType::parse(&edge_type_raw).unwrap_or(GraphEdgeType::RelatedTo),
        weight: row.get(5)?,
        created_at: parse_ts(row.get::<_, String>(6)?),
        metadata: metadata_raw.and_then(|m| serde_json::from_str(&m).ok()),
    })
}

fn row_to_tool_entry(row: &Row) -> rusqlite::Result<ToolRegistryEntry> {
    let tool_type_raw: String = row.get(1)?;
    let scope_raw: String = row.get(2)?;
    let project_hash_raw: String = row.get(4)?;
    let trigger_hints_raw: Option<String> = row.get(7)?;
    Ok(ToolRegistryEntry {
        name: row.get(0)?,
        tool_type: parse_tool_type(&tool_type_raw),
        scope: parse_tool_scope(&scope_raw),
        source: row.get(3)?,
        project_hash: if project_hash_raw.is_empty() {
            None
        } else {
            Some(ProjectHash::from_raw(project_hash_raw))
        },
        description: row.get(5)?,
        server_name: row.get(6)?,
        trigger_hints: trigger_hints_raw.and_then(|h| serde_json::from_str(&h).ok()),
        usage_count: row.get::<_, i64>(8)? as u64,
        last_used_at: row.get::<_, Option<String>>(9)?.map(parse_ts),
    })
}

fn parse_ts(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn status_str(status: StashStatus) -> &'static str {
    match status {
        StashStatus::Stashed => "stashed",
        StashStatus::Resumed => "resumed",
    }
}

fn tool_type_str(t: ToolType) -> &'static str {
    match t {
        ToolType::Builtin => "builtin",
        ToolType::McpServer => "mcp_server",
        ToolType::McpTool => "mcp_tool",
        ToolType::SlashCommand => "slash_command",
        ToolType::Skill => "skill",
        ToolType::Plugin => "plugin",
        ToolType::Unknown => "unknown",
    }
}

fn parse_tool_type(s: &str) -> ToolType {
    match s {
        "builtin" => ToolType::Builtin,
        "mcp_server" => ToolType::McpServer,
        "mcp_tool" => ToolType::McpTool,
        "slash_command" => ToolType::SlashCommand,
        "skill" => ToolType::Skill,
        "plugin" => ToolType::Plugin,
        _ => ToolType::Unknown,
    }
}

fn tool_scope_str(s: ToolScope) -> &'static str {
    match s {
        ToolScope::Global => "global",
        ToolScope::Project => "project",
        ToolScope::Plugin => "plugin",
    }
}

fn parse_tool_scope(s: &str) -> ToolScope {
    match s {
        "global" => ToolScope::Global,
        "plugin" => ToolScope::Plugin,
        _ => ToolScope::Project,
    }
}

fn deep_merge(base: &mut serde_json::Value, patch: serde_json::Value) {
    match (base, patch) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(patch_map)) => {
            for (k, v) in patch_map {
                deep_merge(base_map.entry(k).or_insert(serde_json::Value::Null), v);
            }
        }
        (base_slot, patch_value) => {
            if !patch_value.is_null() {
                *base_slot = patch_value;
            }
        }
    }
}

pub fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn bytes_to_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Strip FTS5 operator syntax a raw user query might accidentally trigger
/// (quotes, boolean operators, column filters) so `MATCH` never errors on
/// untrusted input.
pub fn sanitize_fts5_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|tok| {
            tok.chars()
                .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
                .collect::<String>()
        })
        .filter(|tok| !tok.is_empty())
        .map(|tok| format!("\"{tok}\""))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GraphEdgeType;
    use tempfile::tempdir;

    fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("data.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn create_and_get_observation_round_trips() {
        let (_dir, store) = temp_store();
        let project = ProjectHash::from_raw("abc0123456789def");
        let obs = store
            .create_observation(&project, None, "hello world".into(), "manual".into(), None)
            .unwrap();
        let fetched = store.get_observation(&project, &obs.id).unwrap().unwrap();
        assert_eq!(fetched.content, "hello world");
    }

    #[test]
    fn soft_delete_hides_then_restore_reveals() {
        let (_dir, store) = temp_store();
        let project = ProjectHash::from_raw("abc0123456789def");
        let obs = store
            .create_observation(&project, None, "secret plan".into(), "manual".into(), None)
            .unwrap();
        store.soft_delete_observation(&project, &obs.id).unwrap();
        assert!(store.get_observation(&project, &obs.id).unwrap().is_none());
        let deleted = store.get_observation_including_deleted(&obs.id).unwrap().unwrap();
        assert!(deleted.deleted_at.is_some());
        store.restore_observation(&project, &obs.id).unwrap();
        assert!(store.get_observation(&project, &obs.id).unwrap().is_some());
    }

    #[test]
    fn keyword_search_finds_distinctive_token() {
        let (_dir, store) = temp_store();
        let project = ProjectHash::from_raw("abc0123456789def");
        store
            .create_observation(
                &project,
                None,
                "Auth: decided to use JWT for session management".into(),
                "manual".into(),
                None,
            )
            .unwrap();
        let hits = store.keyword_search(&project, "JWT", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].0.content.contains("JWT"));
    }

    #[test]
    fn fts_sync_after_delete() {
        let (_dir, store) = temp_store();
        let project = ProjectHash::from_raw("abc0123456789def");
        let obs = store
            .create_observation(&project, None, "unique_token_xyz appears here".into(), "manual".into(), None)
            .unwrap();
        assert_eq!(store.keyword_search(&project, "unique_token_xyz", 10).unwrap().len(), 1);
        store.soft_delete_observation(&project, &obs.id).unwrap();
        assert_eq!(store.keyword_search(&project, "unique_token_xyz", 10).unwrap().len(), 0);
    }

    #[test]
    fn project_isolation_holds_for_observations() {
        let (_dir, store) = temp_store();
        let a = ProjectHash::from_raw("aaaa111111111111");
        let b = ProjectHash::from_raw("bbbb222222222222");
        store.create_observation(&a, None, "only in a".into(), "manual".into(), None).unwrap();
        let filters = ListFilters { limit: 10, ..Default::default() };
        assert_eq!(store.list_observations(&a, &filters).unwrap().len(), 1);
        assert_eq!(store.list_observations(&b, &filters).unwrap().len(), 0);
    }

    #[test]
    fn degree_cap_drops_lowest_weight_edge() {
        let (_dir, store) = temp_store();
        let project = ProjectHash::from_raw("abc0123456789def");
        let a = store
            .upsert_graph_node(&project, "node-a", GraphNodeType::File, "obs1", serde_json::json!({}))
            .unwrap();
        for i in 0..51 {
            let target = store
                .upsert_graph_node(&project, &format!("target-{i}"), GraphNodeType::File, "obs1", serde_json::json!({}))
                .unwrap();
            store
                .insert_graph_edge(&project, &a.id, &target.id, GraphEdgeType::RelatedTo, (i as f32) / 100.0, None, 50)
                .unwrap();
        }
        assert_eq!(store.node_degree(&a.id).unwrap(), 50);
    }

    #[test]
    fn notification_is_consumed_once() {
        let (_dir, store) = temp_store();
        let project = ProjectHash::from_raw("abc0123456789def");
        store.enqueue_notification(&project, "previous context stashed").unwrap();
        assert_eq!(store.consume_pending_notifications(&project).unwrap().len(), 1);
        assert!(store.consume_pending_notifications(&project).unwrap().is_empty());
    }

    #[test]
    fn upsert_node_twice_does_not_duplicate_links() {
        let (_dir, store) = temp_store();
        let project = ProjectHash::from_raw("abc0123456789def");
        let first = store
            .upsert_graph_node(&project, "main.rs", GraphNodeType::File, "obs1", serde_json::json!({}))
            .unwrap();
        let second = store
            .upsert_graph_node(&project, "main.rs", GraphNodeType::File, "obs1", serde_json::json!({}))
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.observation_ids.len(), 1);
    }

    #[test]
    fn decay_floor_and_deletion() {
        let (_dir, store) = temp_store();
        let project = ProjectHash::from_raw("abc0123456789def");
        let a = store.upsert_graph_node(&project, "a", GraphNodeType::File, "obs1", serde_json::json!({})).unwrap();
        let b = store.upsert_graph_node(&project, "b", GraphNodeType::File, "obs1", serde_json::json!({})).unwrap();
        store.insert_graph_edge(&project, &a.id, &b.id, GraphEdgeType::RelatedTo, 1.0, None, 50).unwrap();
        {
            let conn = store.writer.lock().unwrap();
            let backdated = (Utc::now() - chrono::Duration::days(60)).to_rfc3339();
            conn.execute("UPDATE graph_edges SET created_at = ?1", params![backdated]).unwrap();
        }
        let (decayed, deleted) = store.apply_edge_decay(30.0, 0.05, 0.08, 180).unwrap();
        assert_eq!(decayed, 1);
        assert_eq!(deleted, 0);
    }
}
