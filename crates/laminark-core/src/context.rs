//! ContextAssembler (§4.7).
//!
//! Builds the synchronous session-start payload: prior summary, live
//! stashes, relevant prior observations, and a ranked tools list, packed
//! into a 6,000-character budget with a 500-character tools sub-budget.
//! Sections are rendered in priority order and dropped from the *back* on
//! overflow, so the highest-priority section always survives.

use crate::budget::{drop_sections_to_char_budget, truncate_chars_at_line_boundary};
use crate::embeddings::worker::EmbeddingWorker;
use crate::error::Result;
use crate::models::ToolRegistryEntry;
use crate::project::ProjectHash;
use crate::search::hybrid_search;
use crate::storage::Store;
use chrono::Utc;

pub const TOTAL_BUDGET_CHARS: usize = 6_000;
pub const TOOLS_SUB_BUDGET_CHARS: usize = 500;

const MAX_STASHES: usize = 5;
const MAX_OBSERVATIONS: usize = 5;
const TOOL_USAGE_WINDOW_DAYS: i64 = 7;

/// Ranks a tool entry per §4.7's formula, given the window total used for
/// normalization. `usage_count` on entries from
/// [`Store::recent_tool_usage_counts`] already holds the recent-window
/// count, not the lifetime total.
fn tool_rank(entry: &ToolRegistryEntry, max_recent_count: f64) -> f64 {
    let normalized_recent = if max_recent_count > 0.0 {
        entry.usage_count as f64 / max_recent_count
    } else {
        0.0
    };
    let age_days = entry
        .last_used_at
        .map(|t| (Utc::now() - t).num_seconds() as f64 / 86_400.0)
        .unwrap_or(TOOL_USAGE_WINDOW_DAYS as f64 * 4.0);
    let recency = (-std::f64::consts::LN_2 * age_days / 7.0).exp();
    0.7 * normalized_recent + 0.3 * recency
}

/// Rank and dedup a tool list so an MCP server's own registry entry
/// suppresses its individual child-tool entries from the same server.
fn rank_and_dedup_tools(mut entries: Vec<ToolRegistryEntry>) -> Vec<ToolRegistryEntry> {
    let max_recent = entries.iter().map(|e| e.usage_count as f64).fold(0.0, f64::max);
    entries.sort_by(|a, b| {
        tool_rank(b, max_recent)
            .partial_cmp(&tool_rank(a, max_recent))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let server_names: std::collections::HashSet<&str> =
        entries.iter().filter_map(|e| e.server_name.as_deref()).collect();
    entries.retain(|e| !server_names.contains(e.name.as_str()));
    entries
}

/// Assemble the session-start context for `project`, under the seeding
/// `session_id` that was just opened.
pub fn assemble(
    store: &Store,
    project: &ProjectHash,
    session_id: &str,
    embedding_worker: &EmbeddingWorker,
) -> Result<String> {
    let mut sections = Vec::new();

    if let Some(prior) = store.last_session_summary(project)? {
        if let Some(summary) = prior.summary {
            sections.push(format!("## Previous session\n{summary}"));
        }
    }

    let stashes = store.list_stashes(project, MAX_STASHES)?;
    if !stashes.is_empty() {
        let mut block = String::from("## Stashed contexts\n");
        for stash in &stashes {
            block.push_str(&format!(
                "- \"{}\" ({} observations) — resume with `recall action=restore id={}`\n",
                stash.topic_label,
                stash.observations.len(),
                stash.id
            ));
        }
        sections.push(block);
    }

    let seed_query = stashes
        .first()
        .map(|s| s.topic_label.clone())
        .or_else(|| store.last_session_summary(project).ok().flatten().and_then(|s| s.summary))
        .unwrap_or_default();
    if !seed_query.is_empty() {
        let seed_vector = embedding_worker.embed_blocking(&seed_query);
        let hits = hybrid_search(store, project, &seed_query, seed_vector.as_deref(), MAX_OBSERVATIONS)?;
        if !hits.is_empty() {
            let mut block = String::from("## Relevant prior observations\n");
            for hit in &hits {
                let snippet = hit
                    .snippet
                    .clone()
                    .unwrap_or_else(|| truncate_chars_at_line_boundary(&hit.observation.content, 200));
                block.push_str(&format!("- {snippet}\n"));
            }
            sections.push(block);
        }
    }

    let tool_entries = store.recent_tool_usage_counts(project, TOOL_USAGE_WINDOW_DAYS)?;
    let ranked = rank_and_dedup_tools(tool_entries);
    if !ranked.is_empty() {
        let mut block = String::from("## Available tools\n");
        for entry in &ranked {
            block.push_str(&format!("- {}\n", entry.name));
            if block.chars().count() >= TOOLS_SUB_BUDGET_CHARS {
                break;
            }
        }
        let block = truncate_chars_at_line_boundary(&block, TOOLS_SUB_BUDGET_CHARS);
        sections.push(block);
    }

    let kept = drop_sections_to_char_budget(sections, "\n\n", TOTAL_BUDGET_CHARS);
    let assembled = kept.join("\n\n");
    let assembled = truncate_chars_at_line_boundary(&assembled, TOTAL_BUDGET_CHARS);

    if assembled.is_empty() {
        tracing::debug!("no context assembled for session {session_id}");
    }

    Ok(assembled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingMode;
    use crate::embeddings::piggyback::PiggybackCache;
    use crate::models::{ToolScope, ToolType};
    use std::sync::Arc;

    fn test_worker() -> EmbeddingWorker {
        EmbeddingWorker::new(EmbeddingMode::Local, Arc::new(PiggybackCache::new(crate::embeddings::EMBEDDING_DIMENSIONS)))
    }

    fn entry(name: &str, usage_count: u64) -> ToolRegistryEntry {
        ToolRegistryEntry {
            name: name.into(),
            tool_type: ToolType::Builtin,
            scope: ToolScope::Global,
            source: "config:builtin".into(),
            project_hash: None,
            description: None,
            server_name: None,
            trigger_hints: None,
            usage_count,
            last_used_at: Some(Utc::now()),
        }
    }

    #[test]
    fn server_entry_suppresses_its_own_child_tools() {
        let mut server = entry("my-server", 10);
        server.tool_type = ToolType::McpServer;
        let mut child = entry("my-server/some_tool", 5);
        child.server_name = Some("my-server".into());
        let ranked = rank_and_dedup_tools(vec![server, child]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].name, "my-server");
    }

    #[test]
    fn assemble_on_empty_store_returns_empty_context() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("test.db")).unwrap();
        let project = ProjectHash::from_raw("abc0000000000000");
        let assembled = assemble(&store, &project, "session-1", &test_worker()).unwrap();
        assert!(assembled.is_empty());
    }

    #[test]
    fn assemble_includes_prior_summary() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("test.db")).unwrap();
        let project = ProjectHash::from_raw("abc0000000000001");
        store.start_session("session-0", &project).unwrap();
        store.end_session("session-0", Some("worked on the parser".into())).unwrap();

        let assembled = assemble(&store, &project, "session-1", &test_worker()).unwrap();
        assert!(assembled.contains("worked on the parser"));
    }
}
