//! Orchestrator (§4.10): process lifecycle — opens the store, resolves
//! config, stands up the embedding worker and the two background loops,
//! and hands out the handles `laminark-server` wires into hook/tool calls.
//!
//! Grounded on the teacher's `main.rs` background-loop spawn pattern
//! (interval sleep loop started after a short startup delay so it never
//! competes with the stdio handshake), generalized from its single
//! consolidation loop into the embedding-sweep and curation loops this
//! spec names. Summarization has no loop of its own here — it runs
//! synchronously inside `HookIngest::handle` on `SessionEnd` (see
//! `hooks::HookIngest`), so there are two background tasks, not three.

use crate::broadcast::Broadcast;
use crate::config::Config;
use crate::embeddings::piggyback::PiggybackCache;
use crate::embeddings::worker::EmbeddingWorker;
use crate::error::Result;
use crate::graph::GraphPipeline;
use crate::project::ProjectHash;
use crate::storage::Store;
use crate::topic::TopicDetector;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const EMBEDDING_SWEEP_INTERVAL: Duration = Duration::from_secs(5);
const EMBEDDING_SWEEP_BATCH: usize = 32;
const CURATION_INTERVAL: Duration = Duration::from_secs(5 * 60);
const STARTUP_DELAY: Duration = Duration::from_secs(2);

/// Owns every long-lived handle the process needs and the two background
/// loops that keep embeddings and the graph fresh without blocking the
/// request domain (§5). One `Orchestrator` serves one project, the same
/// way `HookIngest` is constructed with a single fixed [`ProjectHash`] —
/// the store itself is capable of holding rows from several projects, but
/// nothing in this crate currently fans a single process out across them.
pub struct Orchestrator {
    store: Arc<Store>,
    broadcast: Arc<Broadcast>,
    embedding_worker: EmbeddingWorker,
    topic_detector: Arc<TopicDetector>,
    graph_pipeline: Arc<GraphPipeline>,
    config: Config,
    project: ProjectHash,
}

impl Orchestrator {
    /// Resolve config, open the store, and build every handle. Does not
    /// spawn background loops — call [`Orchestrator::spawn_background_loops`]
    /// once a tokio runtime is running.
    pub fn new(data_dir: impl AsRef<Path>, project: ProjectHash) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let config = Config::load(data_dir);
        let store = Arc::new(Store::open(data_dir.join("laminark.db"))?);
        let broadcast = Arc::new(Broadcast::new());
        let piggyback = Arc::new(PiggybackCache::new(crate::embeddings::EMBEDDING_DIMENSIONS));
        let embedding_worker = EmbeddingWorker::new(config.embedding_mode, piggyback);
        let topic_detector = Arc::new(TopicDetector::new(config.topic.clone()));
        let graph_pipeline = Arc::new(GraphPipeline::new(config.graph.clone()));

        Ok(Self { store, broadcast, embedding_worker, topic_detector, graph_pipeline, config, project })
    }

    pub fn project(&self) -> &ProjectHash {
        &self.project
    }

    /// Build a [`crate::hooks::HookIngest`] bound to this orchestrator's
    /// store, broadcast bus, config, and project.
    pub fn hook_ingest(&self) -> crate::hooks::HookIngest {
        crate::hooks::HookIngest::new(
            self.store.clone(),
            self.broadcast.clone(),
            self.config.clone(),
            self.project.clone(),
            self.embedding_worker.clone(),
        )
    }

    pub fn store(&self) -> Arc<Store> {
        self.store.clone()
    }

    pub fn broadcast(&self) -> Arc<Broadcast> {
        self.broadcast.clone()
    }

    pub fn embedding_worker(&self) -> EmbeddingWorker {
        self.embedding_worker.clone()
    }

    pub fn topic_detector(&self) -> Arc<TopicDetector> {
        self.topic_detector.clone()
    }

    pub fn graph_pipeline(&self) -> Arc<GraphPipeline> {
        self.graph_pipeline.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Spawn the embedding-sweep and curation loops. Each runs as a single
    /// `tokio::task` with no intra-loop parallelism (§5) — one sweep or
    /// curation pass always finishes before the next tick is considered.
    pub fn spawn_background_loops(&self) {
        self.spawn_embedding_sweep();
        self.spawn_curation_sweep();
    }

    fn spawn_embedding_sweep(&self) {
        let store = self.store.clone();
        let broadcast = self.broadcast.clone();
        let worker = self.embedding_worker.clone();
        let topic_detector = self.topic_detector.clone();
        let graph_pipeline = self.graph_pipeline.clone();

        tokio::spawn(async move {
            tokio::time::sleep(STARTUP_DELAY).await;
            loop {
                if let Err(e) =
                    run_embedding_sweep(&store, &broadcast, &worker, &topic_detector, &graph_pipeline).await
                {
                    tracing::warn!("embedding sweep failed: {e}");
                }
                tokio::time::sleep(EMBEDDING_SWEEP_INTERVAL).await;
            }
        });
    }

    fn spawn_curation_sweep(&self) {
        let store = self.store.clone();
        let graph_pipeline = self.graph_pipeline.clone();
        let project = self.project.clone();

        tokio::spawn(async move {
            tokio::time::sleep(STARTUP_DELAY).await;
            loop {
                match graph_pipeline.curate(&store, &project) {
                    Ok(report) => {
                        if report.edges_decayed > 0 || report.edges_deleted > 0 || report.nodes_merged > 0 {
                            tracing::info!(
                                edges_decayed = report.edges_decayed,
                                edges_deleted = report.edges_deleted,
                                nodes_merged = report.nodes_merged,
                                "graph curation pass complete"
                            );
                        }
                    }
                    Err(e) => tracing::warn!("graph curation failed: {e}"),
                }
                tokio::time::sleep(CURATION_INTERVAL).await;
            }
        });
    }
}

/// One embedding-sweep tick: pull a batch of unembedded observations,
/// embed each (off-thread, 30s timeout), persist the vector, then feed it
/// to the topic detector and graph pipeline — strictly after embedding, per
/// §4.5's ordering requirement.
async fn run_embedding_sweep(
    store: &Store,
    broadcast: &Broadcast,
    worker: &EmbeddingWorker,
    topic_detector: &TopicDetector,
    graph_pipeline: &GraphPipeline,
) -> Result<()> {
    let pending = store.unembedded_observations(EMBEDDING_SWEEP_BATCH)?;
    for observation in pending {
        let Some(vector) = worker.embed(observation.content.clone()).await else {
            continue;
        };
        store.update_observation_embedding(&observation.id, &vector, "local")?;

        if let Some(session_id) = &observation.session_id {
            topic_detector.observe(
                store,
                broadcast,
                &observation.project_hash,
                session_id,
                &observation.id,
                &vector,
            )?;
        }

        graph_pipeline.process_observation(store, broadcast, &observation.project_hash, &observation)?;
    }
    Ok(())
}

/// Resolve the data directory the way `serve`/`hook` do: `--data-dir` if
/// given, otherwise the platform data directory under `laminark/`.
pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "laminark")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".laminark"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_opens_a_store_and_writes_back_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let project = ProjectHash::from_raw("abc0000000000005");
        let orchestrator = Orchestrator::new(dir.path(), project.clone()).unwrap();
        assert_eq!(orchestrator.project(), &project);
        assert!(dir.path().join("config.json").exists());
        assert!(dir.path().join("laminark.db").exists());
    }

    #[test]
    fn hook_ingest_is_bound_to_the_orchestrators_project() {
        let dir = tempfile::tempdir().unwrap();
        let project = ProjectHash::from_raw("abc0000000000006");
        let orchestrator = Orchestrator::new(dir.path(), project).unwrap();
        let ingest = orchestrator.hook_ingest();
        let event = crate::models::HookEvent {
            hook_event_name: crate::models::SessionEventKind::SessionStart,
            session_id: "session-1".into(),
            tool_name: None,
            tool_input: None,
            tool_response: None,
        };
        let outcome = ingest.handle(event).unwrap();
        assert!(matches!(outcome, crate::hooks::HookOutcome::SessionStarted { .. }));
    }

    #[tokio::test]
    async fn embedding_sweep_tick_embeds_a_pending_observation() {
        use crate::embeddings::piggyback::PiggybackCache;
        use crate::embeddings::worker::EmbeddingWorker;
        use crate::config::EmbeddingMode;

        let dir = tempfile::tempdir().unwrap();
        let project = ProjectHash::from_raw("abc0000000000007");
        let mut orchestrator = Orchestrator::new(dir.path(), project.clone()).unwrap();
        let content = "decided to use SQLite";
        let piggyback = Arc::new(PiggybackCache::new(4));
        piggyback.submit(content, vec![0.1, 0.2, 0.3, 0.4]);
        orchestrator.embedding_worker = EmbeddingWorker::new(EmbeddingMode::Piggyback, piggyback);

        orchestrator
            .store
            .create_observation(&project, None, content.into(), "hook:Write".into(), None)
            .unwrap();

        run_embedding_sweep(
            &orchestrator.store,
            &orchestrator.broadcast,
            &orchestrator.embedding_worker,
            &orchestrator.topic_detector,
            &orchestrator.graph_pipeline,
        )
        .await
        .unwrap();

        assert!(orchestrator.store.unembedded_observations(10).unwrap().is_empty());
    }
}
