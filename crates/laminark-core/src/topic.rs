//! TopicDetector (§4.5).
//!
//! Per-session centroid/window/EWMA state that watches newly embedded
//! observations and decides whether the user's topic has shifted. This
//! state is process-local working memory, not a data-model entity — only
//! its audit trail (`ShiftDecision`) is persisted, so a restart forgets the
//! running centroid but not the decision history.

use crate::broadcast::{Broadcast, BroadcastEvent};
use crate::budget::truncate_chars_at_line_boundary;
use crate::config::TopicConfig;
use crate::embeddings::cosine_similarity;
use crate::error::Result;
use crate::models::{ObservationSnapshot, ShiftDecision, Stash, StashStatus};
use crate::project::ProjectHash;
use crate::storage::{ListFilters, Store};
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Smoothing factor for the running EWMA of cosine distances.
const EWMA_ALPHA: f32 = 0.2;
/// How strongly the EWMA pulls the adaptive threshold: a session whose
/// typical distance is high (noisy/broad) ends up with a higher tau, a
/// tightly-focused session ends up with a lower one.
const TAU_RESPONSIVENESS: f32 = 1.5;
const STASH_FETCH_LIMIT: usize = 50;

struct TopicState {
    window: VecDeque<(String, Vec<f32>)>,
    centroid: Vec<f32>,
    tau: f32,
    ewma_distance: f32,
}

impl TopicState {
    fn new(tau_initial: f32) -> Self {
        Self { window: VecDeque::new(), centroid: Vec::new(), tau: tau_initial, ewma_distance: tau_initial }
    }

    fn recompute_centroid(&mut self) {
        let Some((_, first)) = self.window.front() else {
            self.centroid.clear();
            return;
        };
        let mut sum = vec![0.0_f32; first.len()];
        for (_, v) in &self.window {
            for (i, x) in v.iter().enumerate() {
                sum[i] += x;
            }
        }
        let n = self.window.len() as f32;
        for x in &mut sum {
            *x /= n;
        }
        self.centroid = sum;
    }
}

/// Holds one [`TopicState`] per active session.
pub struct TopicDetector {
    config: TopicConfig,
    states: Mutex<HashMap<String, TopicState>>,
}

impl TopicDetector {
    pub fn new(config: TopicConfig) -> Self {
        Self { config, states: Mutex::new(HashMap::new()) }
    }

    /// Process one newly embedded observation for `session_id`. Returns the
    /// stash created on a detected shift, if any. Strictly follows
    /// embedding (callers only ever pass an already-embedded vector), and
    /// is the only caller that mutates this session's state, so there is at
    /// most one detection in flight per observation.
    pub fn observe(
        &self,
        store: &Store,
        broadcast: &Broadcast,
        project: &ProjectHash,
        session_id: &str,
        observation_id: &str,
        vector: &[f32],
    ) -> Result<Option<Stash>> {
        let shifted_session = {
            let mut states = self.states.lock().expect("topic detector lock poisoned");
            let state = states
                .entry(session_id.to_string())
                .or_insert_with(|| TopicState::new(self.config.tau_initial));

            if state.window.len() < self.config.window_min {
                state.window.push_back((observation_id.to_string(), vector.to_vec()));
                state.recompute_centroid();
                return Ok(None);
            }

            let distance = 1.0 - cosine_similarity(vector, &state.centroid);
            let shifted = distance > state.tau;

            let decision = ShiftDecision {
                id: uuid::Uuid::new_v4().to_string(),
                session_id: session_id.to_string(),
                distance,
                threshold: state.tau,
                shifted,
                confidence: Some((distance - state.tau).abs()),
                created_at: Utc::now(),
            };
            store.record_shift_decision(&decision)?;

            state.ewma_distance = EWMA_ALPHA * distance + (1.0 - EWMA_ALPHA) * state.ewma_distance;
            state.tau =
                (state.ewma_distance * TAU_RESPONSIVENESS).clamp(self.config.tau_min, self.config.tau_max);

            if !shifted {
                state.window.push_back((observation_id.to_string(), vector.to_vec()));
                if state.window.len() > self.config.window_max {
                    state.window.pop_front();
                }
                state.recompute_centroid();
                return Ok(None);
            }

            state.window.clear();
            state.centroid.clear();
            true
        };

        if !shifted_session {
            return Ok(None);
        }

        let stash = self.build_stash(store, project, session_id)?;
        store.create_stash(&stash)?;
        store.enqueue_notification(
            project,
            &format!("previous context stashed as \"{}\", use /resume to return.", stash.topic_label),
        )?;
        broadcast.publish(BroadcastEvent::TopicShift {
            session_id: session_id.to_string(),
            stash_id: stash.id.clone(),
            topic_label: stash.topic_label.clone(),
            timestamp: Utc::now(),
        });

        Ok(Some(stash))
    }

    fn build_stash(&self, store: &Store, project: &ProjectHash, session_id: &str) -> Result<Stash> {
        let filters = ListFilters {
            session_id: Some(session_id.to_string()),
            include_deleted: false,
            limit: STASH_FETCH_LIMIT,
        };
        let mut observations = store.list_observations(project, &filters)?;
        observations.reverse(); // oldest first

        let topic_label = observations
            .first()
            .map(|o| o.title.clone().unwrap_or_else(|| truncate_chars_at_line_boundary(&o.content, 60)))
            .unwrap_or_else(|| "untitled context".to_string());

        let summary = observations
            .iter()
            .take(3)
            .map(|o| o.title.clone().unwrap_or_else(|| truncate_chars_at_line_boundary(&o.content, 60)))
            .collect::<Vec<_>>()
            .join("; ");

        let snapshots = observations
            .iter()
            .map(|o| ObservationSnapshot {
                observation_id: o.id.clone(),
                content: o.content.clone(),
                kind: o.kind,
                timestamp: o.created_at,
                embedding: None,
            })
            .collect();

        Ok(Stash {
            id: uuid::Uuid::new_v4().to_string(),
            project_hash: project.clone(),
            session_id: session_id.to_string(),
            topic_label,
            summary,
            observations: snapshots,
            created_at: Utc::now(),
            resumed_at: None,
            status: StashStatus::Stashed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0_f32; dim];
        v[hot] = 1.0;
        v
    }

    fn setup() -> (TopicDetector, Store, Broadcast, ProjectHash, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("test.db")).unwrap();
        let mut config = TopicConfig::default();
        config.window_min = 3;
        config.window_max = 5;
        let detector = TopicDetector::new(config);
        let broadcast = Broadcast::new();
        let project = ProjectHash::from_raw("abc0000000000003");
        store.start_session("session-1", &project).unwrap();
        (detector, store, broadcast, project, dir)
    }

    #[test]
    fn warmup_period_never_declares_a_shift() {
        let (detector, store, broadcast, project, _dir) = setup();
        for i in 0..3 {
            let obs = store.create_observation(&project, None, format!("obs {i}"), "hook:Write".into(), Some("session-1".into())).unwrap();
            let result = detector.observe(&store, &broadcast, &project, "session-1", &obs.id, &unit(4, 0)).unwrap();
            assert!(result.is_none());
        }
    }

    #[test]
    fn consistent_topic_never_shifts() {
        let (detector, store, broadcast, project, _dir) = setup();
        let mut last = None;
        for i in 0..8 {
            let obs = store.create_observation(&project, None, format!("obs {i}"), "hook:Write".into(), Some("session-1".into())).unwrap();
            last = detector.observe(&store, &broadcast, &project, "session-1", &obs.id, &unit(4, 0)).unwrap();
        }
        assert!(last.is_none());
    }

    #[test]
    fn abrupt_direction_change_triggers_a_shift_and_stash() {
        let (detector, store, broadcast, project, _dir) = setup();
        for i in 0..4 {
            let obs = store.create_observation(&project, None, format!("topic a {i}"), "hook:Write".into(), Some("session-1".into())).unwrap();
            detector.observe(&store, &broadcast, &project, "session-1", &obs.id, &unit(4, 0)).unwrap();
        }
        let obs = store.create_observation(&project, None, "topic b".into(), "hook:Write".into(), Some("session-1".into())).unwrap();
        let result = detector.observe(&store, &broadcast, &project, "session-1", &obs.id, &unit(4, 2)).unwrap();
        assert!(result.is_some());
        let stash = result.unwrap();
        assert!(!stash.observations.is_empty());

        let pending = store.consume_pending_notifications(&project).unwrap();
        assert_eq!(pending.len(), 1);
    }
}
