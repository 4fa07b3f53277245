//! In-process pub/sub bus (§4.9).
//!
//! Grounded on the dashboard event bus's `VestigeEvent` shape (tagged enum,
//! `to_json` convenience method) but scoped to the six events this spec
//! names and with no HTTP/WebSocket delivery surface of its own — this
//! module only provides the channel, the replay buffer, and an SSE
//! formatter. A caller that wants to expose it over a socket wires that up
//! itself.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;

const RING_BUFFER_CAPACITY: usize = 100;
const CHANNEL_CAPACITY: usize = 256;

/// The six event kinds named by §4.9.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum BroadcastEvent {
    NewObservation { observation_id: String, project_hash: String, timestamp: DateTime<Utc> },
    EntityUpdated { node_id: String, node_name: String, timestamp: DateTime<Utc> },
    TopicShift { session_id: String, stash_id: String, topic_label: String, timestamp: DateTime<Utc> },
    SessionStart { session_id: String, project_hash: String, timestamp: DateTime<Utc> },
    SessionEnd { session_id: String, timestamp: DateTime<Utc> },
    Heartbeat { uptime_secs: u64, timestamp: DateTime<Utc> },
}

impl BroadcastEvent {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    fn name(&self) -> &'static str {
        match self {
            BroadcastEvent::NewObservation { .. } => "new_observation",
            BroadcastEvent::EntityUpdated { .. } => "entity_updated",
            BroadcastEvent::TopicShift { .. } => "topic_shift",
            BroadcastEvent::SessionStart { .. } => "session_start",
            BroadcastEvent::SessionEnd { .. } => "session_end",
            BroadcastEvent::Heartbeat { .. } => "heartbeat",
        }
    }
}

/// A broadcast event with its assigned monotonic id, as stored in the
/// replay ring buffer and as delivered to subscribers.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub id: u64,
    pub event: BroadcastEvent,
}

impl Envelope {
    /// Render as an SSE wire frame (§6): `id`, `event`, `data` lines.
    pub fn to_sse_frame(&self) -> String {
        format!("id: {}\nevent: {}\ndata: {}\n\n", self.id, self.event.name(), self.event.to_json())
    }
}

/// In-process event bus. `tokio::sync::broadcast` already drops lagging or
/// closed receivers without blocking senders, which is what gives us the
/// "non-blocking client removal" behavior for free.
pub struct Broadcast {
    sender: broadcast::Sender<Envelope>,
    next_id: AtomicU64,
    ring: Mutex<VecDeque<Envelope>>,
}

impl Broadcast {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender, next_id: AtomicU64::new(1), ring: Mutex::new(VecDeque::with_capacity(RING_BUFFER_CAPACITY)) }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.sender.subscribe()
    }

    /// Publish `event`, assigning it the next monotonic id and recording it
    /// in the replay buffer. A send with no active subscribers is not an
    /// error.
    pub fn publish(&self, event: BroadcastEvent) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let envelope = Envelope { id, event };

        {
            let mut ring = self.ring.lock().expect("broadcast ring lock poisoned");
            if ring.len() == RING_BUFFER_CAPACITY {
                ring.pop_front();
            }
            ring.push_back(envelope.clone());
        }

        let _ = self.sender.send(envelope);
        id
    }

    /// Events strictly after `last_seen_id`, for a reconnecting subscriber
    /// replaying from the ring buffer.
    pub fn replay_since(&self, last_seen_id: u64) -> Vec<Envelope> {
        self.ring
            .lock()
            .expect("broadcast ring lock poisoned")
            .iter()
            .filter(|e| e.id > last_seen_id)
            .cloned()
            .collect()
    }
}

impl Default for Broadcast {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heartbeat() -> BroadcastEvent {
        BroadcastEvent::Heartbeat { uptime_secs: 1, timestamp: Utc::now() }
    }

    #[test]
    fn publish_assigns_monotonically_increasing_ids() {
        let bus = Broadcast::new();
        let a = bus.publish(heartbeat());
        let b = bus.publish(heartbeat());
        assert!(b > a);
    }

    #[test]
    fn ring_buffer_caps_at_100() {
        let bus = Broadcast::new();
        for _ in 0..150 {
            bus.publish(heartbeat());
        }
        assert_eq!(bus.ring.lock().unwrap().len(), RING_BUFFER_CAPACITY);
    }

    #[test]
    fn replay_since_returns_only_newer_events() {
        let bus = Broadcast::new();
        let first = bus.publish(heartbeat());
        bus.publish(heartbeat());
        bus.publish(heartbeat());
        let replayed = bus.replay_since(first);
        assert_eq!(replayed.len(), 2);
        assert!(replayed.iter().all(|e| e.id > first));
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_error() {
        let bus = Broadcast::new();
        bus.publish(heartbeat());
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = Broadcast::new();
        let mut rx = bus.subscribe();
        bus.publish(heartbeat());
        let received = rx.recv().await.unwrap();
        assert_eq!(received.event.name(), "heartbeat");
    }

    #[test]
    fn sse_frame_has_expected_shape() {
        let envelope = Envelope { id: 7, event: heartbeat() };
        let frame = envelope.to_sse_frame();
        assert!(frame.starts_with("id: 7\n"));
        assert!(frame.contains("event: heartbeat\n"));
        assert!(frame.contains("data: "));
    }
}
