use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::RunView;

pub const EVENT_RELEASE_UPDATE: &str = "doc.release.update";
pub const EVENT_TEST_RUN_UPDATE: &str = "test_run.update";

/// One push-channel message. The payload is the full current public view of
/// the run, not a delta, so a late-joining listener can render current
/// state from a single message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEvent {
    pub event: String,
    /// Stage keyword, e.g. "processing".
    pub message: String,
    pub payload: RunView,
}

/// Fans progress and completion events out to interested listeners.
///
/// Delivery is at-most-once and nothing is persisted: a lagging or
/// disconnected listener misses events and must poll the run state to
/// resynchronize.
#[derive(Debug, Clone)]
pub struct ProgressBroadcaster {
    tx: broadcast::Sender<PushEvent>,
}

impl ProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: PushEvent) {
        // No receivers is not an error; events are fire-and-forget.
        let _ = self.tx.send(event);
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}
