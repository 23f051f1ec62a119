use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Messages carried between pipeline stages.
///
/// Stages never share in-process state: everything a handler needs beyond
/// the payload lives in persisted storage. Causal ordering comes from
/// explicit chaining (a stage publishes the next message only after its own
/// work succeeds), not from delivery-order guarantees.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "topic", rename_all = "snake_case")]
pub enum BusMessage {
    /// Triggers the vectorize stage for a release.
    #[serde(rename = "releases.create_vectors")]
    CreateVectors { release_id: Uuid },

    /// Triggers snapshot building and evaluation for a release.
    #[serde(rename = "releases.create_check_tree")]
    CreateCheckTree { release_id: Uuid },

    /// Downstream trigger for the (out-of-scope) notification sender.
    #[serde(rename = "notifications.send")]
    SendNotification {
        user_ids: Vec<Uuid>,
        message_text: String,
    },
}

impl BusMessage {
    pub fn topic(&self) -> &'static str {
        match self {
            Self::CreateVectors { .. } => "releases.create_vectors",
            Self::CreateCheckTree { .. } => "releases.create_check_tree",
            Self::SendNotification { .. } => "notifications.send",
        }
    }
}

/// Publishing half of the stage broker. Cheap to clone; the worker owns the
/// receiving half.
#[derive(Debug, Clone)]
pub struct MessageBus {
    tx: mpsc::UnboundedSender<BusMessage>,
}

impl MessageBus {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BusMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn publish(&self, message: BusMessage) {
        tracing::debug!(topic = message.topic(), "Publishing bus message");
        if self.tx.send(message).is_err() {
            tracing::warn!("Bus receiver dropped; message discarded");
        }
    }
}
