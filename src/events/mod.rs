//! In-process change notifications for live subscriptions.
//!
//! Every successful write publishes a [`ChangeEvent`]. Subscribers re-read the
//! collection they follow, so a lagging receiver only loses intermediate
//! states, never the latest one.

use serde::Serialize;
use tokio::sync::broadcast;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// Collections that can be subscribed to.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Posts,
    Squads,
}

/// What happened to the record(s).
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
    /// A whole batch was replaced (ingestion run)
    Replaced,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub kind: ChangeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ChangeEvent {
    pub fn new(collection: Collection, kind: ChangeKind, id: Option<String>) -> Self {
        Self {
            collection,
            kind,
            id,
        }
    }
}

/// Fan-out bus over a [`broadcast`] channel.
pub struct EventBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers; dropped when nobody listens.
    pub fn publish(&self, event: ChangeEvent) {
        tracing::debug!(
            "change event: {:?} {:?} {:?}",
            event.collection,
            event.kind,
            event.id
        );
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
