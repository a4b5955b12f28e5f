//! Broadcast channel for task and asset changes.
//!
//! Every subscriber open at publish time receives the message; nothing is
//! replayed to late subscribers and a subscriber that falls behind loses the
//! oldest messages.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use shotwatch_core::{AssetFile, TaskState};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Payload of a broadcast message, tagged as `{type, data}` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum HubEvent {
    FileAdded(AssetFile),
    FileModified(AssetFile),
    FileDeleted(AssetFile),
    TaskUpdated(Box<TaskState>),
    #[serde(rename_all = "camelCase")]
    TaskRemoved { task_id: String },
}

impl HubEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            HubEvent::FileAdded(_) => "fileAdded",
            HubEvent::FileModified(_) => "fileModified",
            HubEvent::FileDeleted(_) => "fileDeleted",
            HubEvent::TaskUpdated(_) => "taskUpdated",
            HubEvent::TaskRemoved { .. } => "taskRemoved",
        }
    }

    pub fn task_id(&self) -> &str {
        match self {
            HubEvent::FileAdded(a) | HubEvent::FileModified(a) | HubEvent::FileDeleted(a) => &a.task_id,
            HubEvent::TaskUpdated(t) => &t.task_id,
            HubEvent::TaskRemoved { task_id } => task_id,
        }
    }
}

/// `{type, data, timestamp}` with `timestamp` in unix milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubMessage {
    #[serde(flatten)]
    pub event: HubEvent,
    pub timestamp: i64,
}

impl HubMessage {
    pub fn now(event: HubEvent) -> Self {
        Self { event, timestamp: Utc::now().timestamp_millis() }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Clone)]
pub struct BroadcastHub {
    tx: broadcast::Sender<HubMessage>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Sends to every current subscriber. Returns how many received it; zero
    /// subscribers is not an error.
    pub fn publish(&self, event: HubEvent) -> usize {
        let kind = event.kind();
        match self.tx.send(HubMessage::now(event)) {
            Ok(receivers) => {
                debug!("📣 Hub: {} -> {} subscribers", kind, receivers);
                receivers
            }
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription { rx: self.tx.subscribe() }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// One subscriber's view of the hub.
pub struct Subscription {
    rx: broadcast::Receiver<HubMessage>,
}

impl Subscription {
    /// Next message, skipping over any that were dropped while lagging.
    /// `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<HubMessage> {
        loop {
            match self.rx.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("📣 Hub: subscriber lagged, {} messages dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`Subscription::recv`].
    pub fn try_recv(&mut self) -> Option<HubMessage> {
        loop {
            match self.rx.try_recv() {
                Ok(message) => return Some(message),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("📣 Hub: subscriber lagged, {} messages dropped", skipped);
                }
                Err(_) => return None,
            }
        }
    }
}
