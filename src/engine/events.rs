//! Events the engine publishes to its subscribers.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::engine::balance::{BalanceSnapshot, ReadError};
use crate::engine::operation::OperationRecord;

/// Capacity of the event channel; slow subscribers observe `Lagged`.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Something a presentation layer may want to re-render on.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A new snapshot was adopted, or the cache was cleared (`None`).
    SnapshotUpdated(Option<Arc<BalanceSnapshot>>),
    /// An operation record changed state.
    OperationUpdated(OperationRecord),
    /// A refresh failed; the previous snapshot is still held.
    RefreshFailed(ReadError),
}

/// Sending half shared by the cache and the state machine.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish to whoever is listening. No subscribers is not an error.
    pub fn publish(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
