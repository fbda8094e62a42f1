// SPDX-License-Identifier: MPL-2.0

//! Change notifications for the presentation layer.
//!
//! The store and sync engine never talk to a renderer directly. They publish
//! [`DashboardEvent`]s on a broadcast channel and whatever front end is
//! attached subscribes to it.

use tokio::sync::broadcast;

use super::model::DashboardSnapshot;

/// Capacity of the event channel. Slow subscribers skip ahead on overflow.
const EVENT_CAPACITY: usize = 256;

/// How a refresh ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New snapshot stored
    Updated,
    /// Source failed; message stored in the widget's `error`
    Failed(String),
    /// Widget was removed while the fetch was in flight; result dropped
    Discarded,
    /// Refresh task ended before the source answered
    Aborted,
}

/// Events a UI layer binds to.
#[derive(Debug, Clone)]
pub enum DashboardEvent {
    /// Either collection changed. Carries a full copy of both.
    StateChanged(DashboardSnapshot),
    RefreshStarted { id: String },
    RefreshFinished { id: String, outcome: RefreshOutcome },
    /// Write-through save failed. In-memory state is still authoritative.
    PersistenceFailed { message: String },
}

/// Sending half of the event channel, shared by the store and the engine.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DashboardEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: DashboardEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
