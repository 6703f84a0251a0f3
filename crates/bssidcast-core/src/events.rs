//! Scheduler event stream.
//!
//! The scheduler never touches presentation state. A UI shell subscribes to
//! these events and renders status text and network lists from them.

use serde::Serialize;
use tokio::sync::broadcast;

use bssidcast_types::Snapshot;

use crate::snapshot::DisplayView;
use crate::state::SchedulerState;

/// Events emitted by the publish scheduler.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SchedulerEvent {
    /// The scheduler moved to a new state.
    StateChanged { state: SchedulerState },
    /// Human-readable status line.
    StatusChanged { text: String },
    /// A scan finished; the listing is ready to render.
    ScanCompleted { view: DisplayView },
    /// A snapshot was built and is about to be published.
    SnapshotReady { snapshot: Snapshot },
    /// A publish attempt finished.
    PublishCompleted {
        topic: String,
        count: usize,
        /// Failure description, `None` on success.
        error: Option<String>,
    },
}

/// Sender for scheduler events.
pub type EventSender = broadcast::Sender<SchedulerEvent>;

/// Receiver for scheduler events.
pub type EventReceiver = broadcast::Receiver<SchedulerEvent>;

/// Fan-out of scheduler events to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: SchedulerEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Emit a status line.
    pub fn status(&self, text: impl Into<String>) {
        self.send(SchedulerEvent::StatusChanged { text: text.into() });
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}
