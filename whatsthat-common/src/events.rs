//! Queue change events
//!
//! Every mutation of a venue queue is published on the [`EventBus`]; the HTTP
//! service forwards the events of one venue to its playback page over SSE.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::models::{SongQueueEntry, TaskId, VenueId};

/// Queue event published by the reconciler and the queue endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QueueEvent {
    /// A new entry was appended to the venue queue
    EntryAdded {
        venue_id: VenueId,
        entry: SongQueueEntry,
        timestamp: DateTime<Utc>,
    },

    /// An entry received a playable URL
    EntryReady {
        venue_id: VenueId,
        entry: SongQueueEntry,
        timestamp: DateTime<Utc>,
    },

    /// An entry was removed (played or skipped)
    EntryRemoved {
        venue_id: VenueId,
        task_id: TaskId,
        timestamp: DateTime<Utc>,
    },

    /// The generation API reported a failure for a tracked task
    TaskFailed {
        venue_id: VenueId,
        task_id: TaskId,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl QueueEvent {
    /// Venue the event belongs to
    pub fn venue_id(&self) -> &str {
        match self {
            QueueEvent::EntryAdded { venue_id, .. }
            | QueueEvent::EntryReady { venue_id, .. }
            | QueueEvent::EntryRemoved { venue_id, .. }
            | QueueEvent::TaskFailed { venue_id, .. } => venue_id,
        }
    }

    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            QueueEvent::EntryAdded { .. } => "EntryAdded",
            QueueEvent::EntryReady { .. } => "EntryReady",
            QueueEvent::EntryRemoved { .. } => "EntryRemoved",
            QueueEvent::TaskFailed { .. } => "TaskFailed",
        }
    }
}

/// Broadcast bus for [`QueueEvent`]s
///
/// Publishing never blocks; subscribers that fall behind by more than the
/// channel capacity lose the oldest events.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<QueueEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: QueueEvent) {
        if let Err(e) = self.tx.send(event) {
            trace!("No subscribers for {} event", e.0.event_type());
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
