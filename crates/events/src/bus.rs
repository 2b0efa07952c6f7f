//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between the race clocks that
//! publish and the background services that subscribe.

use chrono::{DateTime, Utc};
use lapwatch_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

pub const RACE_STARTED: &str = "race.started";
pub const RACE_LAP_COMPLETED: &str = "race.lap_completed";
pub const RACE_COMPLETED: &str = "race.completed";
/// A persistence write issued by a race clock failed.
pub const RACE_WRITE_FAILED: &str = "race.write_failed";

// ---------------------------------------------------------------------------
// RaceEvent
// ---------------------------------------------------------------------------

/// Something that happened to a race while its clock was loaded.
///
/// Built with [`RaceEvent::new`] and the `with_*` methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceEvent {
    /// Dot-separated event name, e.g. `"race.lap_completed"`.
    pub event_type: String,

    pub race_id: DbId,

    /// Owner of the race.
    pub owner_id: Option<String>,

    /// Event-specific data.
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl RaceEvent {
    pub fn new(event_type: impl Into<String>, race_id: DbId) -> Self {
        Self {
            event_type: event_type.into(),
            race_id,
            owner_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn is_write_failure(&self) -> bool {
        self.event_type == RACE_WRITE_FAILED
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use lapwatch_events::bus::{EventBus, RaceEvent, RACE_STARTED};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(RaceEvent::new(RACE_STARTED, 1));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<RaceEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// Slow receivers observe `RecvError::Lagged` once the buffer overflows.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Without subscribers the event is dropped.
    pub fn publish(&self, event: RaceEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RaceEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
