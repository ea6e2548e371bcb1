//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`ClientEvent`]s. It is
//! shared via `Arc<EventBus>` between the stores, the session views, and
//! the channel bridge.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use mentorlink_core::session::SessionStatus;
use mentorlink_core::types::DbId;

// ---------------------------------------------------------------------------
// ClientEvent
// ---------------------------------------------------------------------------

/// Something that changed in the client's view of the world.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientEvent {
    /// The cached session's status or meeting link changed.
    SessionChanged {
        session_id: DbId,
        status: SessionStatus,
    },
    /// The session was re-fetched wholesale (e.g. after re-activation).
    SessionRefetched { session_id: DbId },
    /// The cached schedule was replaced.
    ScheduleReplaced {
        session_id: DbId,
        completed: usize,
        total: usize,
    },
    /// A message entered the local timeline (from either path).
    MessageAppended { session_id: DbId, message_id: DbId },
    /// The mentor published a new assignment.
    AssignmentCreated {
        session_id: DbId,
        assignment_id: DbId,
    },
    /// The student's submission was accepted by the server.
    AssignmentSubmitted {
        session_id: DbId,
        assignment_id: DbId,
    },
    ChannelConnected,
    ChannelDisconnected,
}

impl ClientEvent {
    /// The session this event concerns, if any.
    pub fn session_id(&self) -> Option<DbId> {
        match self {
            Self::SessionChanged { session_id, .. }
            | Self::SessionRefetched { session_id }
            | Self::ScheduleReplaced { session_id, .. }
            | Self::MessageAppended { session_id, .. }
            | Self::AssignmentCreated { session_id, .. }
            | Self::AssignmentSubmitted { session_id, .. } => Some(*session_id),
            Self::ChannelConnected | Self::ChannelDisconnected => None,
        }
    }
}

/// A published event with its publish time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventEnvelope {
    pub event: ClientEvent,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use mentorlink_events::bus::{ClientEvent, EventBus};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(ClientEvent::ChannelConnected);
/// ```
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed events are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Events published with no subscribers are dropped.
    pub fn publish(&self, event: ClientEvent) {
        tracing::trace!(?event, "Publishing client event");
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(EventEnvelope {
            event,
            timestamp: Utc::now(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
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
