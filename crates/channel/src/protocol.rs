//! Channel wire protocol.
//!
//! Every frame is a JSON text frame shaped `{"event": "<name>", "data": {...}}`.
//! The client sends `join-session` / `leave-session`; the server pushes the
//! five [`ServerEvent`] kinds.

use serde::{Deserialize, Deserializer, Serialize};

use mentorlink_core::assignment::Assignment;
use mentorlink_core::message::Message;
use mentorlink_core::schedule::ScheduleItem;
use mentorlink_core::session::{SessionPatch, SessionStatus};
use mentorlink_core::types::DbId;

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRef {
    pub session_id: DbId,
}

/// Commands the client sends over the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientCommand {
    #[serde(rename = "join-session")]
    JoinSession(SessionRef),

    #[serde(rename = "leave-session")]
    LeaveSession(SessionRef),
}

impl ClientCommand {
    pub fn join(session_id: DbId) -> Self {
        Self::JoinSession(SessionRef { session_id })
    }

    pub fn leave(session_id: DbId) -> Self {
        Self::LeaveSession(SessionRef { session_id })
    }

    pub fn session_id(&self) -> DbId {
        match self {
            Self::JoinSession(r) | Self::LeaveSession(r) => r.session_id,
        }
    }

    /// Encode as a JSON text frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

/// Payload for `session-updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdatedData {
    pub session_id: DbId,
    pub status: SessionStatus,
    /// Absent: unchanged. `null`: cleared.
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub ephemeral_meeting_link: Option<Option<String>>,
}

/// Payload for `mentorship-status-updated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdatedData {
    pub session_id: DbId,
    pub status: SessionStatus,
}

/// Payload for `assignment-created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentCreatedData {
    pub session_id: DbId,
    pub assignment: Assignment,
}

/// Payload for `schedule-updated`. Always the full list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleUpdatedData {
    pub session_id: DbId,
    pub schedule: Vec<ScheduleItem>,
}

/// All known server-pushed events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "new-message")]
    NewMessage(Message),

    #[serde(rename = "session-updated")]
    SessionUpdated(SessionUpdatedData),

    /// Addressed to the user rather than a joined topic; drives list views.
    #[serde(rename = "mentorship-status-updated")]
    MentorshipStatusUpdated(StatusUpdatedData),

    #[serde(rename = "assignment-created")]
    AssignmentCreated(AssignmentCreatedData),

    #[serde(rename = "schedule-updated")]
    ScheduleUpdated(ScheduleUpdatedData),
}

impl ServerEvent {
    pub fn session_id(&self) -> DbId {
        match self {
            Self::NewMessage(m) => m.session_id,
            Self::SessionUpdated(d) => d.session_id,
            Self::MentorshipStatusUpdated(d) => d.session_id,
            Self::AssignmentCreated(d) => d.session_id,
            Self::ScheduleUpdated(d) => d.session_id,
        }
    }

    /// Whether the event is only delivered while its session topic is joined.
    pub fn is_topic_scoped(&self) -> bool {
        !matches!(self, Self::MentorshipStatusUpdated(_))
    }

    /// The session patch carried by this event, if it carries one.
    pub fn session_patch(&self) -> Option<SessionPatch> {
        match self {
            Self::SessionUpdated(d) => Some(SessionPatch {
                status: Some(d.status),
                ephemeral_meeting_link: d.ephemeral_meeting_link.clone(),
            }),
            Self::MentorshipStatusUpdated(d) => Some(SessionPatch {
                status: Some(d.status),
                ephemeral_meeting_link: None,
            }),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NewMessage(_) => "new-message",
            Self::SessionUpdated(_) => "session-updated",
            Self::MentorshipStatusUpdated(_) => "mentorship-status-updated",
            Self::AssignmentCreated(_) => "assignment-created",
            Self::ScheduleUpdated(_) => "schedule-updated",
        }
    }
}

/// Parse a channel text frame into a typed event.
///
/// Returns `Err` for malformed JSON or unknown event names. Callers log
/// and continue.
pub fn parse_event(text: &str) -> Result<ServerEvent, serde_json::Error> {
    serde_json::from_str(text)
}

/// Keep a present `null` distinct from a missing field.
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}
