//! Session chat messages.
//!
//! Messages are totally ordered by their server-assigned `id`, which is
//! also the de-duplication key. Ephemeral meeting links are judged
//! against the session at render time, never at receipt time.

use serde::{Deserialize, Serialize};

use crate::session::MentorshipSession;
use crate::types::{DbId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SenderRole {
    Student,
    Mentor,
    System,
}

/// Metadata for an uploaded attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub name: String,
    pub mime_type: String,
    pub url: String,
    pub size: u64,
}

/// Typed message body, encoded as `{"type": ..., "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageContent {
    Text(String),
    File(FileDescriptor),
    EphemeralLink(String),
    System(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: DbId,
    pub session_id: DbId,
    /// Absent for system notices.
    #[serde(default)]
    pub sender_id: Option<DbId>,
    pub sender_role: SenderRole,
    pub content: MessageContent,
    pub created_at: Timestamp,
}

/// Whether an ephemeral meeting link can still be joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Joinable,
    /// Replaced by a newer link, or the session has completed.
    Ended,
}

/// A message body ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedBody<'a> {
    Text(&'a str),
    File(&'a FileDescriptor),
    MeetingLink { link: &'a str, state: LinkState },
    Notice(&'a str),
}

impl Message {
    /// Resolve the body against the session as it is *now*.
    pub fn render<'a>(&'a self, session: &MentorshipSession) -> RenderedBody<'a> {
        match &self.content {
            MessageContent::Text(text) => RenderedBody::Text(text),
            MessageContent::File(file) => RenderedBody::File(file),
            MessageContent::EphemeralLink(link) => RenderedBody::MeetingLink {
                link,
                state: link_state(link, session),
            },
            MessageContent::System(text) => RenderedBody::Notice(text),
        }
    }

    pub fn is_from(&self, user_id: DbId) -> bool {
        self.sender_id == Some(user_id)
    }
}

/// Staleness rule for ephemeral links.
pub fn link_state(link: &str, session: &MentorshipSession) -> LinkState {
    if session.is_link_live(link) {
        LinkState::Joinable
    } else {
        LinkState::Ended
    }
}
