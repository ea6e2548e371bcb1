//! Ordered, de-duplicated message list for one session.

use std::collections::BTreeMap;

use crate::message::Message;
use crate::types::DbId;

/// Result of offering a message to a [`MessageTimeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Appended,
    /// A message with this id is already present. Nothing changed.
    Duplicate,
    /// The message belongs to a different session. Nothing changed.
    ForeignSession,
}

/// Messages of one session keyed by server id.
///
/// Iteration is always in ascending id order regardless of arrival order,
/// so a write response and a pushed event carrying the same message
/// converge on exactly one entry.
#[derive(Debug, Clone)]
pub struct MessageTimeline {
    session_id: DbId,
    messages: BTreeMap<DbId, Message>,
}

impl MessageTimeline {
    pub fn new(session_id: DbId) -> Self {
        Self {
            session_id,
            messages: BTreeMap::new(),
        }
    }

    pub fn session_id(&self) -> DbId {
        self.session_id
    }

    pub fn insert(&mut self, message: Message) -> InsertOutcome {
        if message.session_id != self.session_id {
            return InsertOutcome::ForeignSession;
        }
        if self.messages.contains_key(&message.id) {
            return InsertOutcome::Duplicate;
        }
        self.messages.insert(message.id, message);
        InsertOutcome::Appended
    }

    /// Merge a fetched page, returning how many messages were new.
    pub fn merge(&mut self, messages: impl IntoIterator<Item = Message>) -> usize {
        let mut added = 0;
        for message in messages {
            if self.insert(message) == InsertOutcome::Appended {
                added += 1;
            }
        }
        added
    }

    pub fn contains(&self, id: DbId) -> bool {
        self.messages.contains_key(&id)
    }

    pub fn get(&self, id: DbId) -> Option<&Message> {
        self.messages.get(&id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last_id(&self) -> Option<DbId> {
        self.messages.keys().next_back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.values()
    }

    pub fn to_vec(&self) -> Vec<Message> {
        self.messages.values().cloned().collect()
    }
}
