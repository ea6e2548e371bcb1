//! Join/leave bookkeeping for session topics.
//!
//! [`SubscriptionTable`] is a pure state machine: every operation is a
//! total function over the current state that returns the commands the
//! caller must put on the wire. At most one session topic is active at a
//! time, and repeating a join or leave never produces a second command.

use mentorlink_core::types::DbId;

use crate::protocol::ClientCommand;

/// Join state of a single session topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    Left,
    /// Wanted, but the transport is down. Sent on the next connect.
    Joining,
    Joined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActiveTopic {
    session_id: DbId,
    state: JoinState,
}

#[derive(Debug, Default)]
pub struct SubscriptionTable {
    connected: bool,
    active: Option<ActiveTopic>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn active_session(&self) -> Option<DbId> {
        self.active.map(|topic| topic.session_id)
    }

    pub fn state_of(&self, session_id: DbId) -> JoinState {
        match self.active {
            Some(topic) if topic.session_id == session_id => topic.state,
            _ => JoinState::Left,
        }
    }

    /// Make `session_id` the active topic.
    ///
    /// Joining the already-active topic is a no-op. Joining a different
    /// topic leaves the previous one in the same batch of commands.
    pub fn join(&mut self, session_id: DbId) -> Vec<ClientCommand> {
        if self.active_session() == Some(session_id) {
            return Vec::new();
        }

        let mut commands = Vec::new();
        if let Some(previous) = self.active.take() {
            if previous.state == JoinState::Joined && self.connected {
                commands.push(ClientCommand::leave(previous.session_id));
            }
        }

        let state = if self.connected {
            commands.push(ClientCommand::join(session_id));
            JoinState::Joined
        } else {
            JoinState::Joining
        };
        self.active = Some(ActiveTopic { session_id, state });
        commands
    }

    /// Drop `session_id` if it is the active topic.
    ///
    /// Safe when already left, when disconnected, and when the join never
    /// reached the wire: those cases produce no commands.
    pub fn leave(&mut self, session_id: DbId) -> Vec<ClientCommand> {
        match self.active {
            Some(topic) if topic.session_id == session_id => {
                self.active = None;
                if topic.state == JoinState::Joined && self.connected {
                    vec![ClientCommand::leave(session_id)]
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        }
    }

    /// The transport came up. Re-issues the join for the active topic.
    ///
    /// A repeated notification for the same connection is ignored so the
    /// join is not sent twice.
    pub fn on_connected(&mut self) -> Vec<ClientCommand> {
        if self.connected {
            return Vec::new();
        }
        self.connected = true;
        match self.active.as_mut() {
            Some(topic) => {
                topic.state = JoinState::Joined;
                vec![ClientCommand::join(topic.session_id)]
            }
            None => Vec::new(),
        }
    }

    /// The transport went down. The server forgets our topics with the
    /// socket, so a joined topic goes back to pending.
    pub fn on_disconnected(&mut self) {
        self.connected = false;
        if let Some(topic) = self.active.as_mut() {
            topic.state = JoinState::Joining;
        }
    }

    /// Whether a topic-scoped event for `session_id` should be processed.
    pub fn accepts(&self, session_id: DbId) -> bool {
        self.state_of(session_id) == JoinState::Joined
    }
}
