//! Mentorship session lifecycle: status enum, state machine, and the
//! rules for merging server-pushed patches into a cached session.
//!
//! The lifecycle moves forward along
//! `PENDING -> APPROVED -> PAID -> SCHEDULED -> COMPLETED`, may jump to
//! `CANCELLED` from `PENDING` or `APPROVED`, and may be re-activated from
//! `COMPLETED` back to `SCHEDULED` when the mentor opens a new slot.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::roles::ActorRole;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Status and actions
// ---------------------------------------------------------------------------

/// Lifecycle status of a mentorship session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Pending,
    Approved,
    Paid,
    Scheduled,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Paid => "PAID",
            Self::Scheduled => "SCHEDULED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Position along the forward chain. `CANCELLED` sits outside it.
    fn rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Approved => Some(1),
            Self::Paid => Some(2),
            Self::Scheduled => Some(3),
            Self::Completed => Some(4),
            Self::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A write the client can request against a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionAction {
    Approve,
    Pay,
    Schedule,
    Complete,
    Reopen,
    Cancel,
}

impl SessionAction {
    /// Statuses from which this action is permitted.
    pub fn allowed_from(&self) -> &'static [SessionStatus] {
        use SessionStatus::*;
        match self {
            Self::Approve => &[Pending],
            Self::Pay => &[Approved],
            Self::Schedule => &[Paid],
            Self::Complete => &[Scheduled],
            Self::Reopen => &[Completed],
            Self::Cancel => &[Pending, Approved],
        }
    }

    /// Status the session ends up in once the server accepts the action.
    pub fn target(&self) -> SessionStatus {
        match self {
            Self::Approve => SessionStatus::Approved,
            Self::Pay => SessionStatus::Paid,
            Self::Schedule | Self::Reopen => SessionStatus::Scheduled,
            Self::Complete => SessionStatus::Completed,
            Self::Cancel => SessionStatus::Cancelled,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Pay => "pay for",
            Self::Schedule => "schedule",
            Self::Complete => "complete",
            Self::Reopen => "reopen",
            Self::Cancel => "cancel",
        }
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

pub mod state_machine {
    use super::{SessionAction, SessionStatus};
    use crate::error::CoreError;

    /// Returns the set of statuses reachable in one step from `from`.
    ///
    /// `CANCELLED` is terminal and returns an empty slice.
    pub fn valid_transitions(from: SessionStatus) -> &'static [SessionStatus] {
        use SessionStatus::*;
        match from {
            Pending => &[Approved, Cancelled],
            Approved => &[Paid, Cancelled],
            Paid => &[Scheduled],
            Scheduled => &[Completed],
            // Re-activation when a new slot starts.
            Completed => &[Scheduled],
            Cancelled => &[],
        }
    }

    /// Check whether a single-step transition from `from` to `to` is valid.
    pub fn can_transition(from: SessionStatus, to: SessionStatus) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// Validate a single-step transition.
    pub fn validate_transition(from: SessionStatus, to: SessionStatus) -> Result<(), CoreError> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition(format!("{from} -> {to}")))
        }
    }

    /// Validate that `action` may be requested while the session is in
    /// `current`, returning the status the server is expected to report.
    ///
    /// The client never applies the returned status itself; it only uses
    /// it to fast-fail requests that cannot succeed.
    pub fn validate_action(
        current: SessionStatus,
        action: SessionAction,
    ) -> Result<SessionStatus, CoreError> {
        if action.allowed_from().contains(&current) {
            Ok(action.target())
        } else {
            Err(CoreError::InvalidTransition(format!(
                "Cannot {} a session in status {current}",
                action.verb()
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Cached copy of a server-owned mentorship session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentorshipSession {
    pub id: DbId,
    pub mentor_id: DbId,
    pub student_id: DbId,
    pub skill_id: DbId,
    #[serde(default)]
    pub plan_id: Option<DbId>,
    pub status: SessionStatus,
    #[serde(default)]
    pub scheduled_at: Option<Timestamp>,
    /// Only meaningful while `status` is `SCHEDULED`.
    #[serde(default)]
    pub ephemeral_meeting_link: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Partial update pushed over the channel.
///
/// `ephemeral_meeting_link` distinguishes "not present" (`None`) from
/// "cleared" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub status: Option<SessionStatus>,
    pub ephemeral_meeting_link: Option<Option<String>>,
}

/// How a pushed status relates to the cached one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Unchanged,
    Advanced {
        from: SessionStatus,
        to: SessionStatus,
    },
    /// `COMPLETED -> SCHEDULED`. Cached deltas are not trustworthy across
    /// this boundary; the owner must re-fetch the whole session.
    Reactivated,
    /// A regression or a move out of a terminal state. Ignored.
    Rejected {
        from: SessionStatus,
        to: SessionStatus,
    },
}

/// Classify a server-pushed status against the cached status.
///
/// Forward moves may skip intermediate states (events missed while
/// offline), since each skipped step is itself a legal transition.
pub fn classify_pushed_status(current: SessionStatus, incoming: SessionStatus) -> StatusChange {
    use SessionStatus::*;

    if current == incoming {
        return StatusChange::Unchanged;
    }
    if current == Completed && incoming == Scheduled {
        return StatusChange::Reactivated;
    }
    if incoming == Cancelled && matches!(current, Pending | Approved) {
        return StatusChange::Advanced {
            from: current,
            to: incoming,
        };
    }
    match (current.rank(), incoming.rank()) {
        (Some(a), Some(b)) if b > a => StatusChange::Advanced {
            from: current,
            to: incoming,
        },
        _ => StatusChange::Rejected {
            from: current,
            to: incoming,
        },
    }
}

/// Result of merging a [`SessionPatch`] into a cached session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchOutcome {
    pub status: StatusChange,
    pub link_changed: bool,
}

impl PatchOutcome {
    pub fn needs_refetch(&self) -> bool {
        matches!(self.status, StatusChange::Reactivated)
    }

    pub fn changed(&self) -> bool {
        self.link_changed
            || matches!(
                self.status,
                StatusChange::Advanced { .. } | StatusChange::Reactivated
            )
    }
}

impl MentorshipSession {
    /// Merge a pushed patch. Idempotent: applying the same patch twice
    /// leaves the session as the first application did.
    ///
    /// A patch whose status is rejected is stale and is dropped whole,
    /// including its link.
    pub fn apply_patch(&mut self, patch: &SessionPatch) -> PatchOutcome {
        let status = match patch.status {
            Some(incoming) => classify_pushed_status(self.status, incoming),
            None => StatusChange::Unchanged,
        };

        if matches!(status, StatusChange::Rejected { .. }) {
            return PatchOutcome {
                status,
                link_changed: false,
            };
        }

        if let Some(incoming) = patch.status {
            self.status = incoming;
        }

        let mut link_changed = false;
        if let Some(link) = &patch.ephemeral_meeting_link {
            if self.ephemeral_meeting_link != *link {
                self.ephemeral_meeting_link = link.clone();
                link_changed = true;
            }
        }

        PatchOutcome {
            status,
            link_changed,
        }
    }

    /// Whether a meeting link recorded earlier is still joinable.
    pub fn is_link_live(&self, link: &str) -> bool {
        self.status == SessionStatus::Scheduled
            && self.ephemeral_meeting_link.as_deref() == Some(link)
    }

    pub fn participant_role(&self, user_id: DbId) -> Option<ActorRole> {
        if user_id == self.student_id {
            Some(ActorRole::Student)
        } else if user_id == self.mentor_id {
            Some(ActorRole::Mentor)
        } else {
            None
        }
    }

    /// Reject actors who are not a party to this session.
    pub fn ensure_participant(&self, user_id: DbId) -> Result<ActorRole, CoreError> {
        self.participant_role(user_id).ok_or_else(|| {
            CoreError::Forbidden(format!(
                "User {user_id} is not a participant of session {}",
                self.id
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// Session list grouping
// ---------------------------------------------------------------------------

/// Sessions grouped for the session-list view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionBuckets {
    /// Sessions waiting on the viewing actor (mentor approval, student payment).
    pub awaiting_action: Vec<MentorshipSession>,
    /// Sessions in progress or waiting on the other party.
    pub active: Vec<MentorshipSession>,
    /// Completed and cancelled sessions.
    pub history: Vec<MentorshipSession>,
}

impl SessionBuckets {
    /// Group sessions for `role`, newest first within each bucket.
    pub fn group(sessions: &[MentorshipSession], role: ActorRole) -> Self {
        let mut buckets = Self::default();
        for session in sessions {
            let awaiting = matches!(
                (role, session.status),
                (ActorRole::Mentor, SessionStatus::Pending)
                    | (ActorRole::Student, SessionStatus::Approved)
            );
            let bucket = if awaiting {
                &mut buckets.awaiting_action
            } else if matches!(
                session.status,
                SessionStatus::Completed | SessionStatus::Cancelled
            ) {
                &mut buckets.history
            } else {
                &mut buckets.active
            };
            bucket.push(session.clone());
        }
        for bucket in [
            &mut buckets.awaiting_action,
            &mut buckets.active,
            &mut buckets.history,
        ] {
            bucket.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        }
        buckets
    }
}
