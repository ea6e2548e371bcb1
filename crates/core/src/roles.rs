//! Actor roles and per-action permissions.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::session::{SessionAction, SessionStatus};

/// Which side of the mentorship the acting user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    Student,
    Mentor,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Mentor => "mentor",
        }
    }

    /// Parse a role name as found in configuration (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Self::Student),
            "mentor" => Some(Self::Mentor),
            _ => None,
        }
    }
}

/// The role that owns a lifecycle action.
pub fn required_role(action: SessionAction) -> ActorRole {
    match action {
        SessionAction::Approve
        | SessionAction::Schedule
        | SessionAction::Complete
        | SessionAction::Reopen => ActorRole::Mentor,
        SessionAction::Pay | SessionAction::Cancel => ActorRole::Student,
    }
}

/// Reject an action the given role may not perform.
pub fn ensure_role_may(role: ActorRole, action: SessionAction) -> Result<(), CoreError> {
    let required = required_role(action);
    if role == required {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "Only a {} may {} a session",
            required.as_str(),
            action.verb()
        )))
    }
}

/// Students may delete a session request that never started or was cancelled.
pub fn ensure_may_delete(role: ActorRole, status: SessionStatus) -> Result<(), CoreError> {
    if role != ActorRole::Student {
        return Err(CoreError::Forbidden(
            "Only the requesting student may delete a session".to_string(),
        ));
    }
    match status {
        SessionStatus::Pending | SessionStatus::Cancelled => Ok(()),
        other => Err(CoreError::InvalidTransition(format!(
            "Cannot delete a session in status {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn mentor_actions_reject_students() {
        for action in [
            SessionAction::Approve,
            SessionAction::Schedule,
            SessionAction::Complete,
            SessionAction::Reopen,
        ] {
            assert_matches!(
                ensure_role_may(ActorRole::Student, action),
                Err(CoreError::Forbidden(_))
            );
            assert!(ensure_role_may(ActorRole::Mentor, action).is_ok());
        }
    }

    #[test]
    fn payment_is_student_only() {
        assert!(ensure_role_may(ActorRole::Student, SessionAction::Pay).is_ok());
        assert_matches!(
            ensure_role_may(ActorRole::Mentor, SessionAction::Pay),
            Err(CoreError::Forbidden(msg)) if msg.contains("pay")
        );
    }

    #[test]
    fn delete_only_before_start_or_after_cancel() {
        assert!(ensure_may_delete(ActorRole::Student, SessionStatus::Pending).is_ok());
        assert!(ensure_may_delete(ActorRole::Student, SessionStatus::Cancelled).is_ok());
        assert_matches!(
            ensure_may_delete(ActorRole::Student, SessionStatus::Paid),
            Err(CoreError::InvalidTransition(_))
        );
        assert_matches!(
            ensure_may_delete(ActorRole::Mentor, SessionStatus::Pending),
            Err(CoreError::Forbidden(_))
        );
    }

    #[test]
    fn parse_role_names() {
        assert_eq!(ActorRole::parse("Mentor"), Some(ActorRole::Mentor));
        assert_eq!(ActorRole::parse(" student "), Some(ActorRole::Student));
        assert_eq!(ActorRole::parse("admin"), None);
    }
}
