use crate::types::DbId;

/// Domain error taxonomy shared by every layer of the client.
///
/// `NotFound`, `Forbidden`, `InvalidTransition`, `Overdue` and `Locked`
/// are user-visible and never retried. `TransportUnavailable` is recovered
/// locally on the next reconnect. `Validation` is raised before any
/// network call is made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Assignment {assignment_id} is overdue")]
    Overdue { assignment_id: DbId },

    #[error("Schedule item {item_id} is locked")]
    Locked { item_id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Channel transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether repeating the same call could succeed without user action.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::TransportUnavailable(_) | Self::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_visible_errors_are_not_retriable() {
        assert!(!CoreError::NotFound { entity: "session", id: 1 }.is_retriable());
        assert!(!CoreError::Forbidden("nope".into()).is_retriable());
        assert!(!CoreError::InvalidTransition("PAID -> PAID".into()).is_retriable());
        assert!(!CoreError::Overdue { assignment_id: 3 }.is_retriable());
        assert!(!CoreError::Locked { item_id: 4 }.is_retriable());
        assert!(!CoreError::Validation("empty".into()).is_retriable());
    }

    #[test]
    fn transport_errors_are_retriable() {
        assert!(CoreError::TransportUnavailable("down".into()).is_retriable());
    }

    #[test]
    fn not_found_message_names_entity() {
        let err = CoreError::NotFound { entity: "assignment", id: 9 };
        assert_eq!(err.to_string(), "Entity not found: assignment with id 9");
    }
}
