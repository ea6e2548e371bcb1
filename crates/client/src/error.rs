use mentorlink_core::error::CoreError;
use mentorlink_core::types::DbId;
use serde::Deserialize;

/// Error type for every client-side operation.
///
/// Wraps [`CoreError`] for domain failures (including those decoded from
/// API error bodies) and adds transport-specific variants.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A domain-level error, raised locally or mapped from an API response.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The HTTP request itself failed (network, DNS, TLS, decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The platform returned a non-2xx status with no domain mapping.
    #[error("Platform API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The same write is already awaiting a response.
    #[error("{action} already in progress for session {session_id}")]
    InFlight {
        session_id: DbId,
        action: &'static str,
    },
}

/// Convenience alias for client return values.
pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// The domain error, if this is one.
    pub fn core(&self) -> Option<&CoreError> {
        match self {
            Self::Core(e) => Some(e),
            _ => None,
        }
    }

    /// Whether repeating the call could succeed without user action.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Core(e) => e.is_retriable(),
            Self::Request(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::InFlight { .. } => false,
        }
    }
}

/// The entity a request was about. Used to build `NotFound`/`Overdue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub entity: &'static str,
    pub id: DbId,
}

impl Target {
    pub fn session(id: DbId) -> Self {
        Self {
            entity: "session",
            id,
        }
    }

    pub fn assignment(id: DbId) -> Self {
        Self {
            entity: "assignment",
            id,
        }
    }

    pub fn schedule_item(id: DbId) -> Self {
        Self {
            entity: "schedule_item",
            id,
        }
    }
}

/// Body shape of platform error responses: `{"error": "...", "code": "..."}`.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// Map a non-2xx response onto the domain taxonomy.
///
/// - 404 -> `NotFound`
/// - 403 -> `Forbidden`
/// - 409 -> `InvalidTransition`
/// - 400 / 422 -> `Validation`
/// - 410 -> `Overdue` (assignment targets only)
/// - anything else -> [`ClientError::Api`]
pub fn classify_response(status: u16, body: &str, target: Target) -> ClientError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .error
        .or(parsed.code)
        .unwrap_or_else(|| body.trim().to_string());

    let core = match status {
        404 => CoreError::NotFound {
            entity: target.entity,
            id: target.id,
        },
        403 => CoreError::Forbidden(message),
        409 => CoreError::InvalidTransition(message),
        400 | 422 => CoreError::Validation(message),
        410 if target.entity == "assignment" => CoreError::Overdue {
            assignment_id: target.id,
        },
        _ => return ClientError::Api { status, message },
    };
    ClientError::Core(core)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn not_found_uses_target() {
        let err = classify_response(404, "", Target::session(9));
        assert_matches!(
            err,
            ClientError::Core(CoreError::NotFound {
                entity: "session",
                id: 9
            })
        );
    }

    #[test]
    fn error_body_message_is_preserved() {
        let body = r#"{"error":"Session is already paid","code":"CONFLICT"}"#;
        let err = classify_response(409, body, Target::session(1));
        assert_matches!(
            err,
            ClientError::Core(CoreError::InvalidTransition(ref m)) if m == "Session is already paid"
        );
        assert!(!err.is_retriable());
    }

    #[test]
    fn validation_statuses() {
        for status in [400, 422] {
            let err = classify_response(status, r#"{"error":"bad file"}"#, Target::session(1));
            assert_matches!(err, ClientError::Core(CoreError::Validation(_)));
        }
    }

    #[test]
    fn gone_maps_to_overdue_for_assignments_only() {
        assert_matches!(
            classify_response(410, "", Target::assignment(4)),
            ClientError::Core(CoreError::Overdue { assignment_id: 4 })
        );
        assert_matches!(
            classify_response(410, "", Target::session(4)),
            ClientError::Api { status: 410, .. }
        );
    }

    #[test]
    fn server_errors_are_retriable() {
        let err = classify_response(503, "upstream down", Target::session(1));
        assert_matches!(err, ClientError::Api { status: 503, ref message } if message == "upstream down");
        assert!(err.is_retriable());
    }

    #[test]
    fn in_flight_is_not_retriable() {
        let err = ClientError::InFlight {
            session_id: 1,
            action: "pay for",
        };
        assert!(!err.is_retriable());
        assert_eq!(err.to_string(), "pay for already in progress for session 1");
    }
}
