//! Assignment submission and review model.
//!
//! A submission is created once and never replaced. Its timeliness and
//! review fields come from the server; the local clock is only used for
//! the fast-fail deadline check and the "time remaining" label.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Timeliness {
    OnTime,
    Late,
}

/// Mentor-side review state. Read-only from the student side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    Pending,
    Verified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub file_url: String,
    pub submitted_at: Timestamp,
    pub timeliness: Timeliness,
    pub review_status: ReviewStatus,
    #[serde(default)]
    pub mentor_feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: DbId,
    pub session_id: DbId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_at: Timestamp,
    #[serde(default)]
    pub submission: Option<Submission>,
}

/// Derived state of an assignment at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentState {
    Open,
    Submitted,
    /// Past due with no submission. Terminal.
    Overdue,
}

impl Assignment {
    pub fn state_at(&self, now: Timestamp) -> AssignmentState {
        if self.submission.is_some() {
            AssignmentState::Submitted
        } else if now > self.due_at {
            AssignmentState::Overdue
        } else {
            AssignmentState::Open
        }
    }

    /// Fast-fail check run before any upload is attempted.
    pub fn ensure_submittable(&self, now: Timestamp) -> Result<(), CoreError> {
        match self.state_at(now) {
            AssignmentState::Open => Ok(()),
            AssignmentState::Submitted => Err(CoreError::InvalidTransition(format!(
                "Assignment {} already has a submission",
                self.id
            ))),
            AssignmentState::Overdue => Err(CoreError::Overdue {
                assignment_id: self.id,
            }),
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(
            self.submission,
            Some(Submission {
                review_status: ReviewStatus::Verified,
                ..
            })
        )
    }
}

/// Label shown next to a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRemaining {
    Remaining(chrono::Duration),
    Overdue,
}

impl TimeRemaining {
    pub fn until(due_at: Timestamp, now: Timestamp) -> Self {
        if due_at <= now {
            Self::Overdue
        } else {
            Self::Remaining(due_at - now)
        }
    }
}

impl fmt::Display for TimeRemaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let left = match self {
            Self::Overdue => return f.write_str("Overdue"),
            Self::Remaining(left) => *left,
        };
        let days = left.num_days();
        let hours = left.num_hours() % 24;
        let minutes = left.num_minutes() % 60;
        if days > 0 {
            write!(f, "{days}d {hours}h left")
        } else if hours > 0 {
            write!(f, "{hours}h {minutes}m left")
        } else if minutes > 0 {
            write!(f, "{minutes}m left")
        } else {
            f.write_str("less than a minute left")
        }
    }
}
