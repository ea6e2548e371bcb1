//! Per-session schedule slots and their unlock states.
//!
//! The server owns every unlock transition. The client only orders the
//! list, derives progress, checks the slot invariants for diagnostics, and
//! gates resource requests on a slot's cached status.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Unlock state of one schedule slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Locked,
    Upcoming,
    Completed,
}

impl ScheduleStatus {
    /// Attachments are visible for the current slot and every finished one.
    pub fn resources_visible(&self) -> bool {
        matches!(self, Self::Upcoming | Self::Completed)
    }
}

/// One week/session slot within a session's plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleItem {
    pub id: DbId,
    pub session_id: DbId,
    pub week_number: i32,
    pub session_number: i32,
    pub topic_title: String,
    #[serde(default)]
    pub scheduled_at: Option<Timestamp>,
    pub status: ScheduleStatus,
    /// Advisory only; the server decides whether a retry is accepted.
    #[serde(default)]
    pub retry_available_after: Option<Timestamp>,
}

impl ScheduleItem {
    pub fn ordering_key(&self) -> (i32, i32) {
        (self.week_number, self.session_number)
    }
}

/// Sort a schedule by `(week_number, session_number)`.
pub fn sort_schedule(items: &mut [ScheduleItem]) {
    items.sort_by_key(ScheduleItem::ordering_key);
}

/// The slot currently open for the student, if any.
pub fn current_item(items: &[ScheduleItem]) -> Option<&ScheduleItem> {
    items
        .iter()
        .find(|item| item.status == ScheduleStatus::Upcoming)
}

/// Reject resource requests for a locked slot without a round trip.
pub fn ensure_resources_visible(item: &ScheduleItem) -> Result<(), CoreError> {
    if item.status.resources_visible() {
        Ok(())
    } else {
        Err(CoreError::Locked { item_id: item.id })
    }
}

/// Check the slot invariants on an ordered list:
///
/// - ordering keys strictly increase,
/// - `COMPLETED` items form a contiguous prefix,
/// - at most one `UPCOMING` item exists and it directly follows the prefix.
pub fn validate_schedule(items: &[ScheduleItem]) -> Result<(), CoreError> {
    for pair in items.windows(2) {
        if pair[0].ordering_key() >= pair[1].ordering_key() {
            return Err(CoreError::Validation(format!(
                "Schedule keys not strictly increasing at item {} (week {}, session {})",
                pair[1].id, pair[1].week_number, pair[1].session_number
            )));
        }
    }

    let prefix = items
        .iter()
        .take_while(|item| item.status == ScheduleStatus::Completed)
        .count();
    let rest = &items[prefix..];

    if let Some(stray) = rest
        .iter()
        .find(|item| item.status == ScheduleStatus::Completed)
    {
        return Err(CoreError::Validation(format!(
            "Completed item {} follows an unfinished slot",
            stray.id
        )));
    }

    let upcoming: Vec<usize> = rest
        .iter()
        .enumerate()
        .filter(|(_, item)| item.status == ScheduleStatus::Upcoming)
        .map(|(idx, _)| idx)
        .collect();
    match upcoming.as_slice() {
        [] | [0] => Ok(()),
        [idx] => Err(CoreError::Validation(format!(
            "Upcoming item {} is not the first unfinished slot",
            rest[*idx].id
        ))),
        _ => Err(CoreError::Validation(format!(
            "{} items are upcoming at once",
            upcoming.len()
        ))),
    }
}

/// Completed slots over all slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScheduleProgress {
    pub completed: usize,
    pub total: usize,
}

impl ScheduleProgress {
    pub fn of(items: &[ScheduleItem]) -> Self {
        Self {
            completed: items
                .iter()
                .filter(|item| item.status == ScheduleStatus::Completed)
                .count(),
            total: items.len(),
        }
    }

    /// Fraction in `0.0..=1.0`; zero for an empty schedule.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    pub fn percent(&self) -> u8 {
        (self.ratio() * 100.0).round() as u8
    }
}

/// Attachment published for a schedule slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResource {
    pub id: DbId,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Client-side hint for a slot with a server-provided retry date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryHint {
    NotApplicable,
    WaitUntil(Timestamp),
    /// The local clock says the date has passed. The server still decides.
    LikelyAvailable,
}

impl RetryHint {
    pub fn hint_at(item: &ScheduleItem, now: Timestamp) -> Self {
        match item.retry_available_after {
            None => Self::NotApplicable,
            Some(after) if now < after => Self::WaitUntil(after),
            Some(_) => Self::LikelyAvailable,
        }
    }
}
