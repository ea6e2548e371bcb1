//! Cached per-session schedules.
//!
//! The server is authoritative for ordering and unlock transitions, so a
//! pushed schedule replaces the cached list wholesale.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use mentorlink_core::error::CoreError;
use mentorlink_core::schedule::{
    self, ensure_resources_visible, sort_schedule, validate_schedule, RetryHint, ScheduleItem,
    ScheduleProgress, ScheduleResource,
};
use mentorlink_core::types::{DbId, Timestamp};
use mentorlink_events::{ClientEvent, EventBus};

use crate::api::PlatformApi;
use crate::error::ClientResult;

pub struct ScheduleTracker {
    api: Arc<dyn PlatformApi>,
    bus: Arc<EventBus>,
    schedules: RwLock<HashMap<DbId, Vec<ScheduleItem>>>,
}

impl ScheduleTracker {
    pub fn new(api: Arc<dyn PlatformApi>, bus: Arc<EventBus>) -> Self {
        Self {
            api,
            bus,
            schedules: RwLock::new(HashMap::new()),
        }
    }

    /// Ordered schedule, fetching it on first access.
    pub async fn get_schedule(&self, session_id: DbId) -> ClientResult<Vec<ScheduleItem>> {
        if let Some(items) = self.schedules.read().await.get(&session_id) {
            return Ok(items.clone());
        }
        self.refresh(session_id).await
    }

    pub async fn refresh(&self, session_id: DbId) -> ClientResult<Vec<ScheduleItem>> {
        let items = self.api.get_schedule(session_id).await?;
        Ok(self.on_external_update(session_id, items).await)
    }

    /// Replace the cached schedule with a server-provided list.
    ///
    /// The list is sorted by ordering key and stored even when it breaks
    /// the slot invariants; a violation is only logged.
    pub async fn on_external_update(
        &self,
        session_id: DbId,
        mut items: Vec<ScheduleItem>,
    ) -> Vec<ScheduleItem> {
        sort_schedule(&mut items);
        if let Err(e) = validate_schedule(&items) {
            tracing::warn!(session_id, error = %e, "Server schedule violates slot invariants");
        }

        let progress = ScheduleProgress::of(&items);
        tracing::debug!(
            session_id,
            completed = progress.completed,
            total = progress.total,
            "Schedule replaced",
        );

        self.schedules
            .write()
            .await
            .insert(session_id, items.clone());
        self.bus.publish(ClientEvent::ScheduleReplaced {
            session_id,
            completed: progress.completed,
            total: progress.total,
        });
        items
    }

    /// Completed / total for display. Zero for an unknown or empty schedule.
    pub async fn progress(&self, session_id: DbId) -> ScheduleProgress {
        match self.schedules.read().await.get(&session_id) {
            Some(items) => ScheduleProgress::of(items),
            None => ScheduleProgress::of(&[]),
        }
    }

    /// The slot currently open, if any.
    pub async fn current_item(&self, session_id: DbId) -> Option<ScheduleItem> {
        let schedules = self.schedules.read().await;
        schedule::current_item(schedules.get(&session_id)?).cloned()
    }

    /// Fetch resources for a slot.
    ///
    /// Decided from the cached status alone: a `LOCKED` slot, or one the
    /// cache does not know, is rejected without a network call.
    pub async fn resources(
        &self,
        session_id: DbId,
        item_id: DbId,
    ) -> ClientResult<Vec<ScheduleResource>> {
        let item = self
            .cached_item(session_id, item_id)
            .await
            .ok_or(CoreError::NotFound {
                entity: "schedule_item",
                id: item_id,
            })?;
        ensure_resources_visible(&item)?;
        self.api.get_resources(session_id, item_id).await
    }

    /// Advisory retry hint for a slot. Never enforced client-side.
    pub async fn retry_hint(
        &self,
        session_id: DbId,
        item_id: DbId,
        now: Timestamp,
    ) -> Option<RetryHint> {
        let item = self.cached_item(session_id, item_id).await?;
        Some(RetryHint::hint_at(&item, now))
    }

    async fn cached_item(&self, session_id: DbId, item_id: DbId) -> Option<ScheduleItem> {
        self.schedules
            .read()
            .await
            .get(&session_id)?
            .iter()
            .find(|item| item.id == item_id)
            .cloned()
    }

    /// Drop every cached schedule except `session_id`'s.
    pub async fn retain_only(&self, session_id: DbId) {
        self.schedules
            .write()
            .await
            .retain(|id, _| *id == session_id);
    }
}
