//! Process-wide client state.
//!
//! One [`ClientContext`] per client instance owns the shared channel, the
//! event bus, the stores and the draft store. Session views borrow it
//! through an `Arc`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;

use mentorlink_channel::ChannelClient;
use mentorlink_core::draft::{DraftKey, DraftStore};
use mentorlink_core::types::{Actor, DbId, Timestamp};
use mentorlink_events::EventBus;

use crate::api::PlatformApi;
use crate::assignments::AssignmentPipeline;
use crate::reconciler::MessageReconciler;
use crate::router;
use crate::schedule::ScheduleTracker;
use crate::store::SessionStore;

pub struct ClientContext {
    pub actor: Actor,
    pub bus: Arc<EventBus>,
    pub channel: Arc<ChannelClient>,
    pub sessions: SessionStore,
    pub schedules: ScheduleTracker,
    pub assignments: AssignmentPipeline,
    pub messages: MessageReconciler,
    drafts: Mutex<DraftStore>,
    router: Mutex<Option<JoinHandle<()>>>,
}

impl ClientContext {
    pub fn new(
        actor: Actor,
        api: Arc<dyn PlatformApi>,
        channel: Arc<ChannelClient>,
        draft_ttl: chrono::Duration,
    ) -> Arc<Self> {
        let bus = Arc::new(EventBus::default());
        Arc::new(Self {
            actor,
            sessions: SessionStore::new(Arc::clone(&api), Arc::clone(&bus), actor),
            schedules: ScheduleTracker::new(Arc::clone(&api), Arc::clone(&bus)),
            assignments: AssignmentPipeline::new(Arc::clone(&api), Arc::clone(&bus)),
            messages: MessageReconciler::new(api, Arc::clone(&bus)),
            bus,
            channel,
            drafts: Mutex::new(DraftStore::new(draft_ttl)),
            router: Mutex::new(None),
        })
    }

    /// Start the event router, then the channel connection task.
    ///
    /// Subscribes before connecting so no pushed event is missed. Calling
    /// it again is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut router = self.router.lock().unwrap_or_else(PoisonError::into_inner);
        if router.is_some() {
            return;
        }
        let events = self.channel.subscribe();
        let connection = self.channel.watch_connection();
        *router = Some(tokio::spawn(router::run(
            Arc::clone(self),
            events,
            connection,
        )));
        drop(router);

        self.channel.start();
        tracing::info!(user_id = self.actor.user_id, role = self.actor.role.as_str(), "Client started");
    }

    /// Stop routing events and shut the channel down.
    pub async fn shutdown(&self) {
        let router = self
            .router
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = router {
            handle.abort();
        }
        self.channel.shutdown().await;
    }

    /// Drop the per-session caches of every session except `keep`.
    ///
    /// Only the joined topic receives pushes, so cached data for any other
    /// session would go stale. Session records stay since status updates
    /// are not topic-scoped.
    pub async fn evict_other_sessions(&self, keep: DbId) {
        tokio::join!(
            self.schedules.retain_only(keep),
            self.messages.retain_only(keep),
            self.assignments.retain_only(keep),
        );
    }

    pub fn save_draft(&self, key: DraftKey, text: &str, now: Timestamp) {
        let mut drafts = self.drafts();
        drafts.purge_expired(now);
        drafts.save(key, text, now);
    }

    /// Remove and return an unexpired draft.
    pub fn take_draft(&self, key: &DraftKey, now: Timestamp) -> Option<String> {
        self.drafts().take(key, now)
    }

    fn drafts(&self) -> MutexGuard<'_, DraftStore> {
        self.drafts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
