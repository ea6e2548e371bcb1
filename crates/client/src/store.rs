//! Cached mentorship sessions.
//!
//! [`SessionStore`] holds the client's read-mostly copy of each session.
//! It is patched by channel events and replaced by the response bodies of
//! lifecycle writes. It never guesses a next status locally.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use mentorlink_core::roles::{ensure_may_delete, ensure_role_may};
use mentorlink_core::session::{
    classify_pushed_status, state_machine, MentorshipSession, PatchOutcome, SessionAction, SessionBuckets, SessionPatch,
    StatusChange,
};
use mentorlink_core::types::{Actor, DbId};
use mentorlink_events::{ClientEvent, EventBus};

use crate::api::PlatformApi;
use crate::error::{ClientError, ClientResult};
use crate::in_flight::{InFlightGuard, InFlightSet};

/// Key for the duplicate-submission guard.
type WriteKey = (DbId, &'static str);

pub struct SessionStore {
    api: Arc<dyn PlatformApi>,
    bus: Arc<EventBus>,
    actor: Actor,
    sessions: RwLock<HashMap<DbId, MentorshipSession>>,
    in_flight: InFlightSet<WriteKey>,
}

impl SessionStore {
    pub fn new(api: Arc<dyn PlatformApi>, bus: Arc<EventBus>, actor: Actor) -> Self {
        Self {
            api,
            bus,
            actor,
            sessions: RwLock::new(HashMap::new()),
            in_flight: InFlightSet::new(),
        }
    }

    pub fn actor(&self) -> Actor {
        self.actor
    }

    /// Cached session, without a network call.
    pub async fn cached(&self, session_id: DbId) -> Option<MentorshipSession> {
        self.sessions.read().await.get(&session_id).cloned()
    }

    /// Cached session, fetching it on first access.
    pub async fn get_session(&self, session_id: DbId) -> ClientResult<MentorshipSession> {
        if let Some(session) = self.cached(session_id).await {
            return Ok(session);
        }
        self.fetch(session_id).await
    }

    /// Re-fetch the session and replace the cached copy wholesale.
    pub async fn refresh(&self, session_id: DbId) -> ClientResult<MentorshipSession> {
        let session = self.fetch(session_id).await?;
        self.bus.publish(ClientEvent::SessionRefetched { session_id });
        Ok(session)
    }

    async fn fetch(&self, session_id: DbId) -> ClientResult<MentorshipSession> {
        let session = self.api.get_session(session_id).await?;
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(session)
    }

    /// Merge a server-pushed patch into the cached session.
    ///
    /// Returns `None` when the session is not cached (nothing to patch).
    /// A `COMPLETED -> SCHEDULED` reactivation re-fetches the session
    /// instead of trusting the partial patch.
    pub async fn apply_patch(
        &self,
        session_id: DbId,
        patch: &SessionPatch,
    ) -> Option<PatchOutcome> {
        let (outcome, status) = {
            let mut sessions = self.sessions.write().await;
            let session = sessions.get_mut(&session_id)?;
            let outcome = session.apply_patch(patch);
            (outcome, session.status)
        };

        match outcome.status {
            StatusChange::Rejected { from, to } => {
                tracing::warn!(
                    session_id,
                    from = %from,
                    to = %to,
                    "Ignoring regressive session patch",
                );
            }
            StatusChange::Advanced { from, to } => {
                tracing::info!(session_id, from = %from, to = %to, "Session status advanced");
            }
            StatusChange::Reactivated => {
                tracing::info!(session_id, "Session reactivated, re-fetching");
            }
            StatusChange::Unchanged => {}
        }

        if outcome.changed() {
            self.bus
                .publish(ClientEvent::SessionChanged { session_id, status });
        }

        if outcome.needs_refetch() {
            if let Err(e) = self.refresh(session_id).await {
                tracing::error!(session_id, error = %e, "Re-fetch after reactivation failed");
            }
        }

        Some(outcome)
    }

    /// Request a lifecycle action.
    ///
    /// Role, participation and transition are checked locally before any
    /// network call. A second call for the same action while the first is
    /// awaiting its response fails with [`ClientError::InFlight`]. On
    /// success the cached session is replaced by the response body; on
    /// failure it is left untouched.
    pub async fn perform(
        &self,
        session_id: DbId,
        action: SessionAction,
    ) -> ClientResult<MentorshipSession> {
        ensure_role_may(self.actor.role, action)?;
        let current = self.get_session(session_id).await?;
        current.ensure_participant(self.actor.user_id)?;
        state_machine::validate_action(current.status, action)?;

        let _guard = self.claim((session_id, action.verb()))?;

        tracing::info!(session_id, action = action.verb(), "Submitting session action");
        let updated = match self.api.session_action(session_id, action).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(
                    session_id,
                    action = action.verb(),
                    error = %e,
                    "Session action failed",
                );
                return Err(e);
            }
        };

        // A push may have moved the session on while the write was in
        // flight. The response must not walk the cache back.
        let mut sessions = self.sessions.write().await;
        if let Some(cached) = sessions.get(&session_id) {
            if let StatusChange::Rejected { from, to } =
                classify_pushed_status(cached.status, updated.status)
            {
                tracing::warn!(
                    session_id,
                    action = action.verb(),
                    from = %from,
                    to = %to,
                    "Ignoring stale action response",
                );
                return Ok(cached.clone());
            }
        }
        sessions.insert(session_id, updated.clone());
        drop(sessions);

        self.bus.publish(ClientEvent::SessionChanged {
            session_id,
            status: updated.status,
        });
        Ok(updated)
    }

    fn claim(&self, key: WriteKey) -> ClientResult<InFlightGuard<WriteKey>> {
        self.in_flight
            .try_acquire(key)
            .ok_or(ClientError::InFlight {
                session_id: key.0,
                action: key.1,
            })
    }

    pub async fn approve(&self, session_id: DbId) -> ClientResult<MentorshipSession> {
        self.perform(session_id, SessionAction::Approve).await
    }

    /// Mock payment. Payment processing itself is external.
    pub async fn mock_payment(&self, session_id: DbId) -> ClientResult<MentorshipSession> {
        self.perform(session_id, SessionAction::Pay).await
    }

    pub async fn cancel(&self, session_id: DbId) -> ClientResult<MentorshipSession> {
        self.perform(session_id, SessionAction::Cancel).await
    }

    /// Delete a session request. Students only, while PENDING or CANCELLED.
    pub async fn delete(&self, session_id: DbId) -> ClientResult<()> {
        let current = self.get_session(session_id).await?;
        current.ensure_participant(self.actor.user_id)?;
        ensure_may_delete(self.actor.role, current.status)?;

        let _guard = self.claim((session_id, "delete"))?;

        if let Err(e) = self.api.delete_session(session_id).await {
            tracing::error!(session_id, error = %e, "Session delete failed");
            return Err(e);
        }
        self.sessions.write().await.remove(&session_id);
        tracing::info!(session_id, "Session deleted");
        Ok(())
    }

    /// Fetch the actor's sessions and cache every one of them.
    pub async fn list_sessions(&self) -> ClientResult<Vec<MentorshipSession>> {
        let list = self.api.list_sessions().await?;
        let mut sessions = self.sessions.write().await;
        for session in &list {
            sessions.insert(session.id, session.clone());
        }
        Ok(list)
    }

    /// Cached sessions grouped for the list view.
    pub async fn buckets(&self) -> SessionBuckets {
        let sessions: Vec<MentorshipSession> =
            self.sessions.read().await.values().cloned().collect();
        SessionBuckets::group(&sessions, self.actor.role)
    }
}
