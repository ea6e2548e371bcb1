//! Channel-event routing.
//!
//! [`run`] consumes the channel's broadcast of [`ServerEvent`]s and applies
//! each one to the owning store. It also mirrors transport up/down
//! transitions onto the client event bus.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use mentorlink_channel::{JoinState, ServerEvent};
use mentorlink_core::session::SessionPatch;
use mentorlink_core::types::DbId;
use mentorlink_events::ClientEvent;

use crate::context::ClientContext;

/// Run the routing loop until the channel's event sender is dropped.
pub async fn run(
    ctx: Arc<ClientContext>,
    mut events: broadcast::Receiver<ServerEvent>,
    mut connection: watch::Receiver<bool>,
) {
    let mut watching_connection = true;
    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    // A topic left after this event was queued is not processed.
                    if event.is_topic_scoped()
                        && ctx.channel.join_state(event.session_id()) != JoinState::Joined
                    {
                        tracing::debug!(
                            session_id = event.session_id(),
                            event = event.name(),
                            "Skipping event for session no longer joined",
                        );
                        continue;
                    }
                    apply_event(&ctx, event).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event router lagged");
                    if let Some(session_id) = ctx.channel.active_session() {
                        catch_up(&ctx, session_id).await;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Channel closed, event router shutting down");
                    break;
                }
            },
            changed = connection.changed(), if watching_connection => {
                if changed.is_err() {
                    watching_connection = false;
                    continue;
                }
                let connected = *connection.borrow_and_update();
                ctx.bus.publish(if connected {
                    ClientEvent::ChannelConnected
                } else {
                    ClientEvent::ChannelDisconnected
                });
            }
        }
    }
}

/// Apply one server event to the store that owns its data.
pub async fn apply_event(ctx: &ClientContext, event: ServerEvent) {
    let session_id = event.session_id();
    tracing::debug!(session_id, event = event.name(), "Applying channel event");

    match event {
        ServerEvent::NewMessage(message) => {
            ctx.messages.on_pushed(message).await;
        }
        ServerEvent::SessionUpdated(_) | ServerEvent::MentorshipStatusUpdated(_) => {
            if let Some(patch) = event.session_patch() {
                apply_session_patch(ctx, session_id, &patch).await;
            }
        }
        ServerEvent::AssignmentCreated(data) => {
            ctx.assignments.on_created(data.assignment).await;
        }
        ServerEvent::ScheduleUpdated(data) => {
            ctx.schedules
                .on_external_update(data.session_id, data.schedule)
                .await;
        }
    }
}

async fn apply_session_patch(ctx: &ClientContext, session_id: DbId, patch: &SessionPatch) {
    let Some(outcome) = ctx.sessions.apply_patch(session_id, patch).await else {
        tracing::debug!(session_id, "Patch for uncached session ignored");
        return;
    };
    // The schedule is not a trustworthy delta across a reactivation either.
    if outcome.needs_refetch() {
        if let Err(e) = ctx.schedules.refresh(session_id).await {
            tracing::error!(session_id, error = %e, "Schedule re-fetch after reactivation failed");
        }
    }
}

/// Re-fetch everything a view shows and merge it into the caches.
///
/// Run after a reconnect, since pushes sent while offline are lost.
pub async fn catch_up(ctx: &ClientContext, session_id: DbId) {
    tracing::info!(session_id, "Catching up after reconnect");

    if let Err(e) = ctx.sessions.refresh(session_id).await {
        tracing::error!(session_id, error = %e, "Session catch-up failed");
    }
    if let Err(e) = ctx.schedules.refresh(session_id).await {
        tracing::error!(session_id, error = %e, "Schedule catch-up failed");
    }
    match ctx.messages.load(session_id).await {
        Ok(new) => tracing::info!(session_id, new, "Message catch-up merged"),
        Err(e) => tracing::error!(session_id, error = %e, "Message catch-up failed"),
    }
    if let Err(e) = ctx.assignments.list(session_id).await {
        tracing::error!(session_id, error = %e, "Assignment catch-up failed");
    }
}
