//! One open session screen.
//!
//! [`SessionView::open`] joins the session topic, loads the session,
//! schedule, messages and assignments, restores an unsent draft, and
//! installs the reconnect catch-up handler. Closing (or dropping) the view
//! saves the draft, removes the handler and leaves the topic. Teardown is
//! synchronous so it is also safe from `Drop`, including when the join
//! never reached the server.

use std::sync::Arc;

use chrono::Utc;

use mentorlink_channel::HandlerId;
use mentorlink_core::assignment::Submission;
use mentorlink_core::draft::DraftKey;
use mentorlink_core::message::Message;
use mentorlink_core::schedule::{ScheduleProgress, ScheduleResource};
use mentorlink_core::session::{MentorshipSession, SessionAction};
use mentorlink_core::types::DbId;
use mentorlink_core::upload::UploadFile;

use crate::context::ClientContext;
use crate::error::ClientResult;
use crate::reconciler::Composer;
use crate::router::catch_up;

pub struct SessionView {
    ctx: Arc<ClientContext>,
    session_id: DbId,
    composer: Composer,
    reconnect_handler: Option<HandlerId>,
    open: bool,
}

impl SessionView {
    /// Open a view onto `session_id`.
    ///
    /// On error the topic is left again before returning.
    pub async fn open(ctx: Arc<ClientContext>, session_id: DbId) -> ClientResult<Self> {
        let join_state = ctx.channel.join(session_id);
        tracing::info!(session_id, ?join_state, "Opening session view");
        ctx.evict_other_sessions(session_id).await;

        let mut view = Self {
            ctx,
            session_id,
            composer: Composer::new(),
            reconnect_handler: None,
            open: true,
        };

        let session = view.ctx.sessions.refresh(session_id).await?;
        session.ensure_participant(view.ctx.actor.user_id)?;
        tokio::try_join!(
            view.ctx.schedules.refresh(session_id),
            view.ctx.messages.load(session_id),
            view.ctx.assignments.list(session_id),
        )?;

        let key = DraftKey::chat(view.ctx.actor.user_id, session_id);
        if let Some(text) = view.ctx.take_draft(&key, Utc::now()) {
            tracing::debug!(session_id, "Restored unsent draft");
            view.composer.set_text(text);
        }

        let weak = Arc::downgrade(&view.ctx);
        let handler = view.ctx.channel.set_reconnect_handler(move || {
            let Some(ctx) = weak.upgrade() else {
                return;
            };
            tokio::spawn(async move {
                catch_up(&ctx, session_id).await;
            });
        });
        view.reconnect_handler = Some(handler);

        Ok(view)
    }

    pub fn session_id(&self) -> DbId {
        self.session_id
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn composer_mut(&mut self) -> &mut Composer {
        &mut self.composer
    }

    pub async fn session(&self) -> Option<MentorshipSession> {
        self.ctx.sessions.cached(self.session_id).await
    }

    /// Send the composer's text. See [`MessageReconciler::send`](crate::reconciler::MessageReconciler::send).
    pub async fn send(&mut self) -> ClientResult<Message> {
        self.ctx
            .messages
            .send(self.session_id, &mut self.composer)
            .await
    }

    pub async fn upload(&self, file: &UploadFile) -> ClientResult<Message> {
        self.ctx.messages.upload(self.session_id, file).await
    }

    pub async fn submit(&self, assignment_id: DbId, file: &UploadFile) -> ClientResult<Submission> {
        self.ctx
            .assignments
            .submit(assignment_id, file, Utc::now())
            .await
    }

    pub async fn resources(&self, item_id: DbId) -> ClientResult<Vec<ScheduleResource>> {
        self.ctx.schedules.resources(self.session_id, item_id).await
    }

    pub async fn progress(&self) -> ScheduleProgress {
        self.ctx.schedules.progress(self.session_id).await
    }

    pub async fn perform(&self, action: SessionAction) -> ClientResult<MentorshipSession> {
        self.ctx.sessions.perform(self.session_id, action).await
    }

    /// Display lines for the message list, evaluated against the session
    /// as cached right now.
    pub async fn render(&self) -> Vec<String> {
        match self.session().await {
            Some(session) => self.ctx.messages.render(&session).await,
            None => Vec::new(),
        }
    }

    /// Close the view. Equivalent to dropping it.
    pub fn close(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;

        let key = DraftKey::chat(self.ctx.actor.user_id, self.session_id);
        self.ctx.save_draft(key, self.composer.text(), Utc::now());

        if let Some(handler) = self.reconnect_handler.take() {
            self.ctx.channel.clear_reconnect_handler(handler);
        }
        self.ctx.channel.leave(self.session_id);
        tracing::info!(session_id = self.session_id, "Session view closed");
    }
}

impl Drop for SessionView {
    fn drop(&mut self) {
        self.teardown();
    }
}
