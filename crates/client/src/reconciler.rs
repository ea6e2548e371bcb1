//! Local message timelines reconciled from two delivery paths.
//!
//! A sent message comes back both as the HTTP response and as a
//! `new-message` push, in either order. Both paths insert through the
//! same id-keyed [`MessageTimeline`], so exactly one copy survives.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use mentorlink_core::message::{Message, RenderedBody};
use mentorlink_core::session::MentorshipSession;
use mentorlink_core::timeline::{InsertOutcome, MessageTimeline};
use mentorlink_core::types::DbId;
use mentorlink_core::upload::{validate_message_text, validate_upload, UploadFile};
use mentorlink_events::{ClientEvent, EventBus};

use crate::api::PlatformApi;
use crate::error::ClientResult;

/// The caller's message input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composer {
    text: String,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn take(&mut self) -> String {
        std::mem::take(&mut self.text)
    }

    fn restore(&mut self, text: String) {
        self.text = text;
    }
}

pub struct MessageReconciler {
    api: Arc<dyn PlatformApi>,
    bus: Arc<EventBus>,
    timelines: RwLock<HashMap<DbId, MessageTimeline>>,
}

impl MessageReconciler {
    pub fn new(api: Arc<dyn PlatformApi>, bus: Arc<EventBus>) -> Self {
        Self {
            api,
            bus,
            timelines: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch the session's messages and merge them by id.
    ///
    /// Used for the initial load and for catch-up after a reconnect.
    /// Returns how many messages were new.
    pub async fn load(&self, session_id: DbId) -> ClientResult<usize> {
        let fetched = self.api.get_messages(session_id).await?;
        let mut appended = Vec::new();
        {
            let mut timelines = self.timelines.write().await;
            let timeline = timelines
                .entry(session_id)
                .or_insert_with(|| MessageTimeline::new(session_id));
            for message in fetched {
                let id = message.id;
                if timeline.insert(message) == InsertOutcome::Appended {
                    appended.push(id);
                }
            }
        }

        for message_id in &appended {
            self.bus.publish(ClientEvent::MessageAppended {
                session_id,
                message_id: *message_id,
            });
        }
        tracing::debug!(session_id, new = appended.len(), "Messages merged");
        Ok(appended.len())
    }

    /// Send the composer's text.
    ///
    /// The composer is cleared before the call is issued. On failure,
    /// including local validation failure, its text is restored and
    /// nothing is appended.
    pub async fn send(&self, session_id: DbId, composer: &mut Composer) -> ClientResult<Message> {
        let body = composer.take();
        let text = match validate_message_text(&body) {
            Ok(text) => text.to_string(),
            Err(e) => {
                composer.restore(body);
                return Err(e.into());
            }
        };

        match self.api.send_message(session_id, &text).await {
            Ok(message) => {
                self.insert(message.clone()).await;
                Ok(message)
            }
            Err(e) => {
                tracing::error!(session_id, error = %e, "Message send failed");
                composer.restore(body);
                Err(e)
            }
        }
    }

    /// Upload a file as a `FILE` message. The file is only borrowed.
    pub async fn upload(&self, session_id: DbId, file: &UploadFile) -> ClientResult<Message> {
        validate_upload(file)?;
        let message = match self.api.upload_file(session_id, file).await {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(session_id, file = %file.name, error = %e, "Upload failed");
                return Err(e);
            }
        };
        self.insert(message.clone()).await;
        Ok(message)
    }

    /// Insert a `new-message` push.
    pub async fn on_pushed(&self, message: Message) -> InsertOutcome {
        self.insert(message).await
    }

    async fn insert(&self, message: Message) -> InsertOutcome {
        let session_id = message.session_id;
        let message_id = message.id;
        let outcome = self
            .timelines
            .write()
            .await
            .entry(session_id)
            .or_insert_with(|| MessageTimeline::new(session_id))
            .insert(message);

        match outcome {
            InsertOutcome::Appended => {
                self.bus.publish(ClientEvent::MessageAppended {
                    session_id,
                    message_id,
                });
            }
            InsertOutcome::Duplicate => {
                tracing::debug!(session_id, message_id, "Duplicate message ignored");
            }
            InsertOutcome::ForeignSession => {
                tracing::warn!(session_id, message_id, "Message for a different session");
            }
        }
        outcome
    }

    /// Messages in ascending id order.
    pub async fn messages(&self, session_id: DbId) -> Vec<Message> {
        self.timelines
            .read()
            .await
            .get(&session_id)
            .map(MessageTimeline::to_vec)
            .unwrap_or_default()
    }

    /// One display line per message, resolved against `session` now.
    ///
    /// Meeting links are checked for staleness here rather than when the
    /// message arrived, so a completed session shows them as ended.
    pub async fn render(&self, session: &MentorshipSession) -> Vec<String> {
        let timelines = self.timelines.read().await;
        let Some(timeline) = timelines.get(&session.id) else {
            return Vec::new();
        };
        timeline
            .iter()
            .map(|message| describe(message, message.render(session)))
            .collect()
    }

    pub async fn retain_only(&self, session_id: DbId) {
        self.timelines
            .write()
            .await
            .retain(|id, _| *id == session_id);
    }
}

fn describe(message: &Message, body: RenderedBody<'_>) -> String {
    let sender = format!("{:?}", message.sender_role).to_lowercase();
    match body {
        RenderedBody::Text(text) => format!("[{}] {sender}: {text}", message.id),
        RenderedBody::File(file) => format!(
            "[{}] {sender} shared {} ({} bytes)",
            message.id, file.name, file.size
        ),
        RenderedBody::MeetingLink { link, state } => {
            format!("[{}] meeting link {link} ({state:?})", message.id)
        }
        RenderedBody::Notice(text) => format!("[{}] {text}", message.id),
    }
}
