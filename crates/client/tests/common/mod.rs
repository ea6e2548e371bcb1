//! Shared fixtures for client integration tests.
//!
//! [`FakeApi`] is an in-memory [`PlatformApi`] that records every call by
//! name, so tests can prove that local rejections never reach the
//! network, and can be told to fail individual endpoints.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;

use mentorlink_channel::{ChannelClient, ChannelEndpoint, ReconnectConfig};
use mentorlink_client::{ClientContext, ClientError, ClientResult, PlatformApi};
use mentorlink_core::assignment::{Assignment, ReviewStatus, Submission, Timeliness};
use mentorlink_core::error::CoreError;
use mentorlink_core::message::{FileDescriptor, Message, MessageContent, SenderRole};
use mentorlink_core::schedule::{ScheduleItem, ScheduleResource, ScheduleStatus};
use mentorlink_core::session::{MentorshipSession, SessionAction, SessionStatus};
use mentorlink_core::types::{Actor, DbId};
use mentorlink_core::upload::UploadFile;

pub const STUDENT_ID: DbId = 10;
pub const MENTOR_ID: DbId = 20;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 1, 10, 0, 0).unwrap()
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn session(id: DbId, status: SessionStatus) -> MentorshipSession {
    MentorshipSession {
        id,
        mentor_id: MENTOR_ID,
        student_id: STUDENT_ID,
        skill_id: 3,
        plan_id: None,
        status,
        scheduled_at: None,
        ephemeral_meeting_link: None,
        created_at: t0(),
        updated_at: t0(),
    }
}

pub fn scheduled_with_link(id: DbId, link: &str) -> MentorshipSession {
    MentorshipSession {
        ephemeral_meeting_link: Some(link.to_string()),
        ..session(id, SessionStatus::Scheduled)
    }
}

pub fn slot(
    id: DbId,
    session_id: DbId,
    week: i32,
    number: i32,
    status: ScheduleStatus,
) -> ScheduleItem {
    ScheduleItem {
        id,
        session_id,
        week_number: week,
        session_number: number,
        topic_title: format!("Topic {week}.{number}"),
        scheduled_at: None,
        status,
        retry_available_after: None,
    }
}

pub fn message(id: DbId, session_id: DbId, content: MessageContent) -> Message {
    Message {
        id,
        session_id,
        sender_id: Some(MENTOR_ID),
        sender_role: SenderRole::Mentor,
        content,
        created_at: t0(),
    }
}

pub fn text_message(id: DbId, session_id: DbId, text: &str) -> Message {
    message(id, session_id, MessageContent::Text(text.to_string()))
}

pub fn assignment(id: DbId, session_id: DbId, due_at: DateTime<Utc>) -> Assignment {
    Assignment {
        id,
        session_id,
        title: format!("Assignment {id}"),
        description: String::new(),
        due_at,
        submission: None,
    }
}

pub fn pdf() -> UploadFile {
    UploadFile::new("answer.pdf", "application/pdf", b"%PDF-1.7".to_vec())
}

/// A context wired to `api` with a channel that is never started.
pub fn context(api: Arc<FakeApi>, actor: Actor) -> Arc<ClientContext> {
    let channel = ChannelClient::new(
        ChannelEndpoint::new("ws://127.0.0.1:9/ws", None),
        ReconnectConfig::default(),
    );
    ClientContext::new(actor, api, channel, chrono::Duration::hours(24))
}

// ---------------------------------------------------------------------------
// FakeApi
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeApi {
    pub sessions: Mutex<HashMap<DbId, MentorshipSession>>,
    pub schedules: Mutex<HashMap<DbId, Vec<ScheduleItem>>>,
    pub messages: Mutex<HashMap<DbId, Vec<Message>>>,
    pub assignments: Mutex<HashMap<DbId, Vec<Assignment>>>,
    calls: Mutex<Vec<&'static str>>,
    failing: Mutex<HashSet<&'static str>>,
    next_message_id: AtomicI64,
    /// When set, `session_action` waits for a notification before answering.
    action_gate: Mutex<Option<Arc<Notify>>>,
    /// Same for `submit_assignment`.
    submit_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        let api = Self::default();
        api.next_message_id.store(100, Ordering::SeqCst);
        Arc::new(api)
    }

    pub fn with_session(self: Arc<Self>, session: MentorshipSession) -> Arc<Self> {
        self.sessions.lock().unwrap().insert(session.id, session);
        self
    }

    pub fn with_schedule(self: Arc<Self>, session_id: DbId, items: Vec<ScheduleItem>) -> Arc<Self> {
        self.schedules.lock().unwrap().insert(session_id, items);
        self
    }

    pub fn with_messages(self: Arc<Self>, session_id: DbId, messages: Vec<Message>) -> Arc<Self> {
        self.messages.lock().unwrap().insert(session_id, messages);
        self
    }

    pub fn with_assignments(
        self: Arc<Self>,
        session_id: DbId,
        assignments: Vec<Assignment>,
    ) -> Arc<Self> {
        self.assignments.lock().unwrap().insert(session_id, assignments);
        self
    }

    /// Number of calls made to `endpoint`.
    pub fn calls(&self, endpoint: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == endpoint)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Make `endpoint` answer with a 500 until [`recover`](Self::recover).
    pub fn fail(&self, endpoint: &'static str) {
        self.failing.lock().unwrap().insert(endpoint);
    }

    pub fn recover(&self, endpoint: &'static str) {
        self.failing.lock().unwrap().remove(endpoint);
    }

    pub fn gate_actions(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.action_gate.lock().unwrap() = Some(Arc::clone(&notify));
        notify
    }

    pub fn gate_submissions(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.submit_gate.lock().unwrap() = Some(Arc::clone(&notify));
        notify
    }

    /// Server-side change made by someone else.
    pub fn set_session(&self, session: MentorshipSession) {
        self.sessions.lock().unwrap().insert(session.id, session);
    }

    pub fn push_message(&self, message: Message) {
        self.messages
            .lock()
            .unwrap()
            .entry(message.session_id)
            .or_default()
            .push(message);
    }

    fn record(&self, endpoint: &'static str) -> ClientResult<()> {
        self.calls.lock().unwrap().push(endpoint);
        if self.failing.lock().unwrap().contains(endpoint) {
            return Err(ClientError::Api {
                status: 500,
                message: format!("{endpoint} failed"),
            });
        }
        Ok(())
    }

    fn next_id(&self) -> DbId {
        self.next_message_id.fetch_add(1, Ordering::SeqCst)
    }

    fn store_message(&self, session_id: DbId, content: MessageContent) -> Message {
        let message = Message {
            id: self.next_id(),
            session_id,
            sender_id: Some(STUDENT_ID),
            sender_role: SenderRole::Student,
            content,
            created_at: t0(),
        };
        self.push_message(message.clone());
        message
    }
}

fn not_found(entity: &'static str, id: DbId) -> ClientError {
    ClientError::Core(CoreError::NotFound { entity, id })
}

#[async_trait]
impl PlatformApi for FakeApi {
    async fn get_session(&self, session_id: DbId) -> ClientResult<MentorshipSession> {
        self.record("get_session")?;
        self.sessions
            .lock()
            .unwrap()
            .get(&session_id)
            .cloned()
            .ok_or_else(|| not_found("session", session_id))
    }

    async fn list_sessions(&self) -> ClientResult<Vec<MentorshipSession>> {
        self.record("list_sessions")?;
        let mut list: Vec<_> = self.sessions.lock().unwrap().values().cloned().collect();
        list.sort_by_key(|s| s.id);
        Ok(list)
    }

    async fn session_action(
        &self,
        session_id: DbId,
        action: SessionAction,
    ) -> ClientResult<MentorshipSession> {
        self.calls.lock().unwrap().push("session_action");
        let gate = self.action_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.failing.lock().unwrap().contains("session_action") {
            return Err(ClientError::Api {
                status: 500,
                message: "session_action failed".into(),
            });
        }

        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| not_found("session", session_id))?;
        session.status = action.target();
        Ok(session.clone())
    }

    async fn delete_session(&self, session_id: DbId) -> ClientResult<()> {
        self.record("delete_session")?;
        self.sessions.lock().unwrap().remove(&session_id);
        Ok(())
    }

    async fn get_schedule(&self, session_id: DbId) -> ClientResult<Vec<ScheduleItem>> {
        self.record("get_schedule")?;
        Ok(self
            .schedules
            .lock()
            .unwrap()
            .get(&session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_resources(
        &self,
        _session_id: DbId,
        item_id: DbId,
    ) -> ClientResult<Vec<ScheduleResource>> {
        self.record("get_resources")?;
        Ok(vec![ScheduleResource {
            id: item_id * 10,
            title: format!("Slides for item {item_id}"),
            url: format!("https://files.test/slides/{item_id}.pdf"),
            mime_type: Some("application/pdf".into()),
        }])
    }

    async fn get_messages(&self, session_id: DbId) -> ClientResult<Vec<Message>> {
        self.record("get_messages")?;
        Ok(self
            .messages
            .lock()
            .unwrap()
            .get(&session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_message(&self, session_id: DbId, text: &str) -> ClientResult<Message> {
        self.record("send_message")?;
        Ok(self.store_message(session_id, MessageContent::Text(text.to_string())))
    }

    async fn upload_file(&self, session_id: DbId, file: &UploadFile) -> ClientResult<Message> {
        self.record("upload_file")?;
        let descriptor = FileDescriptor {
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            url: format!("https://files.test/{}", file.name),
            size: file.size(),
        };
        Ok(self.store_message(session_id, MessageContent::File(descriptor)))
    }

    async fn list_assignments(&self, session_id: DbId) -> ClientResult<Vec<Assignment>> {
        self.record("list_assignments")?;
        Ok(self
            .assignments
            .lock()
            .unwrap()
            .get(&session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn submit_assignment(
        &self,
        assignment_id: DbId,
        file: &UploadFile,
    ) -> ClientResult<Assignment> {
        self.record("submit_assignment")?;
        let gate = self.submit_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let mut assignments = self.assignments.lock().unwrap();
        let assignment = assignments
            .values_mut()
            .flatten()
            .find(|a| a.id == assignment_id)
            .ok_or_else(|| not_found("assignment", assignment_id))?;
        // The server stamps timeliness from its own clock.
        assignment.submission = Some(Submission {
            file_url: format!("https://files.test/{}", file.name),
            submitted_at: assignment.due_at,
            timeliness: Timeliness::OnTime,
            review_status: ReviewStatus::Pending,
            mentor_feedback: None,
        });
        Ok(assignment.clone())
    }
}
