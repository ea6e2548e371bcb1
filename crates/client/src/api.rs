//! REST client for the platform's session endpoints.
//!
//! [`PlatformApi`] is the seam the stores depend on; [`HttpPlatformApi`]
//! implements it over [`reqwest`]. Tests substitute an in-memory fake.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;

use mentorlink_core::assignment::Assignment;
use mentorlink_core::message::{Message, MessageContent};
use mentorlink_core::schedule::{ScheduleItem, ScheduleResource};
use mentorlink_core::session::{MentorshipSession, SessionAction};
use mentorlink_core::types::DbId;
use mentorlink_core::upload::UploadFile;

use crate::error::{classify_response, ClientError, ClientResult, Target};

/// Request/response calls the client makes against the platform.
///
/// Every method is a suspension point. Implementations report non-2xx
/// responses through the domain taxonomy (see
/// [`classify_response`](crate::error::classify_response)).
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// `GET /sessions/{id}`
    async fn get_session(&self, session_id: DbId) -> ClientResult<MentorshipSession>;

    /// `GET /sessions` scoped to the authenticated user.
    async fn list_sessions(&self) -> ClientResult<Vec<MentorshipSession>>;

    /// `POST /sessions/{id}/{action}`; returns the updated session.
    async fn session_action(
        &self,
        session_id: DbId,
        action: SessionAction,
    ) -> ClientResult<MentorshipSession>;

    /// `DELETE /sessions/{id}`
    async fn delete_session(&self, session_id: DbId) -> ClientResult<()>;

    /// `GET /sessions/{id}/schedule`
    async fn get_schedule(&self, session_id: DbId) -> ClientResult<Vec<ScheduleItem>>;

    /// `GET /sessions/{id}/schedule/{itemId}/resources`
    async fn get_resources(
        &self,
        session_id: DbId,
        item_id: DbId,
    ) -> ClientResult<Vec<ScheduleResource>>;

    /// `GET /sessions/{id}/messages`, ascending by id.
    async fn get_messages(&self, session_id: DbId) -> ClientResult<Vec<Message>>;

    /// `POST /sessions/{id}/messages`
    async fn send_message(&self, session_id: DbId, text: &str) -> ClientResult<Message>;

    /// `POST /sessions/{id}/upload` (multipart); returns a `FILE` message.
    async fn upload_file(&self, session_id: DbId, file: &UploadFile) -> ClientResult<Message>;

    /// `GET /sessions/{id}/assignments`
    async fn list_assignments(&self, session_id: DbId) -> ClientResult<Vec<Assignment>>;

    /// `POST /assignments/{id}/submit` (multipart); returns the assignment
    /// with its server-stamped submission.
    async fn submit_assignment(
        &self,
        assignment_id: DbId,
        file: &UploadFile,
    ) -> ClientResult<Assignment>;
}

/// Path segment of a lifecycle write.
pub fn action_path(action: SessionAction) -> &'static str {
    match action {
        SessionAction::Approve => "approve",
        SessionAction::Pay => "mock-payment",
        SessionAction::Schedule => "schedule",
        SessionAction::Complete => "complete",
        SessionAction::Reopen => "reopen",
        SessionAction::Cancel => "cancel",
    }
}

/// HTTP implementation of [`PlatformApi`].
pub struct HttpPlatformApi {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpPlatformApi {
    /// * `base_url`   - e.g. `http://localhost:3000/api/v1`.
    /// * `auth_token` - bearer token, passed through unchanged.
    pub fn new(
        base_url: impl Into<String>,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> ClientResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, auth_token))
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool).
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        auth_token: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token,
        }
    }

    // ---- private helpers ----

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{path}", self.base_url));
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Ensure the response has a success status code, mapping failures
    /// onto the domain taxonomy.
    async fn ensure_success(
        response: reqwest::Response,
        target: Target,
    ) -> ClientResult<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::debug!(status = status.as_u16(), entity = target.entity, id = target.id, "API call failed");
            return Err(classify_response(status.as_u16(), &body, target));
        }
        Ok(response)
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
        target: Target,
    ) -> ClientResult<T> {
        let response = Self::ensure_success(response, target).await?;
        Ok(response.json::<T>().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, target: Target) -> ClientResult<T> {
        let response = self.request(Method::GET, path).send().await?;
        Self::parse_response(response, target).await
    }
}

fn file_form(file: &UploadFile) -> ClientResult<Form> {
    let part = Part::bytes(file.bytes.clone())
        .file_name(file.name.clone())
        .mime_str(&file.mime_type)
        .map_err(ClientError::Request)?;
    Ok(Form::new().part("file", part))
}

#[async_trait]
impl PlatformApi for HttpPlatformApi {
    async fn get_session(&self, session_id: DbId) -> ClientResult<MentorshipSession> {
        self.get_json(&format!("/sessions/{session_id}"), Target::session(session_id))
            .await
    }

    async fn list_sessions(&self) -> ClientResult<Vec<MentorshipSession>> {
        self.get_json("/sessions", Target::session(0)).await
    }

    async fn session_action(
        &self,
        session_id: DbId,
        action: SessionAction,
    ) -> ClientResult<MentorshipSession> {
        let path = format!("/sessions/{session_id}/{}", action_path(action));
        let response = self.request(Method::POST, &path).send().await?;
        Self::parse_response(response, Target::session(session_id)).await
    }

    async fn delete_session(&self, session_id: DbId) -> ClientResult<()> {
        let response = self
            .request(Method::DELETE, &format!("/sessions/{session_id}"))
            .send()
            .await?;
        Self::ensure_success(response, Target::session(session_id)).await?;
        Ok(())
    }

    async fn get_schedule(&self, session_id: DbId) -> ClientResult<Vec<ScheduleItem>> {
        self.get_json(
            &format!("/sessions/{session_id}/schedule"),
            Target::session(session_id),
        )
        .await
    }

    async fn get_resources(
        &self,
        session_id: DbId,
        item_id: DbId,
    ) -> ClientResult<Vec<ScheduleResource>> {
        self.get_json(
            &format!("/sessions/{session_id}/schedule/{item_id}/resources"),
            Target::schedule_item(item_id),
        )
        .await
    }

    async fn get_messages(&self, session_id: DbId) -> ClientResult<Vec<Message>> {
        self.get_json(
            &format!("/sessions/{session_id}/messages"),
            Target::session(session_id),
        )
        .await
    }

    async fn send_message(&self, session_id: DbId, text: &str) -> ClientResult<Message> {
        let body = serde_json::json!({
            "content": MessageContent::Text(text.to_string()),
        });
        let response = self
            .request(Method::POST, &format!("/sessions/{session_id}/messages"))
            .json(&body)
            .send()
            .await?;
        Self::parse_response(response, Target::session(session_id)).await
    }

    async fn upload_file(&self, session_id: DbId, file: &UploadFile) -> ClientResult<Message> {
        let response = self
            .request(Method::POST, &format!("/sessions/{session_id}/upload"))
            .multipart(file_form(file)?)
            .send()
            .await?;
        Self::parse_response(response, Target::session(session_id)).await
    }

    async fn list_assignments(&self, session_id: DbId) -> ClientResult<Vec<Assignment>> {
        self.get_json(
            &format!("/sessions/{session_id}/assignments"),
            Target::session(session_id),
        )
        .await
    }

    async fn submit_assignment(
        &self,
        assignment_id: DbId,
        file: &UploadFile,
    ) -> ClientResult<Assignment> {
        let response = self
            .request(
                Method::POST,
                &format!("/assignments/{assignment_id}/submit"),
            )
            .multipart(file_form(file)?)
            .send()
            .await?;
        Self::parse_response(response, Target::assignment(assignment_id)).await
    }
}
