//! Assignment list and submission pipeline.
//!
//! Submissions are validated locally (file, deadline, existing submission)
//! before the upload starts. Timeliness and review state always come from
//! the server response.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use mentorlink_core::assignment::{Assignment, AssignmentState, Submission, TimeRemaining};
use mentorlink_core::error::CoreError;
use mentorlink_core::types::{DbId, Timestamp};
use mentorlink_core::upload::{validate_upload, UploadFile};
use mentorlink_events::{ClientEvent, EventBus};

use crate::api::PlatformApi;
use crate::error::{ClientError, ClientResult};
use crate::in_flight::InFlightSet;

pub struct AssignmentPipeline {
    api: Arc<dyn PlatformApi>,
    bus: Arc<EventBus>,
    /// Keyed by session id, in server order.
    assignments: RwLock<HashMap<DbId, Vec<Assignment>>>,
    submitting: InFlightSet<DbId>,
}

impl AssignmentPipeline {
    pub fn new(api: Arc<dyn PlatformApi>, bus: Arc<EventBus>) -> Self {
        Self {
            api,
            bus,
            assignments: RwLock::new(HashMap::new()),
            submitting: InFlightSet::new(),
        }
    }

    /// Fetch and cache the session's assignments.
    pub async fn list(&self, session_id: DbId) -> ClientResult<Vec<Assignment>> {
        let list = self.api.list_assignments(session_id).await?;
        self.assignments
            .write()
            .await
            .insert(session_id, list.clone());
        Ok(list)
    }

    pub async fn cached(&self, session_id: DbId) -> Vec<Assignment> {
        self.assignments
            .read()
            .await
            .get(&session_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn get(&self, assignment_id: DbId) -> Option<Assignment> {
        self.assignments
            .read()
            .await
            .values()
            .flatten()
            .find(|a| a.id == assignment_id)
            .cloned()
    }

    /// Record an assignment pushed by the mentor. A repeated push for the
    /// same id replaces the entry rather than duplicating it.
    pub async fn on_created(&self, assignment: Assignment) {
        let session_id = assignment.session_id;
        let assignment_id = assignment.id;
        let is_new = {
            let mut assignments = self.assignments.write().await;
            let list = assignments.entry(session_id).or_default();
            match list.iter_mut().find(|a| a.id == assignment_id) {
                Some(existing) => {
                    *existing = assignment;
                    false
                }
                None => {
                    list.push(assignment);
                    true
                }
            }
        };

        if is_new {
            tracing::info!(session_id, assignment_id, "Assignment created");
            self.bus.publish(ClientEvent::AssignmentCreated {
                session_id,
                assignment_id,
            });
        }
    }

    /// Submit a file for an assignment.
    ///
    /// Rejected locally, with no network call, when the file is invalid,
    /// the assignment already has a submission, or `now` is past the due
    /// date. The file is borrowed so a failed attempt can be retried
    /// without re-selecting it.
    pub async fn submit(
        &self,
        assignment_id: DbId,
        file: &UploadFile,
        now: Timestamp,
    ) -> ClientResult<Submission> {
        let assignment = self.get(assignment_id).await.ok_or(CoreError::NotFound {
            entity: "assignment",
            id: assignment_id,
        })?;
        validate_upload(file)?;
        assignment.ensure_submittable(now)?;

        let guard = self
            .submitting
            .try_acquire(assignment_id)
            .ok_or(ClientError::InFlight {
                session_id: assignment.session_id,
                action: "submit",
            })?;
        let result = self.api.submit_assignment(assignment_id, file).await;
        drop(guard);

        let updated = match result {
            Ok(updated) => updated,
            Err(e) => {
                tracing::error!(assignment_id, error = %e, "Assignment submission failed");
                return Err(e);
            }
        };
        let submission = updated.submission.clone().ok_or_else(|| {
            CoreError::Internal(format!(
                "Submit response for assignment {assignment_id} has no submission"
            ))
        })?;

        let session_id = updated.session_id;
        {
            let mut assignments = self.assignments.write().await;
            if let Some(slot) = assignments
                .get_mut(&session_id)
                .and_then(|list| list.iter_mut().find(|a| a.id == assignment_id))
            {
                *slot = updated;
            }
        }

        tracing::info!(
            assignment_id,
            timeliness = ?submission.timeliness,
            "Assignment submitted",
        );
        self.bus.publish(ClientEvent::AssignmentSubmitted {
            session_id,
            assignment_id,
        });
        Ok(submission)
    }

    pub async fn state_at(&self, assignment_id: DbId, now: Timestamp) -> Option<AssignmentState> {
        Some(self.get(assignment_id).await?.state_at(now))
    }

    /// Deadline label, or "Overdue" once `due_at <= now`.
    pub fn time_remaining(&self, due_at: Timestamp, now: Timestamp) -> TimeRemaining {
        TimeRemaining::until(due_at, now)
    }

    /// Drop every cached list except `session_id`'s.
    pub async fn retain_only(&self, session_id: DbId) {
        self.assignments
            .write()
            .await
            .retain(|id, _| *id == session_id);
    }
}
