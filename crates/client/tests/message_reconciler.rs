//! Integration tests for `MessageReconciler` and the router's message and
//! session paths.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;

use mentorlink_channel::protocol::SessionUpdatedData;
use mentorlink_channel::ServerEvent;
use mentorlink_client::router::apply_event;
use mentorlink_client::{ClientError, Composer};
use mentorlink_core::error::CoreError;
use mentorlink_core::message::{LinkState, MessageContent, RenderedBody};
use mentorlink_core::session::SessionStatus;
use mentorlink_core::timeline::InsertOutcome;
use mentorlink_core::types::Actor;
use mentorlink_core::upload::UploadFile;

use common::{context, message, pdf, scheduled_with_link, text_message, FakeApi, STUDENT_ID};

// ---------------------------------------------------------------------------
// Test: a successful send clears the input and leaves exactly one copy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn send_then_push_yields_one_copy() {
    let api = FakeApi::new();
    let ctx = context(Arc::clone(&api), Actor::student(STUDENT_ID));
    let mut composer = Composer::new();
    composer.set_text("hello mentor");

    let sent = ctx.messages.send(7, &mut composer).await.unwrap();
    assert!(composer.is_empty());

    // The same message then arrives over the channel.
    let outcome = ctx.messages.on_pushed(sent.clone()).await;
    assert_eq!(outcome, InsertOutcome::Duplicate);

    let messages = ctx.messages.messages(7).await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, sent.id);
}

#[tokio::test]
async fn push_then_response_yields_one_copy() {
    let api = FakeApi::new();
    let ctx = context(Arc::clone(&api), Actor::student(STUDENT_ID));

    // The push for id 100 (the fake's first id) beats the HTTP response.
    let early = message(100, 7, MessageContent::Text("hi".into()));
    assert_eq!(ctx.messages.on_pushed(early).await, InsertOutcome::Appended);

    let mut composer = Composer::new();
    composer.set_text("hi");
    let sent = ctx.messages.send(7, &mut composer).await.unwrap();

    assert_eq!(sent.id, 100);
    assert_eq!(ctx.messages.messages(7).await.len(), 1);
}

// ---------------------------------------------------------------------------
// Test: a failed send restores the input and appends nothing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_send_restores_input() {
    let api = FakeApi::new();
    api.fail("send_message");
    let ctx = context(Arc::clone(&api), Actor::student(STUDENT_ID));
    let mut composer = Composer::new();
    composer.set_text("  see you at 5  ");

    let err = ctx.messages.send(7, &mut composer).await.unwrap_err();

    assert!(err.is_retriable());
    assert_eq!(composer.text(), "  see you at 5  ");
    assert!(ctx.messages.messages(7).await.is_empty());
}

#[tokio::test]
async fn blank_message_is_rejected_locally() {
    let api = FakeApi::new();
    let ctx = context(Arc::clone(&api), Actor::student(STUDENT_ID));
    let mut composer = Composer::new();
    composer.set_text("   ");

    let err = ctx.messages.send(7, &mut composer).await.unwrap_err();

    assert_matches!(err, ClientError::Core(CoreError::Validation(_)));
    assert_eq!(composer.text(), "   ");
    assert_eq!(api.total_calls(), 0);
}

// ---------------------------------------------------------------------------
// Test: timelines stay in id order across both paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn load_merges_with_pushed_messages_in_id_order() {
    let api = FakeApi::new().with_messages(
        7,
        vec![text_message(1, 7, "a"), text_message(3, 7, "c")],
    );
    let ctx = context(Arc::clone(&api), Actor::student(STUDENT_ID));

    ctx.messages.on_pushed(text_message(4, 7, "d")).await;
    ctx.messages.on_pushed(text_message(2, 7, "b")).await;
    let new = ctx.messages.load(7).await.unwrap();

    assert_eq!(new, 2);
    let ids: Vec<_> = ctx.messages.messages(7).await.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);

    // A second catch-up adds nothing.
    assert_eq!(ctx.messages.load(7).await.unwrap(), 0);
}

// ---------------------------------------------------------------------------
// Test: uploads borrow the picked file and are validated first
// ---------------------------------------------------------------------------

#[tokio::test]
async fn oversized_upload_is_rejected_locally() {
    let api = FakeApi::new();
    let ctx = context(Arc::clone(&api), Actor::student(STUDENT_ID));
    let file = UploadFile::new(
        "video.pdf",
        "application/pdf",
        vec![0; 10 * 1024 * 1024 + 1],
    );

    let err = ctx.messages.upload(7, &file).await.unwrap_err();

    assert_matches!(err, ClientError::Core(CoreError::Validation(_)));
    assert_eq!(api.calls("upload_file"), 0);
}

#[tokio::test]
async fn upload_appends_file_message() {
    let api = FakeApi::new();
    let ctx = context(Arc::clone(&api), Actor::student(STUDENT_ID));
    let file = pdf();

    let sent = ctx.messages.upload(7, &file).await.unwrap();

    assert_matches!(sent.content, MessageContent::File(ref d) if d.name == "answer.pdf");
    assert_eq!(ctx.messages.messages(7).await.len(), 1);
}

// ---------------------------------------------------------------------------
// Test: meeting links go stale at render time
// ---------------------------------------------------------------------------

#[tokio::test]
async fn meeting_link_renders_ended_after_completion() {
    let link = "https://meet.test/L1";
    let api = FakeApi::new()
        .with_session(scheduled_with_link(1, link))
        .with_messages(1, vec![message(5, 1, MessageContent::EphemeralLink(link.into()))]);
    let ctx = context(Arc::clone(&api), Actor::student(STUDENT_ID));
    ctx.sessions.get_session(1).await.unwrap();
    ctx.messages.load(1).await.unwrap();

    let session = ctx.sessions.cached(1).await.unwrap();
    let before = ctx.messages.messages(1).await;
    assert_matches!(
        before[0].render(&session),
        RenderedBody::MeetingLink {
            state: LinkState::Joinable,
            ..
        }
    );

    apply_event(
        &ctx,
        ServerEvent::SessionUpdated(SessionUpdatedData {
            session_id: 1,
            status: SessionStatus::Completed,
            ephemeral_meeting_link: None,
        }),
    )
    .await;

    let session = ctx.sessions.cached(1).await.unwrap();
    assert_matches!(
        before[0].render(&session),
        RenderedBody::MeetingLink {
            state: LinkState::Ended,
            ..
        }
    );
    let lines = ctx.messages.render(&session).await;
    assert!(lines[0].contains("Ended"));
    assert_eq!(api.calls("get_messages"), 1);
}

#[tokio::test]
async fn pushed_message_is_routed_to_timeline() {
    let api = FakeApi::new();
    let ctx = context(Arc::clone(&api), Actor::student(STUDENT_ID));

    let pushed = text_message(9, 7, "from mentor");
    apply_event(&ctx, ServerEvent::NewMessage(pushed.clone())).await;
    apply_event(&ctx, ServerEvent::NewMessage(pushed)).await;

    assert_eq!(ctx.messages.messages(7).await.len(), 1);
}
