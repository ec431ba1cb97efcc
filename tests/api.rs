mod common;

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};

use common::engine;
use offensive::api::{self, AppState, CompleteVideoResponse, OffensiveView, ProgressView};
use offensive::policy::{AllowAll, OwnerOnly, Policy};
use offensive::streak::{Outcome, Tier};

async fn server(policy: Arc<dyn Policy>) -> TestServer {
    let engine = engine(&["alice", "bob"], &["intro", "basics"]).await;
    TestServer::new(api::router(AppState::new(engine, policy))).unwrap()
}

fn actor(user: &'static str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static(api::ACTOR_HEADER),
        HeaderValue::from_static(user),
    )
}

#[tokio::test]
async fn complete_returns_progress_and_offensive() {
    let server = server(Arc::new(AllowAll)).await;

    let response = server
        .post("/users/alice/videos/intro/complete")
        .json(&json!({ "completed_at": "2024-03-01T10:00:00Z" }))
        .await;
    response.assert_status_ok();

    let body: CompleteVideoResponse = response.json();
    assert_eq!(body.progress.user_id, "alice");
    assert_eq!(body.progress.video_id, "intro");
    assert!(body.progress.completed);

    let result = body.offensive_result;
    assert!(result.is_new_offensive);
    assert!(!result.is_streak_broken);
    assert_eq!(result.outcome, Outcome::Started);
    assert_eq!(result.offensive.consecutive_days, 1);
    assert_eq!(result.offensive.tier, Tier::Normal);
    assert_eq!(result.offensive.next_tier, Some(Tier::Super));
    assert_eq!(result.offensive.next_tier_at, Some(7));
    assert!(!result.message.is_empty());

    let response = server.get("/users/alice/offensive").await;
    response.assert_status_ok();
    let offensive: OffensiveView = response.json();
    assert_eq!(offensive, result.offensive);
}

#[tokio::test]
async fn complete_without_body_uses_the_current_time() {
    let server = server(Arc::new(AllowAll)).await;

    let response = server.post("/users/alice/videos/intro/complete").await;
    response.assert_status_ok();

    let body: CompleteVideoResponse = response.json();
    assert!(body.progress.completed_at.is_some());
}

#[tokio::test]
async fn completing_twice_conflicts_with_current_state() {
    let server = server(Arc::new(AllowAll)).await;

    server
        .post("/users/alice/videos/intro/complete")
        .await
        .assert_status_ok();

    let response = server.post("/users/alice/videos/intro/complete").await;
    response.assert_status(StatusCode::CONFLICT);

    let body: Value = response.json();
    assert_eq!(body["error"], "already_completed");
    assert!(body["message"].is_string());
    assert_eq!(body["data"]["progress"]["completed"], true);
    assert_eq!(body["data"]["offensive"]["consecutive_days"], 1);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let server = server(Arc::new(AllowAll)).await;

    let response = server.post("/users/mallory/videos/intro/complete").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"], "user_not_found");
    assert_eq!(body["data"]["user_id"], "mallory");

    let response = server.post("/users/alice/videos/missing/complete").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"], "video_not_found");

    let response = server.get("/users/alice/offensive").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"], "no_offensive");
}

#[tokio::test]
async fn backdated_completion_is_unprocessable() {
    let server = server(Arc::new(AllowAll)).await;

    server
        .post("/users/alice/videos/intro/complete")
        .json(&json!({ "completed_at": "2024-03-05T10:00:00Z" }))
        .await
        .assert_status_ok();

    let response = server
        .post("/users/alice/videos/basics/complete")
        .json(&json!({ "completed_at": "2024-03-01T10:00:00Z" }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let body: Value = response.json();
    assert_eq!(body["error"], "invalid_timestamp");
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let server = server(Arc::new(AllowAll)).await;

    let response = server
        .post("/users/alice/videos/intro/complete")
        .json(&json!({ "completed_at": "yesterday" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let progress: Vec<ProgressView> = server.get("/users/alice/progress").await.json();
    assert!(progress.is_empty());
}

#[tokio::test]
async fn start_then_list_progress() {
    let server = server(Arc::new(AllowAll)).await;

    let response = server.post("/users/alice/videos/basics/start").await;
    response.assert_status_ok();
    let started: ProgressView = response.json();
    assert!(!started.completed);

    server
        .post("/users/alice/videos/intro/complete")
        .await
        .assert_status_ok();

    let response = server.get("/users/alice/progress").await;
    response.assert_status_ok();
    let progress: Vec<ProgressView> = response.json();
    assert_eq!(progress.len(), 2);
    assert_eq!(progress[0], started);
    assert!(progress[1].completed);
}

#[tokio::test]
async fn owner_only_policy_rejects_other_callers() {
    let server = server(Arc::new(OwnerOnly)).await;

    let (name, value) = actor("bob");
    let response = server
        .post("/users/alice/videos/intro/complete")
        .add_header(name, value)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["error"], "forbidden");

    let response = server.get("/users/alice/progress").await;
    response.assert_status(StatusCode::FORBIDDEN);

    let (name, value) = actor("alice");
    server
        .post("/users/alice/videos/intro/complete")
        .add_header(name, value)
        .await
        .assert_status_ok();

    let (name, value) = actor("alice");
    let progress: Vec<ProgressView> = server
        .get("/users/alice/progress")
        .add_header(name, value)
        .await
        .json();
    assert_eq!(progress.len(), 1);
}
