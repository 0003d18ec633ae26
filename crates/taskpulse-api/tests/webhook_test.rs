//! Integration tests for the webhook endpoint.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use taskpulse_api::{
    create_router,
    crypto::generate_hmac_hex,
    handlers::{
        webhook::{WebhookResponse, WebhookStatus},
        ErrorResponse,
    },
    server::DEFAULT_REQUEST_TIMEOUT,
    AppState, WebhookSettings,
};
use taskpulse_testing::{IssueEventBuilder, TestEnv};
use tower::ServiceExt;

fn router(env: &TestEnv, webhook: WebhookSettings) -> Router {
    let state = AppState::new(env.service.clone(), webhook, Arc::new(env.clock.clone()));
    create_router(state, DEFAULT_REQUEST_TIMEOUT)
}

fn webhook_request(event_type: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json");
    if let Some(event_type) = event_type {
        builder = builder.header("X-GitHub-Event", event_type);
    }
    builder.body(body.into()).unwrap()
}

async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn accepted_event_returns_identity() {
    let env = TestEnv::builder().subscriber("alice", "100").build();
    let payload = IssueEventBuilder::opened().assignees(["alice"]).build();

    let response = router(&env, WebhookSettings::default())
        .oneshot(webhook_request(Some("issues"), payload.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body: WebhookResponse = json_body(response).await;
    assert_eq!(body.status, WebhookStatus::Accepted);
    assert_eq!(body.identity, "issues:opened:1001");
}

#[tokio::test]
async fn redelivery_is_acknowledged_as_duplicate() {
    let env = TestEnv::builder().build();
    let app = router(&env, WebhookSettings::default());
    let payload = IssueEventBuilder::closed().build().to_string();

    let first = app.clone().oneshot(webhook_request(Some("issues"), payload.clone())).await;
    let second = app.oneshot(webhook_request(Some("issues"), payload)).await.unwrap();

    assert_eq!(first.unwrap().status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
    let body: WebhookResponse = json_body(second).await;
    assert_eq!(body.status, WebhookStatus::Duplicate);
}

#[tokio::test]
async fn missing_event_header_is_rejected() {
    let env = TestEnv::builder().build();

    let response = router(&env, WebhookSettings::default())
        .oneshot(webhook_request(None, IssueEventBuilder::opened().build().to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = json_body(response).await;
    assert_eq!(body.error.code, "E1001");
    assert!(body.error.message.contains("x-github-event"));
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let env = TestEnv::builder().build();

    let response = router(&env, WebhookSettings::default())
        .oneshot(webhook_request(Some("issues"), "{not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = json_body(response).await;
    assert_eq!(body.error.code, "E1001");
    assert!(env.service.recent_events().is_empty());
}

#[tokio::test]
async fn non_object_json_is_rejected() {
    let env = TestEnv::builder().build();

    let response = router(&env, WebhookSettings::default())
        .oneshot(webhook_request(Some("issues"), "[1,2,3]"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn custom_event_header_is_honored() {
    let env = TestEnv::builder().build();
    let webhook = WebhookSettings {
        event_header: "x-tracker-event".parse().unwrap(),
        ..WebhookSettings::default()
    };
    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("X-Tracker-Event", "issues")
        .body(Body::from(IssueEventBuilder::opened().build().to_string()))
        .unwrap();

    let response = router(&env, webhook).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

mod signatures {
    use super::*;

    const SECRET: &str = "hook-secret";

    fn signed_settings() -> WebhookSettings {
        WebhookSettings { secret: Some(SECRET.to_string()), ..WebhookSettings::default() }
    }

    fn signed_request(body: &str, signature: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("X-GitHub-Event", "issues")
            .header("X-Hub-Signature-256", signature)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn valid_signature_is_accepted() {
        let env = TestEnv::builder().build();
        let body = IssueEventBuilder::opened().build().to_string();
        let signature = format!("sha256={}", generate_hmac_hex(body.as_bytes(), SECRET).unwrap());

        let response =
            router(&env, signed_settings()).oneshot(signed_request(&body, &signature)).await;

        assert_eq!(response.unwrap().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn wrong_signature_is_rejected_before_the_gate() {
        let env = TestEnv::builder().build();
        let body = IssueEventBuilder::opened().build().to_string();
        let signature = format!("sha256={}", generate_hmac_hex(b"other", SECRET).unwrap());

        let response =
            router(&env, signed_settings()).oneshot(signed_request(&body, &signature)).await;

        let response = response.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error: ErrorResponse = json_body(response).await;
        assert_eq!(error.error.code, "E1002");
        assert_eq!(env.service.dedup_entries(), 0);
    }

    #[tokio::test]
    async fn unsigned_request_is_rejected_when_secret_is_set() {
        let env = TestEnv::builder().build();
        let request =
            webhook_request(Some("issues"), IssueEventBuilder::opened().build().to_string());

        let response = router(&env, signed_settings()).oneshot(request).await.unwrap();

        let error: ErrorResponse = json_body(response).await;
        assert_eq!(error.error.code, "E1002");
    }
}

#[tokio::test]
async fn recent_events_endpoint_lists_accepted_events() {
    let env = TestEnv::builder().build();
    let app = router(&env, WebhookSettings::default());
    app.clone()
        .oneshot(webhook_request(Some("issues"), IssueEventBuilder::opened().build().to_string()))
        .await
        .unwrap();

    let response = app
        .oneshot(Request::builder().uri("/webhook-data").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let events: Vec<Value> = json_body(response).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["source_event_type"], json!("issues"));
    assert_eq!(events[0]["action"], json!("opened"));
    assert_eq!(events[0]["payload"]["issue"]["id"], json!(1001));
}
