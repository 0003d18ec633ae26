//! Integration tests for the health endpoint.

use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use taskpulse_api::{create_router, handlers::health::HealthResponse, AppState, WebhookSettings};
use taskpulse_core::Clock;
use taskpulse_testing::{IssueEventBuilder, TestEnv};
use tower::ServiceExt;

#[tokio::test]
async fn health_reports_ingestion_figures() {
    let env = TestEnv::builder().build();
    env.submit("issues", IssueEventBuilder::opened().build()).unwrap();
    env.submit("issues", IssueEventBuilder::opened().build()).unwrap();
    let state =
        AppState::new(env.service.clone(), WebhookSettings::default(), Arc::new(env.clock.clone()));

    let response = create_router(state, Duration::from_secs(5))
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.checks.dedup_entries, 1);
    assert_eq!(health.checks.dedup_window_ms, 5000);
    assert_eq!(health.checks.buffered_events, 1);
    assert_eq!(health.checks.stats.events_duplicate, 1);
    assert_eq!(health.timestamp.timestamp(), env.clock.now_utc().timestamp());
}
