//! End-to-end tests for the complete notification workflow.
//!
//! Exercises the full system from HTTP ingestion through the dedup gate,
//! classification and rendering to delivery over the Telegram Bot API,
//! which is served by a mock HTTP server.

use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use taskpulse_api::{
    create_router, crypto::generate_hmac_hex, server::DEFAULT_REQUEST_TIMEOUT, AppState,
    WebhookSettings,
};
use taskpulse_core::Clock;
use taskpulse_pipeline::{
    Classifier, FanOut, Formatter, MessageLimits, NotificationPipeline, NotificationService,
    RecipientResolver, ServiceSettings, ServiceStats, TelegramGateway,
};
use taskpulse_testing::{
    directory, task_detail, IssueEventBuilder, ProjectItemEventBuilder, StaticTracker, TestClock,
};
use tower::ServiceExt;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

const BOT_TOKEN: &str = "123:ABC";
const SECRET: &str = "e2e-secret";

struct Harness {
    app: Router,
    service: Arc<NotificationService>,
    clock: TestClock,
    bot_api: MockServer,
}

impl Harness {
    async fn start(subscribers: &[(&str, &str)], tracker: StaticTracker) -> Self {
        let bot_api = MockServer::start().await;
        let clock = TestClock::new();
        let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());

        let gateway =
            TelegramGateway::new(bot_api.uri(), BOT_TOKEN, Duration::from_secs(5)).unwrap();
        let pipeline = NotificationPipeline::new(
            Classifier::new(Arc::new(tracker), "tracker-token"),
            Formatter::utc(),
            RecipientResolver::new(directory(subscribers)),
            FanOut::new(Arc::new(gateway), MessageLimits::default()),
        );
        let service = Arc::new(NotificationService::new(
            pipeline,
            Arc::clone(&shared_clock),
            ServiceSettings::default(),
        ));

        let webhook =
            WebhookSettings { secret: Some(SECRET.to_string()), ..WebhookSettings::default() };
        let state = AppState::new(Arc::clone(&service), webhook, shared_clock);
        let app = create_router(state, DEFAULT_REQUEST_TIMEOUT);

        Self { app, service, clock, bot_api }
    }

    async fn post(&self, event_type: &str, payload: &Value) -> (StatusCode, Value) {
        let body = payload.to_string();
        let signature = format!("sha256={}", generate_hmac_hex(body.as_bytes(), SECRET).unwrap());
        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .header("X-GitHub-Event", event_type)
            .header("X-Hub-Signature-256", signature)
            .body(Body::from(body))
            .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    /// Waits until `count` accepted events have finished processing.
    async fn processed(&self, count: u64) -> ServiceStats {
        for _ in 0..500 {
            let stats = self.service.stats();
            if stats.events_processed >= count {
                return stats;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {count} processed events");
    }

    async fn sent_chats(&self) -> Vec<String> {
        let requests = self.bot_api.received_requests().await.unwrap_or_default();
        let mut chats: Vec<String> = requests
            .iter()
            .filter_map(|r| serde_json::from_slice::<Value>(&r.body).ok())
            .filter_map(|body| body["chat_id"].as_str().map(String::from))
            .collect();
        chats.sort();
        chats
    }
}

fn bot_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}}))
}

#[tokio::test]
async fn created_task_reaches_every_assignee() {
    let harness =
        Harness::start(&[("alice", "100"), ("bob", "200")], StaticTracker::new()).await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path(format!("/bot{BOT_TOKEN}/sendMessage")))
        .respond_with(bot_ok())
        .expect(2)
        .mount(&harness.bot_api)
        .await;

    let payload =
        IssueEventBuilder::opened().title("Fix login").assignees(["alice", "bob"]).build();
    let (status, body) = harness.post("issues", &payload).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["identity"], "issues:opened:1001");

    let stats = harness.processed(1).await;
    assert_eq!(stats.deliveries_succeeded, 2);
    assert_eq!(stats.deliveries_failed, 0);
    assert_eq!(harness.sent_chats().await, vec!["100", "200"]);

    let requests = harness.bot_api.received_requests().await.unwrap();
    let message: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(message["parse_mode"], "MarkdownV2");
    assert!(message["text"].as_str().unwrap().contains("Fix login"));
}

#[tokio::test]
async fn redelivery_inside_the_window_is_sent_once() {
    let harness = Harness::start(&[("alice", "100")], StaticTracker::new()).await;
    Mock::given(matchers::method("POST")).respond_with(bot_ok()).mount(&harness.bot_api).await;

    let payload = IssueEventBuilder::closed().assignees(["alice"]).build();
    let (_, first) = harness.post("issues", &payload).await;
    let (status, second) = harness.post("issues", &payload).await;

    assert_eq!(first["status"], "accepted");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["status"], "duplicate");

    let stats = harness.processed(1).await;
    assert_eq!(stats.events_duplicate, 1);
    assert_eq!(harness.sent_chats().await, vec!["100"]);

    // Once the window has passed the same delivery is processed again.
    harness.clock.advance(Duration::from_secs(6));
    let (_, third) = harness.post("issues", &payload).await;
    assert_eq!(third["status"], "accepted");
    harness.processed(2).await;
    assert_eq!(harness.sent_chats().await, vec!["100", "100"]);
}

#[tokio::test]
async fn blocked_recipient_does_not_affect_the_others() {
    let harness =
        Harness::start(&[("alice", "100"), ("bob", "200")], StaticTracker::new()).await;
    Mock::given(matchers::method("POST"))
        .and(matchers::body_partial_json(json!({"chat_id": "200"})))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "ok": false,
            "error_code": 403,
            "description": "Forbidden: bot was blocked by the user"
        })))
        .mount(&harness.bot_api)
        .await;
    Mock::given(matchers::method("POST")).respond_with(bot_ok()).mount(&harness.bot_api).await;

    let payload = IssueEventBuilder::reopened().assignees(["alice", "bob"]).build();
    harness.post("issues", &payload).await;

    let stats = harness.processed(1).await;
    assert_eq!(stats.deliveries_succeeded, 1);
    assert_eq!(stats.deliveries_failed, 1);
    assert_eq!(stats.events_dropped, 0);
}

#[tokio::test]
async fn status_change_is_resolved_through_the_tracker() {
    let tracker = StaticTracker::new();
    tracker.insert("I_kwDOAbc123", task_detail(["alice"]));
    let harness = Harness::start(&[("alice", "100")], tracker).await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path(format!("/bot{BOT_TOKEN}/sendMessage")))
        .respond_with(bot_ok())
        .expect(1)
        .mount(&harness.bot_api)
        .await;

    let (_, body) =
        harness.post("projects_v2_item", &ProjectItemEventBuilder::status_change().build()).await;
    assert_eq!(body["status"], "accepted");

    let stats = harness.processed(1).await;
    assert_eq!(stats.deliveries_succeeded, 1);

    let requests = harness.bot_api.received_requests().await.unwrap();
    let message: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let text = message["text"].as_str().unwrap();
    assert!(text.contains("In Progress"));
}

#[tokio::test]
async fn unsigned_delivery_never_reaches_the_gateway() {
    let harness = Harness::start(&[("alice", "100")], StaticTracker::new()).await;

    let payload = IssueEventBuilder::opened().assignees(["alice"]).build();
    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("X-GitHub-Event", "issues")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = harness.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(harness.service.stats(), ServiceStats::default());
    assert!(harness.sent_chats().await.is_empty());
}

#[tokio::test]
async fn health_reports_pipeline_counters() {
    let harness = Harness::start(&[], StaticTracker::new()).await;
    harness.post("issues", &IssueEventBuilder::opened().build()).await;
    harness.processed(1).await;

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = harness.app.clone().oneshot(request).await.unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let health: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(health["status"], "ok");
    assert_eq!(health["checks"]["dedup_entries"], 1);
    assert_eq!(health["checks"]["stats"]["events_accepted"], 1);
    assert_eq!(health["checks"]["stats"]["events_dropped"], 1);
}
