//! taskpulse HTTP API.
//!
//! Receives task-tracker webhooks, hands them to the notification service
//! and exposes the recent-events and health endpoints.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use axum::http::HeaderName;
use taskpulse_core::Clock;
use taskpulse_pipeline::NotificationService;

pub mod config;
pub mod crypto;
pub mod handlers;
pub mod server;

pub use config::Config;
pub use server::{create_router, shutdown_signal, start_server};

/// How webhook requests are authenticated and typed.
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    /// Header carrying the event type.
    pub event_header: HeaderName,
    /// Shared secret for signature verification, if required.
    pub secret: Option<String>,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self { event_header: HeaderName::from_static("x-github-event"), secret: None }
    }
}

/// Shared state for request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Ingestion service
    pub service: Arc<NotificationService>,
    /// Webhook request settings
    pub webhook: WebhookSettings,
    /// Clock for timestamps
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Creates application state.
    pub fn new(
        service: Arc<NotificationService>,
        webhook: WebhookSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { service, webhook, clock }
    }
}
