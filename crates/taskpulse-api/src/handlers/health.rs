//! Health check handler.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskpulse_pipeline::ServiceStats;
use tracing::{debug, instrument};

use crate::AppState;

/// Health check response structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests
    pub status: String,
    /// Timestamp when health check was performed
    pub timestamp: DateTime<Utc>,
    /// Service version information
    pub version: String,
    /// Ingestion component figures
    pub checks: HealthChecks,
}

/// Ingestion component figures.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthChecks {
    /// Identities currently held by the dedup gate
    pub dedup_entries: usize,
    /// Dedup window in milliseconds
    pub dedup_window_ms: u64,
    /// Events in the recent-events buffer
    pub buffered_events: usize,
    /// Counters since startup
    pub stats: ServiceStats,
}

/// Health check endpoint handler.
///
/// Reads in-memory figures only, so it is cheap enough for frequent probes.
#[instrument(name = "health_check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let service = &state.service;

    let checks = HealthChecks {
        dedup_entries: service.dedup_entries(),
        dedup_window_ms: u64::try_from(service.dedup_window().as_millis()).unwrap_or(u64::MAX),
        buffered_events: service.buffered_events(),
        stats: service.stats(),
    };

    debug!(
        dedup_entries = checks.dedup_entries,
        buffered_events = checks.buffered_events,
        "Health check completed"
    );

    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: state.clock.now_utc(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks,
    })
}
