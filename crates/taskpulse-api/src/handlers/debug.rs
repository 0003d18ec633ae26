//! Recently accepted events.

use axum::{extract::State, Json};
use taskpulse_core::RawEvent;
use tracing::{debug, instrument};

use crate::AppState;

/// Returns the last accepted events, oldest first.
#[instrument(name = "recent_events", skip(state))]
pub async fn recent_events(State(state): State<AppState>) -> Json<Vec<RawEvent>> {
    let events = state.service.recent_events();
    debug!(count = events.len(), "serving recent events");
    Json(events)
}
