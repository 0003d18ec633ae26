//! Webhook ingestion handler.
//!
//! Verifies the signature when a secret is configured, reads the event type
//! from the configured header, parses the body and passes the event through
//! the dedup gate. Everything after the gate runs in the background; the
//! sender only ever learns whether the event was accepted or a duplicate.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskpulse_core::TaskpulseError;
use taskpulse_pipeline::Submission;
use tracing::{debug, error, instrument, warn};

use super::create_error_response;
use crate::{
    crypto::{verify_signature, SIGNATURE_HEADER},
    AppState,
};

/// Gate outcome reported to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookStatus {
    /// Event accepted for processing.
    Accepted,
    /// Event seen within the dedup window and dropped.
    Duplicate,
}

/// Response to a webhook delivery.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookResponse {
    /// Gate outcome.
    pub status: WebhookStatus,
    /// Dedup identity of the event.
    pub identity: String,
}

/// Receives a webhook delivery.
///
/// # Errors
///
/// Returns appropriate HTTP status codes:
/// - 400: Bad signature, missing event header or malformed body
/// - 500: Dedup gate unusable
#[instrument(
    name = "receive_webhook",
    skip(state, headers, body),
    fields(
        event_type = tracing::field::Empty,
        content_length = body.len(),
    )
)]
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match ingest(&state, &headers, &body) {
        Ok(submission) => {
            let status = match &submission {
                Submission::Accepted { .. } => WebhookStatus::Accepted,
                Submission::Duplicate { .. } => WebhookStatus::Duplicate,
            };
            let identity = submission.identity().0.clone();
            debug!(identity = %identity, ?status, "webhook handled");

            (StatusCode::OK, Json(WebhookResponse { status, identity })).into_response()
        },
        Err(e) if e.is_client_error() => {
            warn!(code = e.code(), error = %e, "webhook rejected");
            create_error_response(&e)
        },
        Err(e) => {
            error!(code = e.code(), error = %e, "webhook ingestion failed");
            create_error_response(&e)
        },
    }
}

fn ingest(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Submission, TaskpulseError> {
    if let Some(secret) = state.webhook.secret.as_deref() {
        let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        verify_signature(body, signature, secret)
            .map_err(|e| TaskpulseError::InvalidSignature { reason: e.to_string() })?;
    }

    let event_type = headers
        .get(&state.webhook.event_header)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            TaskpulseError::malformed(format!("missing {} header", state.webhook.event_header))
        })?;
    tracing::Span::current().record("event_type", event_type);

    let payload: Value = serde_json::from_slice(body)
        .map_err(|e| TaskpulseError::malformed(format!("invalid JSON body: {e}")))?;

    state.service.submit(event_type, payload)
}
