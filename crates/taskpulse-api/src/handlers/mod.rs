//! HTTP request handlers for the taskpulse API.
//!
//! Handlers are grouped by functionality:
//! - `webhook` - Webhook ingestion
//! - `debug` - Recently accepted events
//! - `health` - Liveness and component figures
//!
//! # Error Handling
//!
//! Failures return `{ "error": { "code", "message" } }` with the code from
//! the error taxonomy. Sender faults are 400, internal faults 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use taskpulse_core::TaskpulseError;

pub mod debug;
pub mod health;
pub mod webhook;

pub use debug::recent_events;
pub use health::health_check;
pub use webhook::receive_webhook;

/// Error response with code and message.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error details including code and message
    pub error: ErrorDetail,
}

/// Detailed error information.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Error code from the taxonomy (E1001-E3001)
    pub code: String,
    /// Human-readable error description
    pub message: String,
}

/// Maps an error to its HTTP status.
pub fn status_for(error: &TaskpulseError) -> StatusCode {
    if error.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

pub(crate) fn create_error_response(error: &TaskpulseError) -> Response {
    let error_response = ErrorResponse {
        error: ErrorDetail { code: error.code().to_string(), message: error.to_string() },
    };

    (status_for(error), Json(error_response)).into_response()
}
