//! Error types for the pipeline's external collaborators.
//!
//! Each collaborator (messaging gateway, tracking service, subscriber
//! directory) has its own error enum. None of them propagate past the
//! pipeline: they are mapped into [`TaskpulseError`] codes and logged.

use taskpulse_core::TaskpulseError;
use thiserror::Error;

/// Failure sending a message through the messaging gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Connection-level failure before a response was received.
    #[error("network failure: {message}")]
    Network {
        /// Underlying transport error
        message: String,
    },

    /// Request did not complete within the client timeout.
    #[error("request timed out")]
    Timeout,

    /// Gateway answered but refused the message.
    #[error("rejected with HTTP {status}: {description}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Description returned by the gateway
        description: String,
    },

    /// Gateway response could not be interpreted.
    #[error("invalid response: {message}")]
    InvalidResponse {
        /// What was wrong with the response
        message: String,
    },

    /// Client could not be constructed.
    #[error("configuration error: {message}")]
    Configuration {
        /// Configuration problem
        message: String,
    },
}

impl GatewayError {
    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Creates a rejection error from an HTTP response.
    pub fn rejected(status: u16, description: impl Into<String>) -> Self {
        Self::Rejected { status, description: description.into() }
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse { message: message.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Converts into the taskpulse error for the given recipient.
    pub fn into_delivery_failure(self, identity: impl Into<String>) -> TaskpulseError {
        TaskpulseError::DeliveryFailed { identity: identity.into(), reason: self.to_string() }
    }
}

/// Failure fetching task details from the tracking service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    /// Connection-level failure before a response was received.
    #[error("network failure: {message}")]
    Network {
        /// Underlying transport error
        message: String,
    },

    /// Tracking service answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// Query was executed but reported errors.
    #[error("query failed: {message}")]
    Query {
        /// First error message returned by the service
        message: String,
    },

    /// No task exists for the id, or the credential cannot see it.
    #[error("task {task_id} not found")]
    NotFound {
        /// Requested task id
        task_id: String,
    },

    /// Response could not be decoded.
    #[error("invalid response: {message}")]
    InvalidResponse {
        /// Decode failure
        message: String,
    },

    /// Client could not be constructed.
    #[error("configuration error: {message}")]
    Configuration {
        /// Configuration problem
        message: String,
    },
}

impl TrackerError {
    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Creates an HTTP status error.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http { status, body: body.into() }
    }

    /// Creates a not found error.
    pub fn not_found(task_id: impl Into<String>) -> Self {
        Self::NotFound { task_id: task_id.into() }
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse { message: message.into() }
    }
}

impl From<TrackerError> for TaskpulseError {
    fn from(error: TrackerError) -> Self {
        Self::DetailFetchFailure { reason: error.to_string() }
    }
}

/// Failure looking up or loading subscriber records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// Backing store is not reachable.
    #[error("directory unavailable: {message}")]
    Unavailable {
        /// Why the lookup could not be served
        message: String,
    },

    /// Seed data could not be read or parsed.
    #[error("invalid subscriber seed {source_name}: {message}")]
    InvalidSeed {
        /// File or source the seed came from
        source_name: String,
        /// Parse or read failure
        message: String,
    },
}

impl DirectoryError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable { message: message.into() }
    }

    /// Creates an invalid seed error.
    pub fn invalid_seed(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSeed { source_name: source_name.into(), message: message.into() }
    }
}

/// Truncates a response body for inclusion in an error message.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX_ERROR_BODY_CHARS: usize = 512;

    if body.chars().count() > MAX_ERROR_BODY_CHARS {
        let truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{truncated}... (truncated)")
    } else {
        body.to_string()
    }
}
