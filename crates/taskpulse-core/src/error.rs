//! Error taxonomy for the notification pipeline.
//!
//! Every failure the service can observe maps to one variant with a stable
//! code. Codes in the E1xxx range are decided at ingestion, E2xxx during
//! notification processing and E3xxx are internal faults. Only E1001, E1002
//! and E3001 are ever surfaced to the HTTP caller; everything else is a local,
//! logged drop.

use thiserror::Error;

/// Result type alias using `TaskpulseError`.
pub type Result<T> = std::result::Result<T, TaskpulseError>;

/// Taskpulse error types with stable codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskpulseError {
    // Ingestion (E1001-E1004)
    /// Request body or headers could not be interpreted (E1001).
    #[error("[E1001] Malformed input: {reason}")]
    MalformedInput {
        /// What was wrong with the request
        reason: String,
    },

    /// Webhook signature did not match the configured secret (E1002).
    #[error("[E1002] Invalid signature: {reason}")]
    InvalidSignature {
        /// Why the signature was rejected
        reason: String,
    },

    /// Event identity already seen inside the dedup window (E1003).
    #[error("[E1003] Duplicate event: {identity} seen within the dedup window")]
    DuplicateEvent {
        /// Identity of the dropped event
        identity: String,
    },

    /// Event type/action pair has no notification mapping (E1004).
    #[error("[E1004] Unclassifiable event: {source_event_type}/{action}")]
    UnclassifiableEvent {
        /// Event type from the delivery header
        source_event_type: String,
        /// Action field from the payload
        action: String,
    },

    // Processing (E2001-E2004)
    /// Task detail lookup against the tracking service failed (E2001).
    #[error("[E2001] Task detail fetch failed: {reason}")]
    DetailFetchFailure {
        /// Underlying tracker error
        reason: String,
    },

    /// External identity has no subscriber record (E2002).
    #[error("[E2002] Recipient unresolved: {identity}")]
    RecipientUnresolved {
        /// External identity that could not be resolved
        identity: String,
    },

    /// Messaging gateway rejected or failed a send (E2003).
    #[error("[E2003] Delivery failed for {identity}: {reason}")]
    DeliveryFailed {
        /// External identity of the recipient
        identity: String,
        /// Gateway failure description
        reason: String,
    },

    /// No subscriber could be resolved for an event (E2004).
    #[error("[E2004] No recipients: none of {audience_size} identities resolved")]
    NoRecipients {
        /// Number of identities the intent named
        audience_size: usize,
    },

    // System (E3001)
    /// Unexpected internal failure (E3001).
    #[error("[E3001] Internal failure: {reason}")]
    InternalFailure {
        /// Description of the fault
        reason: String,
    },
}

impl TaskpulseError {
    /// Creates a malformed input error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedInput { reason: reason.into() }
    }

    /// Creates an internal failure error.
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::InternalFailure { reason: reason.into() }
    }

    /// Returns the error code (E1001-E3001).
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MalformedInput { .. } => "E1001",
            Self::InvalidSignature { .. } => "E1002",
            Self::DuplicateEvent { .. } => "E1003",
            Self::UnclassifiableEvent { .. } => "E1004",
            Self::DetailFetchFailure { .. } => "E2001",
            Self::RecipientUnresolved { .. } => "E2002",
            Self::DeliveryFailed { .. } => "E2003",
            Self::NoRecipients { .. } => "E2004",
            Self::InternalFailure { .. } => "E3001",
        }
    }

    /// Returns whether the sender of the webhook is at fault.
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::MalformedInput { .. } | Self::InvalidSignature { .. })
    }

    /// Returns whether this is an expected drop rather than a fault.
    ///
    /// Expected drops are logged at info level and never reach the caller.
    pub const fn is_expected_drop(&self) -> bool {
        matches!(
            self,
            Self::DuplicateEvent { .. }
                | Self::UnclassifiableEvent { .. }
                | Self::RecipientUnresolved { .. }
                | Self::NoRecipients { .. }
        )
    }
}
