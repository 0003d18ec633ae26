//! Dedup gate with a bounded TTL window.
//!
//! Remembers each accepted event identity until its window expires. A second
//! event with the same identity inside the window is a duplicate. Expired
//! entries are swept lazily on every check, so the table only ever holds
//! identities seen during the last window.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use taskpulse_core::{Clock, EventIdentity, TaskpulseError};
use tracing::debug;

/// Default dedup window.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(5);

/// Result of passing an identity through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// First sighting within the window; the event proceeds.
    Accepted,
    /// Seen within the window; the event is dropped.
    Duplicate,
}

/// Expiring identity store used at ingestion.
#[derive(Debug)]
pub struct DedupGate {
    clock: Arc<dyn Clock>,
    window: Duration,
    seen: Mutex<HashMap<EventIdentity, Instant>>,
}

impl DedupGate {
    /// Creates a gate with the given window.
    pub fn new(clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self { clock, window, seen: Mutex::new(HashMap::new()) }
    }

    /// Returns the configured window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Checks an identity and records it when it is new.
    ///
    /// Check and insert happen in one critical section, so two concurrent
    /// deliveries of the same identity can never both be accepted.
    ///
    /// # Errors
    ///
    /// Returns `InternalFailure` if the table lock was poisoned by a panic in
    /// another request.
    pub fn check_and_record(
        &self,
        identity: &EventIdentity,
    ) -> Result<GateDecision, TaskpulseError> {
        let now = self.clock.now();
        let mut seen = self
            .seen
            .lock()
            .map_err(|_| TaskpulseError::internal("dedup table lock poisoned"))?;

        let before = seen.len();
        seen.retain(|_, expires_at| *expires_at > now);
        let swept = before - seen.len();
        if swept > 0 {
            debug!(swept, remaining = seen.len(), "swept expired dedup entries");
        }

        if seen.contains_key(identity) {
            return Ok(GateDecision::Duplicate);
        }

        seen.insert(identity.clone(), now + self.window);
        Ok(GateDecision::Accepted)
    }

    /// Returns the number of identities currently remembered.
    ///
    /// Includes entries that expired but have not been swept yet.
    pub fn len(&self) -> usize {
        self.seen.lock().map(|seen| seen.len()).unwrap_or(0)
    }

    /// Returns whether no identities are remembered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
