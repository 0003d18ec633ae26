//! Ingestion entry point.
//!
//! [`NotificationService::submit`] is the synchronous half of webhook
//! handling: it builds the envelope, derives the identity, passes the dedup
//! gate and records the event, then hands processing to a background task
//! so the caller can acknowledge the delivery immediately.

use std::{
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskpulse_core::{Clock, EventIdentity, RawEvent, TaskpulseError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::{
    dedup::{DedupGate, GateDecision, DEFAULT_DEDUP_WINDOW},
    envelope::derive_identity,
    pipeline::{NotificationPipeline, PipelineOutcome, PipelineReport},
    recent::{RecentEvents, DEFAULT_RECENT_CAPACITY},
};

/// Reason recorded when processing an event panics.
pub const PIPELINE_PANICKED: &str = "pipeline task panicked";

/// Ingestion settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    /// How long an identity is remembered by the dedup gate.
    pub dedup_window: Duration,
    /// Number of accepted events kept for inspection.
    pub recent_capacity: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self { dedup_window: DEFAULT_DEDUP_WINDOW, recent_capacity: DEFAULT_RECENT_CAPACITY }
    }
}

/// What happened to a submitted event.
#[derive(Debug)]
pub enum Submission {
    /// The event passed the gate and is being processed.
    Accepted {
        /// Identity the event was recorded under.
        identity: EventIdentity,
        /// Background processing task.
        handle: JoinHandle<PipelineReport>,
    },
    /// The identity was seen inside the dedup window; nothing was done.
    Duplicate {
        /// Identity of the dropped event.
        identity: EventIdentity,
    },
}

impl Submission {
    /// Returns the identity the event was checked under.
    pub fn identity(&self) -> &EventIdentity {
        match self {
            Self::Accepted { identity, .. } | Self::Duplicate { identity } => identity,
        }
    }

    /// Returns whether the event was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Counters since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Events that passed the dedup gate.
    pub events_accepted: u64,
    /// Events dropped as duplicates.
    pub events_duplicate: u64,
    /// Accepted events whose processing finished.
    pub events_processed: u64,
    /// Processed events that ended without any send.
    pub events_dropped: u64,
    /// Recipients that received a notification.
    pub deliveries_succeeded: u64,
    /// Recipients whose delivery failed.
    pub deliveries_failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    duplicate: AtomicU64,
    processed: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn record(&self, report: &PipelineReport) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        if report.dropped().is_some() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.delivered.fetch_add(report.delivered_count() as u64, Ordering::Relaxed);
        self.failed.fetch_add(report.failed_count() as u64, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ServiceStats {
        ServiceStats {
            events_accepted: self.accepted.load(Ordering::Relaxed),
            events_duplicate: self.duplicate.load(Ordering::Relaxed),
            events_processed: self.processed.load(Ordering::Relaxed),
            events_dropped: self.dropped.load(Ordering::Relaxed),
            deliveries_succeeded: self.delivered.load(Ordering::Relaxed),
            deliveries_failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Webhook ingestion and dispatch.
#[derive(Debug)]
pub struct NotificationService {
    clock: Arc<dyn Clock>,
    gate: DedupGate,
    recent: RecentEvents,
    pipeline: Arc<NotificationPipeline>,
    counters: Arc<Counters>,
}

impl NotificationService {
    /// Creates a service around a pipeline.
    pub fn new(
        pipeline: NotificationPipeline,
        clock: Arc<dyn Clock>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            gate: DedupGate::new(Arc::clone(&clock), settings.dedup_window),
            recent: RecentEvents::new(settings.recent_capacity),
            clock,
            pipeline: Arc::new(pipeline),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Submits a webhook delivery.
    ///
    /// Must be called from within a Tokio runtime; accepted events are
    /// processed on a spawned task.
    ///
    /// # Errors
    ///
    /// - `MalformedInput` when the event type is blank or the payload is not a
    ///   JSON object
    /// - `InternalFailure` when the dedup gate is unusable
    pub fn submit(&self, event_type: &str, payload: Value) -> Result<Submission, TaskpulseError> {
        let event_type = event_type.trim();
        if event_type.is_empty() {
            return Err(TaskpulseError::malformed("missing event type"));
        }
        if !payload.is_object() {
            return Err(TaskpulseError::malformed("payload must be a JSON object"));
        }

        let event = RawEvent::new(event_type, payload, self.clock.now_utc());
        let identity = derive_identity(&event);

        if self.gate.check_and_record(&identity)? == GateDecision::Duplicate {
            self.counters.duplicate.fetch_add(1, Ordering::Relaxed);
            info!(identity = %identity, code = "E1003", "duplicate event dropped");
            return Ok(Submission::Duplicate { identity });
        }

        self.counters.accepted.fetch_add(1, Ordering::Relaxed);
        self.recent.push(event.clone());
        debug!(identity = %identity, event_type, action = %event.action, "event accepted");

        let pipeline = Arc::clone(&self.pipeline);
        let counters = Arc::clone(&self.counters);
        let task_identity = identity.clone();
        let handle = tokio::spawn(async move {
            let processing = AssertUnwindSafe(pipeline.process(event, task_identity.clone()));
            let report = processing.catch_unwind().await.unwrap_or_else(|_| {
                let failure = TaskpulseError::internal(PIPELINE_PANICKED);
                error!(identity = %task_identity, code = failure.code(), "{PIPELINE_PANICKED}");
                let outcome = PipelineOutcome::Dropped(failure);
                PipelineReport { identity: task_identity, outcome }
            });
            counters.record(&report);
            report
        });

        Ok(Submission::Accepted { identity, handle })
    }

    /// Returns the recently accepted events, oldest first.
    pub fn recent_events(&self) -> Vec<RawEvent> {
        self.recent.snapshot()
    }

    /// Returns the number of events in the recent-events buffer.
    pub fn buffered_events(&self) -> usize {
        self.recent.len()
    }

    /// Returns the number of identities currently held by the dedup gate.
    pub fn dedup_entries(&self) -> usize {
        self.gate.len()
    }

    /// Returns the dedup window.
    pub fn dedup_window(&self) -> Duration {
        self.gate.window()
    }

    /// Returns the counters since startup.
    pub fn stats(&self) -> ServiceStats {
        self.counters.snapshot()
    }
}
