//! Per-event notification pipeline.
//!
//! ```text
//! ┌────────────┐   ┌───────────┐   ┌──────────┐   ┌─────────┐
//! │ Classifier │──▶│ Formatter │──▶│ Resolver │──▶│ Fan-out │
//! └────────────┘   └───────────┘   └──────────┘   └─────────┘
//! ```
//!
//! Runs after an event has passed the dedup gate. Every stage either hands
//! its output to the next or ends processing with a typed drop; nothing in
//! here is reported back to the webhook sender.

use taskpulse_core::{DeliveryResult, EventIdentity, RawEvent, TaskpulseError};
use tracing::{error, info, warn, Instrument};

use crate::{
    classifier::Classifier, fanout::FanOut, format::Formatter, resolver::RecipientResolver,
};

/// How processing of one event ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Processing stopped before any send.
    Dropped(TaskpulseError),
    /// The notification went out to every resolved recipient.
    Delivered {
        /// One result per resolved recipient, in audience order.
        deliveries: Vec<DeliveryResult>,
        /// Identities that had no subscriber.
        unresolved: Vec<DeliveryResult>,
    },
}

/// Result of processing one accepted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Identity the event was accepted under.
    pub identity: EventIdentity,
    /// How processing ended.
    pub outcome: PipelineOutcome,
}

impl PipelineReport {
    /// Returns the drop reason, if processing stopped early.
    pub fn dropped(&self) -> Option<&TaskpulseError> {
        match &self.outcome {
            PipelineOutcome::Dropped(reason) => Some(reason),
            PipelineOutcome::Delivered { .. } => None,
        }
    }

    /// Returns the per-recipient results of the fan-out.
    pub fn deliveries(&self) -> &[DeliveryResult] {
        match &self.outcome {
            PipelineOutcome::Delivered { deliveries, .. } => deliveries,
            PipelineOutcome::Dropped(_) => &[],
        }
    }

    /// Number of recipients that received every message.
    pub fn delivered_count(&self) -> usize {
        self.deliveries().iter().filter(|r| r.outcome.is_delivered()).count()
    }

    /// Number of recipients whose delivery failed.
    pub fn failed_count(&self) -> usize {
        self.deliveries().len() - self.delivered_count()
    }
}

/// Classifies, renders, resolves and delivers accepted events.
#[derive(Debug)]
pub struct NotificationPipeline {
    classifier: Classifier,
    formatter: Formatter,
    resolver: RecipientResolver,
    fanout: FanOut,
}

impl NotificationPipeline {
    /// Assembles a pipeline from its stages.
    pub fn new(
        classifier: Classifier,
        formatter: Formatter,
        resolver: RecipientResolver,
        fanout: FanOut,
    ) -> Self {
        Self { classifier, formatter, resolver, fanout }
    }

    /// Processes one accepted event to completion.
    ///
    /// Never fails: drops and delivery failures are logged and returned in
    /// the report.
    pub async fn process(&self, event: RawEvent, identity: EventIdentity) -> PipelineReport {
        let span = tracing::info_span!(
            "pipeline",
            identity = %identity,
            event_type = %event.source_event_type,
            action = %event.action
        );

        async move {
            let outcome = match self.run(&event).await {
                Ok((deliveries, unresolved)) => {
                    let report = PipelineOutcome::Delivered { deliveries, unresolved };
                    log_delivered(&report);
                    report
                },
                Err(reason) => {
                    log_dropped(&reason);
                    PipelineOutcome::Dropped(reason)
                },
            };

            PipelineReport { identity, outcome }
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        event: &RawEvent,
    ) -> Result<(Vec<DeliveryResult>, Vec<DeliveryResult>), TaskpulseError> {
        let intent = self.classifier.classify(event).await?;

        let audience = intent.audience();
        let resolution = self.resolver.resolve(&audience).await;
        if resolution.is_empty() {
            return Err(TaskpulseError::NoRecipients { audience_size: audience.len() });
        }

        let notification = self.formatter.render(&intent);
        let deliveries = self.fanout.deliver(&notification, &resolution.recipients).await;

        Ok((deliveries, resolution.unresolved))
    }
}

fn log_delivered(outcome: &PipelineOutcome) {
    if let PipelineOutcome::Delivered { deliveries, unresolved } = outcome {
        let delivered = deliveries.iter().filter(|r| r.outcome.is_delivered()).count();
        info!(
            delivered,
            failed = deliveries.len() - delivered,
            unresolved = unresolved.len(),
            "event processed"
        );
    }
}

fn log_dropped(reason: &TaskpulseError) {
    match reason {
        e if e.is_expected_drop() => info!(code = e.code(), reason = %e, "event dropped"),
        e @ TaskpulseError::DetailFetchFailure { .. } => {
            warn!(code = e.code(), reason = %e, "event dropped");
        },
        e => error!(code = e.code(), reason = %e, "event processing failed"),
    }
}
