//! Fully wired notification service over in-memory doubles.

use std::{sync::Arc, time::Duration};

use serde_json::Value;
use taskpulse_core::{Subscriber, TaskpulseError, TestClock};
use taskpulse_pipeline::{
    Classifier, FanOut, Formatter, InMemoryDirectory, MessageLimits, NotificationPipeline,
    NotificationService, PipelineReport, RecipientResolver, ServiceSettings, Submission,
    TaskDetail,
};

use crate::doubles::{subscriber, RecordingGateway, StaticTracker};

/// Credential the test classifier passes to the tracker.
pub const TEST_TRACKER_TOKEN: &str = "test-tracker-token";

/// Test environment with controllable time and recording collaborators.
pub struct TestEnv {
    /// Clock shared with the dedup gate.
    pub clock: TestClock,
    /// Gateway recording every send.
    pub gateway: Arc<RecordingGateway>,
    /// Tracker answering status-change lookups.
    pub tracker: Arc<StaticTracker>,
    /// Subscriber directory.
    pub directory: Arc<InMemoryDirectory>,
    /// Service under test.
    pub service: Arc<NotificationService>,
}

impl TestEnv {
    /// Starts building an environment.
    pub fn builder() -> TestEnvBuilder {
        TestEnvBuilder::default()
    }

    /// Submits a delivery.
    pub fn submit(&self, event_type: &str, payload: Value) -> Result<Submission, TaskpulseError> {
        self.service.submit(event_type, payload)
    }

    /// Submits a delivery and waits for its processing to finish.
    ///
    /// Returns `None` for duplicates.
    pub async fn submit_and_wait(
        &self,
        event_type: &str,
        payload: Value,
    ) -> Result<Option<PipelineReport>, TaskpulseError> {
        match self.submit(event_type, payload)? {
            Submission::Accepted { handle, .. } => {
                let report = handle
                    .await
                    .map_err(|e| TaskpulseError::internal(format!("pipeline task failed: {e}")))?;
                Ok(Some(report))
            },
            Submission::Duplicate { .. } => Ok(None),
        }
    }

    /// Advances the test clock.
    pub fn advance(&self, duration: Duration) {
        self.clock.advance(duration);
    }
}

/// Builder for [`TestEnv`].
#[derive(Debug, Default)]
pub struct TestEnvBuilder {
    subscribers: Vec<Subscriber>,
    tasks: Vec<(String, TaskDetail)>,
    limits: Option<MessageLimits>,
    settings: Option<ServiceSettings>,
    formatter: Option<Formatter>,
}

impl TestEnvBuilder {
    /// Registers a subscriber.
    #[must_use]
    pub fn subscriber(mut self, identity: &str, channel: &str) -> Self {
        self.subscribers.push(subscriber(identity, channel));
        self
    }

    /// Registers a task the tracker can return.
    #[must_use]
    pub fn task(mut self, task_id: impl Into<String>, detail: TaskDetail) -> Self {
        self.tasks.push((task_id.into(), detail));
        self
    }

    /// Overrides the gateway message limits.
    #[must_use]
    pub fn limits(mut self, limits: MessageLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Overrides the dedup window.
    #[must_use]
    pub fn dedup_window(mut self, window: Duration) -> Self {
        let settings = self.settings.get_or_insert_with(ServiceSettings::default);
        settings.dedup_window = window;
        self
    }

    /// Overrides the recent-events capacity.
    #[must_use]
    pub fn recent_capacity(mut self, capacity: usize) -> Self {
        let settings = self.settings.get_or_insert_with(ServiceSettings::default);
        settings.recent_capacity = capacity;
        self
    }

    /// Overrides the formatter.
    #[must_use]
    pub fn formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Wires the environment.
    pub fn build(self) -> TestEnv {
        let clock = TestClock::new();
        let gateway = Arc::new(RecordingGateway::new());
        let tracker = Arc::new(StaticTracker::new());
        for (task_id, detail) in self.tasks {
            tracker.insert(task_id, detail);
        }
        let directory = Arc::new(InMemoryDirectory::from_subscribers(self.subscribers));

        let pipeline = NotificationPipeline::new(
            Classifier::new(tracker.clone(), TEST_TRACKER_TOKEN),
            self.formatter.unwrap_or_default(),
            RecipientResolver::new(directory.clone()),
            FanOut::new(gateway.clone(), self.limits.unwrap_or_default()),
        );

        let service = Arc::new(NotificationService::new(
            pipeline,
            Arc::new(clock.clone()),
            self.settings.unwrap_or_default(),
        ));

        TestEnv { clock, gateway, tracker, directory, service }
    }
}
