//! In-memory doubles for the pipeline's external collaborators.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use taskpulse_core::{ChannelId, Subscriber, TaskState};
use taskpulse_pipeline::{
    GatewayError, InMemoryDirectory, Markup, MediaItem, MessagingGateway, TaskDetail,
    TaskTracker, TrackerError,
};

/// Failure a [`RecordingGateway`] injects for a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Gateway refuses the message (HTTP 400, chat not found).
    Rejected,
    /// Connection fails before a response.
    Network,
    /// Request times out.
    Timeout,
    /// Delivery task panics.
    Panic,
    /// Only the N-th call (zero-based) for the channel is rejected.
    RejectNth(usize),
}

impl FailureKind {
    fn error(&self) -> GatewayError {
        match self {
            Self::Rejected | Self::RejectNth(_) => {
                GatewayError::rejected(400, "Bad Request: chat not found")
            },
            Self::Network => GatewayError::network("connection reset by peer"),
            Self::Timeout => GatewayError::Timeout,
            Self::Panic => unreachable!("panic failures never produce an error"),
        }
    }
}

/// A call recorded by [`RecordingGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentMessage {
    /// `send_text`.
    Text {
        /// Target channel.
        channel: ChannelId,
        /// Message text.
        text: String,
        /// Parse mode.
        markup: Markup,
    },
    /// `send_media_group`.
    MediaGroup {
        /// Target channel.
        channel: ChannelId,
        /// Album items.
        items: Vec<MediaItem>,
    },
}

impl SentMessage {
    /// Returns the target channel.
    pub fn channel(&self) -> &ChannelId {
        match self {
            Self::Text { channel, .. } | Self::MediaGroup { channel, .. } => channel,
        }
    }
}

/// Messaging gateway that records every call.
///
/// Calls to a channel configured with a failure are still recorded, then
/// fail.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<SentMessage>>,
    failures: Mutex<HashMap<ChannelId, FailureKind>>,
    delays: Mutex<HashMap<ChannelId, Duration>>,
}

impl RecordingGateway {
    /// Creates a gateway that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call to `channel` fail with `failure`.
    pub fn fail_channel(&self, channel: impl Into<String>, failure: FailureKind) {
        self.failures.lock().unwrap().insert(ChannelId::new(channel), failure);
    }

    /// Delays every call to `channel`.
    pub fn delay_channel(&self, channel: impl Into<String>, delay: Duration) {
        self.delays.lock().unwrap().insert(ChannelId::new(channel), delay);
    }

    /// Returns every recorded call, in call order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Returns the calls made to one channel, in call order.
    pub fn sent_to(&self, channel: &str) -> Vec<SentMessage> {
        self.sent().into_iter().filter(|message| message.channel().as_str() == channel).collect()
    }

    /// Returns the texts sent to one channel, in call order.
    pub fn texts_to(&self, channel: &str) -> Vec<String> {
        self.sent_to(channel)
            .into_iter()
            .filter_map(|message| match message {
                SentMessage::Text { text, .. } => Some(text),
                SentMessage::MediaGroup { .. } => None,
            })
            .collect()
    }

    /// Returns the number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    async fn record(&self, message: SentMessage) -> Result<(), GatewayError> {
        let channel = message.channel().clone();

        let delay = self.delays.lock().unwrap().get(&channel).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let index = {
            let mut sent = self.sent.lock().unwrap();
            let index = sent.iter().filter(|m| m.channel() == &channel).count();
            sent.push(message);
            index
        };

        let failure = self.failures.lock().unwrap().get(&channel).cloned();
        match failure {
            None => Ok(()),
            Some(FailureKind::Panic) => panic!("injected gateway panic for {channel}"),
            Some(FailureKind::RejectNth(n)) if n != index => Ok(()),
            Some(failure) => Err(failure.error()),
        }
    }
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    async fn send_text(
        &self,
        channel: &ChannelId,
        text: &str,
        markup: Markup,
    ) -> Result<(), GatewayError> {
        self.record(SentMessage::Text { channel: channel.clone(), text: text.to_string(), markup })
            .await
    }

    async fn send_media_group(
        &self,
        channel: &ChannelId,
        items: &[MediaItem],
    ) -> Result<(), GatewayError> {
        self.record(SentMessage::MediaGroup { channel: channel.clone(), items: items.to_vec() })
            .await
    }
}

/// Task tracker answering from a fixed table.
#[derive(Debug, Default)]
pub struct StaticTracker {
    tasks: Mutex<HashMap<String, TaskDetail>>,
    failure: Mutex<Option<TrackerError>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl StaticTracker {
    /// Creates a tracker that knows no tasks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task.
    pub fn insert(&self, task_id: impl Into<String>, detail: TaskDetail) {
        self.tasks.lock().unwrap().insert(task_id.into(), detail);
    }

    /// Makes every lookup fail with `error`.
    pub fn fail_with(&self, error: TrackerError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    /// Returns the `(credential, task_id)` pairs looked up so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskTracker for StaticTracker {
    async fn task_detail(
        &self,
        credential: &str,
        task_id: &str,
    ) -> Result<TaskDetail, TrackerError> {
        self.calls.lock().unwrap().push((credential.to_string(), task_id.to_string()));

        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }

        self.tasks
            .lock()
            .unwrap()
            .get(task_id)
            .cloned()
            .ok_or_else(|| TrackerError::not_found(task_id))
    }
}

/// Builds task detail with default title, URL and timestamp.
pub fn task_detail<'a>(assignees: impl IntoIterator<Item = &'a str>) -> TaskDetail {
    TaskDetail {
        title: crate::fixtures::DEFAULT_TASK_TITLE.to_string(),
        url: crate::fixtures::DEFAULT_TASK_URL.to_string(),
        updated_at: "2024-03-02T08:00:00Z".parse().ok(),
        state: TaskState::Open,
        assignees: assignees.into_iter().map(str::to_string).collect(),
    }
}

/// Builds a subscriber record.
pub fn subscriber(identity: &str, channel: &str) -> Subscriber {
    Subscriber { external_identity: identity.to_string(), channel_id: ChannelId::new(channel) }
}

/// Builds a directory from `(identity, channel)` pairs.
pub fn directory(entries: &[(&str, &str)]) -> Arc<InMemoryDirectory> {
    Arc::new(InMemoryDirectory::from_subscribers(
        entries.iter().map(|(identity, channel)| subscriber(identity, channel)),
    ))
}
