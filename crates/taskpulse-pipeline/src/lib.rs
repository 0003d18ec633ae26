//! Webhook-to-chat notification pipeline.
//!
//! Turns task-tracker webhook deliveries into chat notifications for the
//! people they concern.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐   ┌────────────┐   ┌────────────┐   ┌───────────┐
//! │ Dedup     │──▶│ Classifier │──▶│ Resolver   │──▶│ Fan-out   │
//! │ gate      │   │ (+tracker) │   │ (directory)│   │ (gateway) │
//! └───────────┘   └────────────┘   └────────────┘   └───────────┘
//! ```
//!
//! [`NotificationService`] runs the gate synchronously and spawns the rest.
//! Each accepted event is classified into a [`NotificationIntent`], rendered
//! to MarkdownV2 by the [`Formatter`], resolved to subscriber channels and
//! sent to every recipient concurrently. A failure for one recipient never
//! affects another.
//!
//! External services sit behind traits ([`TaskTracker`],
//! [`SubscriberDirectory`], [`MessagingGateway`]) so tests can substitute
//! doubles.
//!
//! [`NotificationIntent`]: taskpulse_core::NotificationIntent

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chunk;
pub mod classifier;
pub mod dedup;
pub mod directory;
pub mod envelope;
pub mod error;
pub mod fanout;
pub mod format;
pub mod gateway;
pub mod pipeline;
pub mod recent;
pub mod resolver;
pub mod service;
pub mod tracker;

pub use chunk::{chunk_text, MessageLimits, CAPTION_LIMIT, TEXT_LIMIT};
pub use classifier::{Classifier, EventKind};
pub use dedup::{DedupGate, GateDecision, DEFAULT_DEDUP_WINDOW};
pub use directory::{InMemoryDirectory, SubscriberDirectory};
pub use envelope::derive_identity;
pub use error::{DirectoryError, GatewayError, TrackerError};
pub use fanout::{plan_messages, FanOut, OutboundMessage};
pub use format::{escape_markdown_v2, Formatter};
pub use gateway::{Markup, MediaItem, MessagingGateway, TelegramGateway};
pub use pipeline::{NotificationPipeline, PipelineOutcome, PipelineReport};
pub use recent::{RecentEvents, DEFAULT_RECENT_CAPACITY};
pub use resolver::{RecipientResolver, Resolution};
pub use service::{
    NotificationService, ServiceSettings, ServiceStats, Submission, PIPELINE_PANICKED,
};
pub use tracker::{GithubTracker, TaskDetail, TaskTracker};

/// Default timeout for calls to external services.
pub const DEFAULT_HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
