//! Test infrastructure for deterministic pipeline tests.
//!
//! Provides webhook payload builders, recording doubles for the messaging
//! gateway and task tracker, and a [`TestEnv`] that wires a complete
//! notification service over them with a controllable clock.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod doubles;
pub mod env;
pub mod fixtures;

pub use doubles::{
    directory, subscriber, task_detail, FailureKind, RecordingGateway, SentMessage, StaticTracker,
};
pub use env::{TestEnv, TestEnvBuilder, TEST_TRACKER_TOKEN};
pub use fixtures::{
    status_json, CommentEventBuilder, IssueEventBuilder, ProjectItemEventBuilder,
    DEFAULT_TASK_TITLE, DEFAULT_TASK_URL,
};
pub use taskpulse_core::TestClock;
