//! Core domain models and error types.
//!
//! Provides the event envelope, notification intents, delivery records, the
//! error taxonomy and the clock abstraction shared by the pipeline and the
//! HTTP API.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod intent;
pub mod models;
pub mod time;

pub use error::{Result, TaskpulseError};
pub use intent::{
    AssignmentNotice, CommentNotice, IntentKind, NotificationIntent, StatusOption,
    StatusTransition, TaskSnapshot, TaskState,
};
pub use models::{
    ChannelId, DeliveryOutcome, DeliveryResult, EventIdentity, RawEvent, RecipientRef,
    RenderedNotification, Subscriber,
};
pub use time::{Clock, RealClock, TestClock};
