//! Event envelope, recipient and delivery models.
//!
//! Defines the raw webhook envelope, the derived dedup identity, rendered
//! notifications and per-recipient delivery results, plus newtype wrappers
//! that keep external identities and channel identifiers from being mixed.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Webhook event as received from the tracking service.
///
/// Immutable once ingested. The action is lifted out of the payload at
/// construction so classification never has to look it up again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Event type from the delivery header (e.g. `issues`).
    pub source_event_type: String,
    /// `action` field of the payload, empty when absent.
    pub action: String,
    /// Full JSON payload.
    pub payload: Value,
    /// When the service received the event.
    pub received_at: DateTime<Utc>,
}

impl RawEvent {
    /// Creates an envelope, reading the action from `payload.action`.
    pub fn new(
        source_event_type: impl Into<String>,
        payload: Value,
        received_at: DateTime<Utc>,
    ) -> Self {
        let action = payload.get("action").and_then(Value::as_str).unwrap_or_default().to_string();

        Self { source_event_type: source_event_type.into(), action, payload, received_at }
    }
}

/// Dedup key for an event.
///
/// Stable for semantically identical deliveries of the same underlying
/// change; never persisted beyond the dedup window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventIdentity(pub String);

impl fmt::Display for EventIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EventIdentity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Opaque destination identifier of a subscriber's messaging channel.
///
/// For Telegram this is the chat id, kept as text so channel usernames
/// (`@name`) work as well as numeric ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl ChannelId {
    /// Creates a channel id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for ChannelId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

/// Subscriber record held by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    /// Username on the tracking service.
    pub external_identity: String,
    /// Messaging channel that receives this subscriber's notifications.
    pub channel_id: ChannelId,
}

/// Rendered notification ready for delivery.
///
/// `text` is already escaped for the target markup; `media` holds image
/// URLs in the order they appeared in the source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RenderedNotification {
    /// Message body in the target markup dialect.
    pub text: String,
    /// Ordered media references, possibly empty.
    pub media: Vec<String>,
}

impl RenderedNotification {
    /// Creates a text-only notification.
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), media: Vec::new() }
    }

    /// Returns whether the notification carries media.
    pub fn has_media(&self) -> bool {
        !self.media.is_empty()
    }
}

/// A resolved recipient for one notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientRef {
    /// Username on the tracking service.
    pub external_identity: String,
    /// Resolved messaging channel.
    pub internal_channel_id: ChannelId,
}

impl From<Subscriber> for RecipientRef {
    fn from(subscriber: Subscriber) -> Self {
        Self {
            external_identity: subscriber.external_identity,
            internal_channel_id: subscriber.channel_id,
        }
    }
}

/// Outcome of one recipient's delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// Every message for the recipient was accepted by the gateway.
    Delivered,
    /// The identity had no subscriber record; nothing was sent.
    RecipientUnresolved,
    /// The gateway failed; remaining messages for the recipient were skipped.
    DeliveryFailed(String),
}

impl DeliveryOutcome {
    /// Returns whether the recipient received the notification.
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivered => write!(f, "delivered"),
            Self::RecipientUnresolved => write!(f, "recipient_unresolved"),
            Self::DeliveryFailed(reason) => write!(f, "delivery_failed: {reason}"),
        }
    }
}

/// Per-recipient delivery record, used for logging and tests only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    /// Username on the tracking service.
    pub external_identity: String,
    /// Channel the delivery targeted; `None` when the identity was unresolved.
    pub channel_id: Option<ChannelId>,
    /// What happened.
    pub outcome: DeliveryOutcome,
}

impl DeliveryResult {
    /// Creates a result for a resolved recipient.
    pub fn for_recipient(recipient: &RecipientRef, outcome: DeliveryOutcome) -> Self {
        Self {
            external_identity: recipient.external_identity.clone(),
            channel_id: Some(recipient.internal_channel_id.clone()),
            outcome,
        }
    }

    /// Creates a result for an identity the directory could not resolve.
    pub fn unresolved(external_identity: impl Into<String>) -> Self {
        Self {
            external_identity: external_identity.into(),
            channel_id: None,
            outcome: DeliveryOutcome::RecipientUnresolved,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn raw_event_lifts_action_from_payload() {
        let event = RawEvent::new("issues", json!({"action": "opened"}), Utc::now());
        assert_eq!(event.action, "opened");

        let event = RawEvent::new("ping", json!({"zen": "Keep it logically awesome."}), Utc::now());
        assert_eq!(event.action, "");
    }

    #[test]
    fn channel_id_from_numeric_chat() {
        assert_eq!(ChannelId::from(-100_123_i64).as_str(), "-100123");
    }

    #[test]
    fn unresolved_result_has_no_channel() {
        let result = DeliveryResult::unresolved("ghost");
        assert_eq!(result.channel_id, None);
        assert_eq!(result.outcome, DeliveryOutcome::RecipientUnresolved);
    }

    #[test]
    fn outcome_serializes_with_reason() {
        let value = serde_json::to_value(DeliveryOutcome::DeliveryFailed("chat not found".into()))
            .unwrap();
        assert_eq!(value, json!({"outcome": "delivery_failed", "reason": "chat not found"}));
    }
}
