//! Delivery fan-out.
//!
//! Sends one rendered notification to every resolved recipient. Each
//! recipient gets its own task, all tasks are joined, and the results come
//! back in recipient order. A failure for one recipient stops only that
//! recipient's remaining messages.
//!
//! Failed sends are not retried.

use std::sync::Arc;

use futures::future::join_all;
use taskpulse_core::{DeliveryOutcome, DeliveryResult, RecipientRef, RenderedNotification};
use tracing::{debug, error, info, Instrument};

use crate::{
    chunk::{chunk_text, split_point, MessageLimits},
    gateway::{Markup, MediaItem, MessagingGateway, MAX_MEDIA_GROUP_SIZE},
};

/// Reason recorded when a recipient's delivery task panics.
pub const PANICKED_REASON: &str = "delivery task panicked";

/// One gateway call in a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// A text message.
    Text(String),
    /// An album of up to [`MAX_MEDIA_GROUP_SIZE`] images.
    MediaGroup(Vec<MediaItem>),
}

/// Plans the gateway calls for a notification.
///
/// Text-only notifications become one text message per chunk. With media,
/// images are sent in groups of at most [`MAX_MEDIA_GROUP_SIZE`]; the first
/// caption-sized chunk of the text goes on the first image and whatever does
/// not fit follows as text messages.
pub fn plan_messages(
    notification: &RenderedNotification,
    limits: MessageLimits,
) -> Vec<OutboundMessage> {
    let text = notification.text.as_str();

    if !notification.has_media() {
        return chunk_text(text, limits.text).into_iter().map(OutboundMessage::Text).collect();
    }

    let caption_end = split_point(text, limits.caption);
    let (caption, overflow) = text.split_at(caption_end);

    let mut messages: Vec<OutboundMessage> = notification
        .media
        .chunks(MAX_MEDIA_GROUP_SIZE)
        .map(|group| OutboundMessage::MediaGroup(group.iter().map(MediaItem::new).collect()))
        .collect();

    if let Some(OutboundMessage::MediaGroup(first_group)) = messages.first_mut() {
        if let Some(first_item) = first_group.first_mut() {
            if !caption.is_empty() {
                first_item.caption = Some(caption.to_string());
            }
        }
    }

    messages.extend(chunk_text(overflow, limits.text).into_iter().map(OutboundMessage::Text));
    messages
}

/// Concurrent per-recipient delivery.
#[derive(Clone)]
pub struct FanOut {
    gateway: Arc<dyn MessagingGateway>,
    limits: MessageLimits,
}

impl std::fmt::Debug for FanOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanOut").field("limits", &self.limits).finish_non_exhaustive()
    }
}

impl FanOut {
    /// Creates a fan-out over the given gateway.
    pub fn new(gateway: Arc<dyn MessagingGateway>, limits: MessageLimits) -> Self {
        Self { gateway, limits }
    }

    /// Delivers a notification to every recipient concurrently.
    ///
    /// Returns exactly one result per recipient, in the order given.
    pub async fn deliver(
        &self,
        notification: &RenderedNotification,
        recipients: &[RecipientRef],
    ) -> Vec<DeliveryResult> {
        let messages = Arc::new(plan_messages(notification, self.limits));
        debug!(recipients = recipients.len(), messages = messages.len(), "starting fan-out");

        let handles: Vec<_> = recipients
            .iter()
            .cloned()
            .map(|recipient| {
                let gateway = Arc::clone(&self.gateway);
                let messages = Arc::clone(&messages);
                let span = tracing::info_span!(
                    "deliver",
                    identity = %recipient.external_identity,
                    channel = %recipient.internal_channel_id
                );
                tokio::spawn(
                    async move { deliver_to(gateway.as_ref(), &recipient, &messages).await }
                        .instrument(span),
                )
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(recipients)
            .map(|(joined, recipient)| {
                let outcome = joined.unwrap_or_else(|e| {
                    error!(
                        identity = %recipient.external_identity,
                        code = "E2003",
                        error = %e,
                        "delivery task failed"
                    );
                    DeliveryOutcome::DeliveryFailed(PANICKED_REASON.to_string())
                });
                DeliveryResult::for_recipient(recipient, outcome)
            })
            .collect()
    }
}

async fn deliver_to(
    gateway: &dyn MessagingGateway,
    recipient: &RecipientRef,
    messages: &[OutboundMessage],
) -> DeliveryOutcome {
    let channel = &recipient.internal_channel_id;

    for (index, message) in messages.iter().enumerate() {
        let sent = match message {
            OutboundMessage::Text(text) => {
                gateway.send_text(channel, text, Markup::MarkdownV2).await
            },
            OutboundMessage::MediaGroup(items) => gateway.send_media_group(channel, items).await,
        };

        if let Err(e) = sent {
            let reason = e.to_string();
            let failure = e.into_delivery_failure(recipient.external_identity.clone());
            error!(
                code = failure.code(),
                message_index = index,
                skipped = messages.len() - index - 1,
                error = %failure,
                "delivery failed"
            );
            return DeliveryOutcome::DeliveryFailed(reason);
        }
    }

    info!(messages = messages.len(), "notification delivered");
    DeliveryOutcome::Delivered
}
