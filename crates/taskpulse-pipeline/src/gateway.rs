//! Messaging gateway.
//!
//! The fan-out only needs two operations: send a text message and send an
//! album of images. [`TelegramGateway`] implements them against the Telegram
//! Bot API (`sendMessage` and `sendMediaGroup`).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use taskpulse_core::ChannelId;
use tracing::{debug, instrument, warn};

use crate::error::{truncate_body, GatewayError};

/// Default Telegram Bot API base URL.
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Maximum number of items in one media group.
pub const MAX_MEDIA_GROUP_SIZE: usize = 10;

/// Text markup dialect of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Markup {
    /// Telegram MarkdownV2; text must be escaped.
    #[default]
    MarkdownV2,
    /// No formatting.
    Plain,
}

impl Markup {
    fn parse_mode(self) -> Option<&'static str> {
        match self {
            Self::MarkdownV2 => Some("MarkdownV2"),
            Self::Plain => None,
        }
    }
}

/// One image in a media group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaItem {
    /// Image URL.
    pub media: String,
    /// Caption in MarkdownV2, shown under the item.
    pub caption: Option<String>,
}

impl MediaItem {
    /// Creates an item without caption.
    pub fn new(media: impl Into<String>) -> Self {
        Self { media: media.into(), caption: None }
    }
}

/// Outbound messaging operations.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Sends a text message to a channel.
    async fn send_text(
        &self,
        channel: &ChannelId,
        text: &str,
        markup: Markup,
    ) -> Result<(), GatewayError>;

    /// Sends up to [`MAX_MEDIA_GROUP_SIZE`] images as one album.
    async fn send_media_group(
        &self,
        channel: &ChannelId,
        items: &[MediaItem],
    ) -> Result<(), GatewayError>;
}

/// Telegram Bot API implementation of [`MessagingGateway`].
#[derive(Clone)]
pub struct TelegramGateway {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for TelegramGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramGateway")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct BotApiResponse {
    ok: bool,
    description: Option<String>,
}

impl TelegramGateway {
    /// Creates a gateway for the given API base URL and bot token.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Configuration` if the HTTP client cannot be
    /// built.
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            GatewayError::configuration(format!("failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> Result<(), GatewayError> {
        let response =
            self.client.post(self.method_url(method)).json(&body).send().await.map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    // Strip the URL: it embeds the bot token.
                    GatewayError::network(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::network(e.without_url().to_string()))?;

        let parsed: Option<BotApiResponse> = serde_json::from_str(&text).ok();

        match parsed {
            Some(reply) if status.is_success() && reply.ok => {
                debug!(method, "bot api call succeeded");
                Ok(())
            },
            Some(reply) => {
                let description = reply.description.unwrap_or_else(|| "no description".to_string());
                warn!(method, status = status.as_u16(), %description, "bot api rejected call");
                Err(GatewayError::rejected(status.as_u16(), description))
            },
            None if status.is_success() => Err(GatewayError::invalid_response(format!(
                "unparseable body: {}",
                truncate_body(&text)
            ))),
            None => Err(GatewayError::rejected(status.as_u16(), truncate_body(&text))),
        }
    }
}

#[async_trait]
impl MessagingGateway for TelegramGateway {
    #[instrument(
        name = "send_text",
        skip(self, text),
        fields(channel = %channel, chars = text.chars().count())
    )]
    async fn send_text(
        &self,
        channel: &ChannelId,
        text: &str,
        markup: Markup,
    ) -> Result<(), GatewayError> {
        let mut body = json!({
            "chat_id": channel.as_str(),
            "text": text,
        });
        if let Some(mode) = markup.parse_mode() {
            body["parse_mode"] = json!(mode);
        }

        self.call("sendMessage", body).await
    }

    #[instrument(
        name = "send_media_group",
        skip(self, items),
        fields(channel = %channel, items = items.len())
    )]
    async fn send_media_group(
        &self,
        channel: &ChannelId,
        items: &[MediaItem],
    ) -> Result<(), GatewayError> {
        let media: Vec<_> = items
            .iter()
            .map(|item| {
                let mut entry = json!({ "type": "photo", "media": item.media });
                if let Some(caption) = &item.caption {
                    entry["caption"] = json!(caption);
                    entry["parse_mode"] = json!("MarkdownV2");
                }
                entry
            })
            .collect();

        let body = json!({
            "chat_id": channel.as_str(),
            "media": media,
        });

        self.call("sendMediaGroup", body).await
    }
}
