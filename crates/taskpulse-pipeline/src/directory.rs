//! Subscriber directory.
//!
//! Maps a tracking-service username to the messaging channel that should
//! receive its notifications. The pipeline only reads from it; records are
//! managed elsewhere. [`InMemoryDirectory`] can be seeded from a TOML file:
//!
//! ```toml
//! [[subscribers]]
//! external_identity = "alice"
//! channel_id = "123456789"
//! ```

use std::{collections::HashMap, path::Path};

use async_trait::async_trait;
use serde::Deserialize;
use taskpulse_core::{ChannelId, Subscriber};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::DirectoryError;

/// Read access to subscriber records.
#[async_trait]
pub trait SubscriberDirectory: Send + Sync {
    /// Finds the subscriber registered for an external identity.
    async fn lookup_by_external_identity(
        &self,
        identity: &str,
    ) -> Result<Option<Subscriber>, DirectoryError>;
}

/// Directory held in process memory.
///
/// Identities are matched case-insensitively, the way the tracking service
/// treats usernames.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    subscribers: RwLock<HashMap<String, Subscriber>>,
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    subscribers: Vec<SeedEntry>,
}

#[derive(Debug, Deserialize)]
struct SeedEntry {
    external_identity: String,
    channel_id: SeedChannel,
}

/// Channel ids may be written as TOML integers or strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SeedChannel {
    Numeric(i64),
    Text(String),
}

impl From<SeedChannel> for ChannelId {
    fn from(channel: SeedChannel) -> Self {
        match channel {
            SeedChannel::Numeric(id) => Self::from(id),
            SeedChannel::Text(id) => Self::new(id),
        }
    }
}

fn key(identity: &str) -> String {
    identity.trim().to_lowercase()
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory holding the given subscribers.
    pub fn from_subscribers(subscribers: impl IntoIterator<Item = Subscriber>) -> Self {
        let map = subscribers
            .into_iter()
            .map(|subscriber| (key(&subscriber.external_identity), subscriber))
            .collect();
        Self { subscribers: RwLock::new(map) }
    }

    /// Parses a TOML seed document.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSeed` if the document is not valid TOML or an entry is
    /// missing a field.
    pub fn from_toml_str(source_name: &str, content: &str) -> Result<Self, DirectoryError> {
        let seed: SeedFile = toml::from_str(content)
            .map_err(|e| DirectoryError::invalid_seed(source_name, e.to_string()))?;

        let subscribers = seed.subscribers.into_iter().map(|entry| Subscriber {
            external_identity: entry.external_identity,
            channel_id: entry.channel_id.into(),
        });

        Ok(Self::from_subscribers(subscribers))
    }

    /// Loads a TOML seed file.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSeed` if the file cannot be read or parsed.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let path = path.as_ref();
        let source_name = path.display().to_string();

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DirectoryError::invalid_seed(&source_name, e.to_string()))?;

        let directory = Self::from_toml_str(&source_name, &content)?;
        let subscribers = directory.len().await;
        info!(path = %source_name, subscribers, "loaded subscriber seed");

        Ok(directory)
    }

    /// Adds or replaces a subscriber.
    pub async fn upsert(&self, subscriber: Subscriber) {
        self.subscribers.write().await.insert(key(&subscriber.external_identity), subscriber);
    }

    /// Removes the subscriber for an identity, returning it if present.
    pub async fn remove(&self, identity: &str) -> Option<Subscriber> {
        self.subscribers.write().await.remove(&key(identity))
    }

    /// Returns the number of subscribers.
    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Returns whether the directory is empty.
    pub async fn is_empty(&self) -> bool {
        self.subscribers.read().await.is_empty()
    }
}

#[async_trait]
impl SubscriberDirectory for InMemoryDirectory {
    async fn lookup_by_external_identity(
        &self,
        identity: &str,
    ) -> Result<Option<Subscriber>, DirectoryError> {
        Ok(self.subscribers.read().await.get(&key(identity)).cloned())
    }
}
