//! Recipient resolution.

use std::{collections::HashSet, sync::Arc};

use taskpulse_core::{DeliveryResult, RecipientRef};
use tracing::{debug, info, warn};

use crate::directory::SubscriberDirectory;

/// Outcome of resolving an intent's audience.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Resolved recipients, in audience order.
    pub recipients: Vec<RecipientRef>,
    /// One `RecipientUnresolved` result per identity without a subscriber.
    pub unresolved: Vec<DeliveryResult>,
}

impl Resolution {
    /// Returns whether nobody can be notified.
    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }
}

/// Maps external identities to subscriber channels.
pub struct RecipientResolver {
    directory: Arc<dyn SubscriberDirectory>,
}

impl std::fmt::Debug for RecipientResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipientResolver").finish_non_exhaustive()
    }
}

impl RecipientResolver {
    /// Creates a resolver backed by the given directory.
    pub fn new(directory: Arc<dyn SubscriberDirectory>) -> Self {
        Self { directory }
    }

    /// Resolves an audience.
    ///
    /// Identities are deduplicated (case-insensitively, keeping the first
    /// spelling) before lookup. Identities that are not found, or whose lookup
    /// fails, are reported as unresolved and never stop the others.
    pub async fn resolve(&self, audience: &[String]) -> Resolution {
        let mut seen = HashSet::new();
        let mut resolution = Resolution::default();

        for identity in audience {
            if identity.is_empty() || !seen.insert(identity.to_lowercase()) {
                continue;
            }

            match self.directory.lookup_by_external_identity(identity).await {
                Ok(Some(subscriber)) => {
                    debug!(
                        identity = %identity,
                        channel = %subscriber.channel_id,
                        "resolved recipient"
                    );
                    resolution.recipients.push(RecipientRef {
                        external_identity: identity.clone(),
                        internal_channel_id: subscriber.channel_id,
                    });
                },
                Ok(None) => {
                    info!(identity = %identity, code = "E2002", "no subscriber for identity");
                    resolution.unresolved.push(DeliveryResult::unresolved(identity.clone()));
                },
                Err(e) => {
                    warn!(
                        identity = %identity,
                        code = "E2002",
                        error = %e,
                        "subscriber lookup failed"
                    );
                    resolution.unresolved.push(DeliveryResult::unresolved(identity.clone()));
                },
            }
        }

        resolution
    }
}
