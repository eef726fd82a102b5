//! Web Push subscription parsing.
//!
//! Clients register the browser's `PushSubscription` JSON as an opaque
//! string. It is parsed only when a notification is about to be sent.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Encryption keys issued by the browser
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionKeys {
    #[serde(rename = "p256dh")]
    pub public_key: String,
    #[serde(rename = "auth")]
    pub auth_secret: String,
}

/// A parsed push subscription
///
/// The endpoint doubles as the subscription key used for deduplication.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushSubscription {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

impl PushSubscription {
    /// Parse a stored subscription blob
    pub fn parse(blob: &str) -> Result<Self> {
        if blob.trim().is_empty() {
            return Err(Error::Subscription("subscription is empty".into()));
        }

        let subscription: PushSubscription = serde_json::from_str(blob)
            .map_err(|e| Error::Subscription(format!("malformed subscription: {}", e)))?;

        if subscription.endpoint.trim().is_empty() {
            return Err(Error::Subscription("subscription has no endpoint".into()));
        }

        Ok(subscription)
    }

    /// Key identifying this subscription for deduplication
    pub fn key(&self) -> &str {
        &self.endpoint
    }

    /// Shortened endpoint for log output
    pub fn preview(&self) -> String {
        preview(&self.endpoint)
    }
}

/// First few characters of a long identifier, for logs
pub fn preview(value: &str) -> String {
    const PREVIEW_CHARS: usize = 24;
    if value.chars().count() <= PREVIEW_CHARS {
        return value.to_string();
    }
    let head: String = value.chars().take(PREVIEW_CHARS).collect();
    format!("{}...", head)
}
