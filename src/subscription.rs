//! Subscriber data model.
//!
//! Mirrors the JSON a browser produces from `PushSubscription.toJSON()`,
//! plus the username the application layer attaches to it.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use serde::{Deserialize, Serialize};

/// A subscriber's public encryption material, received at subscribe time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    /// Subscriber's P-256 ECDH public key (base64url, uncompressed point).
    pub p256dh: String,
    /// Shared 16-byte auth secret (base64url).
    pub auth: String,
}

impl SubscriptionKeys {
    /// Decoded `p256dh` bytes (should be a 65-byte uncompressed point).
    pub fn p256dh_bytes(&self) -> Result<Vec<u8>> {
        BASE64URL
            .decode(&self.p256dh)
            .context("Invalid base64url in p256dh")
    }

    /// Decoded `auth` bytes (should be 16 bytes).
    pub fn auth_bytes(&self) -> Result<Vec<u8>> {
        BASE64URL.decode(&self.auth).context("Invalid base64url in auth")
    }
}

/// One registered subscriber.
///
/// `username` is the identity key; `endpoint` is globally unique across
/// subscribers (the registry enforces both).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Application-level identity of the subscriber.
    pub username: String,
    /// Push-service URL messages for this subscriber are POSTed to.
    pub endpoint: String,
    /// Advisory expiration timestamp from the browser, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<i64>,
    /// Per-subscriber encryption material.
    pub keys: SubscriptionKeys,
}
