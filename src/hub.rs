//! Engine facade.
//!
//! `PushHub` owns the whole delivery engine - server keys, registry,
//! dispatcher - and exposes the plain operations an API layer calls.
//! Construction is explicit and ordered (keys → issuer → registry →
//! dispatcher); there are no lazily-initialized globals.

use crate::config::Config;
use crate::dispatch::{DeliveryTally, Dispatcher};
use crate::keys::ServerKeys;
use crate::message::PushMessage;
use crate::registry::SubscriptionRegistry;
use crate::store::{MemoryStore, SubscriptionStore};
use crate::subscription::Subscription;
use crate::vapid::VapidIssuer;
use anyhow::Result;
use std::sync::Arc;

/// The push delivery engine.
#[derive(Debug)]
pub struct PushHub<S = MemoryStore> {
    keys: Arc<ServerKeys>,
    registry: Arc<SubscriptionRegistry<S>>,
    dispatcher: Dispatcher<S>,
}

impl PushHub<MemoryStore> {
    /// Build the engine with the in-memory store, loading (or generating)
    /// the VAPID keypair at the configured paths.
    ///
    /// Key-store failures are fatal: the engine never starts without a
    /// usable signing identity.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_store(config, MemoryStore::new())
    }
}

impl<S: SubscriptionStore> PushHub<S> {
    /// Build the engine over a caller-provided store.
    pub fn with_store(config: &Config, store: S) -> Result<Self> {
        let keys = Arc::new(ServerKeys::load_or_generate(
            &config.public_key_path,
            &config.private_key_path,
        )?);
        let issuer = VapidIssuer::new(Arc::clone(&keys), config.vapid_subject.clone());
        let registry = Arc::new(SubscriptionRegistry::new(store));
        let dispatcher = Dispatcher::new(Arc::clone(&registry), issuer, config)?;

        Ok(Self {
            keys,
            registry,
            dispatcher,
        })
    }

    /// Uncompressed public signing key (65 bytes), the browser's
    /// `applicationServerKey`.
    pub fn public_signing_key(&self) -> &[u8] {
        self.keys.public_key_uncompressed()
    }

    /// Base64url (unpadded) form of the public signing key.
    pub fn public_signing_key_base64(&self) -> &str {
        self.keys.public_key_base64()
    }

    /// Register a subscriber (upsert by username).
    pub fn subscribe(&self, subscription: Subscription) {
        log::info!(
            "[WebPush] {} subscribed: {}",
            subscription.username,
            subscription.endpoint
        );
        self.registry.subscribe(subscription);
    }

    /// Remove the subscriber registered under `endpoint`.
    pub fn unsubscribe(&self, endpoint: &str) -> bool {
        log::info!("[WebPush] Unsubscription: {endpoint}");
        self.registry.unsubscribe(endpoint)
    }

    /// Whether any subscriber is registered under `endpoint`.
    pub fn is_subscribed(&self, endpoint: &str) -> bool {
        self.registry.is_subscribed(endpoint)
    }

    /// Add `username` to `topic`.
    pub fn subscribe_to_topic(&self, username: &str, topic: &str) {
        self.registry.subscribe_to_topic(username, topic);
    }

    /// Publish `message` to every subscriber of `topic`.
    pub async fn publish(&self, topic: &str, message: &PushMessage) -> DeliveryTally {
        self.dispatcher.publish(topic, message).await
    }

    /// Direct access to the registry, for callers that need the full
    /// operation set (unsubscribe by username, topic removal, resolve).
    pub fn registry(&self) -> &SubscriptionRegistry<S> {
        &self.registry
    }
}
