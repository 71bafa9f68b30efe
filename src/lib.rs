//! Pushhub - encrypted web push delivery engine.
//!
//! This crate implements the server side of the Web Push wire protocol:
//! it holds a VAPID (RFC 8292) signing keypair, registers subscriber
//! endpoints with their per-subscriber encryption keys, and publishes
//! messages to topics by encrypting the payload per subscriber (RFC 8291)
//! and POSTing it to each subscriber's push-service endpoint.
//!
//! # Architecture
//!
//! Construction is explicit and dependency-injected, leaves first:
//!
//! - [`keys::ServerKeys`] - the persisted P-256 VAPID keypair
//! - [`crypto`] - RFC 8291 payload encryption (pure function)
//! - [`vapid::VapidIssuer`] - signed Authorization header per push origin
//! - [`registry::SubscriptionRegistry`] - username/endpoint/topic mappings
//!   over any [`store::SubscriptionStore`]
//! - [`dispatch::Dispatcher`] - concurrent fan-out, response classification,
//!   dead-endpoint eviction
//! - [`hub::PushHub`] - facade wiring the above together
//!
//! # Modules
//!
//! - [`config`] - Configuration loading with env overrides
//! - [`keys`] - VAPID keypair persistence
//! - [`crypto`] - aes128gcm payload encryption
//! - [`vapid`] - VAPID JWT signing
//! - [`registry`] - Subscription and topic registry
//! - [`dispatch`] - Push delivery fan-out

pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod hub;
pub mod keys;
pub mod message;
pub mod registry;
pub mod store;
pub mod subscription;
pub mod vapid;

// Re-export commonly used types
pub use config::Config;
pub use dispatch::{DeliveryOutcome, DeliveryTally, Dispatcher};
pub use hub::PushHub;
pub use keys::ServerKeys;
pub use message::{Notification, PushMessage};
pub use registry::SubscriptionRegistry;
pub use store::{MemoryStore, SubscriptionStore};
pub use subscription::{Subscription, SubscriptionKeys};
pub use vapid::VapidIssuer;
