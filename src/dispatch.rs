//! Push delivery fan-out.
//!
//! Given a topic and a message, resolves the topic's members, encrypts
//! the canonical payload per subscriber, signs a VAPID Authorization
//! header per endpoint origin, POSTs to each push service with bounded
//! concurrency, and classifies the responses. Endpoints a push service
//! declares dead (404/410) and endpoints that fail at the transport
//! level are evicted from the registry; everything else leaves the
//! registry untouched.
//!
//! Per-subscriber failures never abort a publish call. The call always
//! completes; failures surface only as evictions and logs.

use crate::config::Config;
use crate::crypto::encrypt_aes128gcm;
use crate::message::PushMessage;
use crate::registry::SubscriptionRegistry;
use crate::store::{MemoryStore, SubscriptionStore};
use crate::subscription::Subscription;
use crate::vapid::VapidIssuer;
use anyhow::{Context, Result};
use futures_util::{stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;

/// Terminal state of one delivery attempt. Only [`Evicted`] mutates the
/// registry.
///
/// [`Evicted`]: DeliveryOutcome::Evicted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// 201 Created - the push service accepted the message.
    Delivered,
    /// 404/410, an unparseable endpoint, or a transport failure - the
    /// subscription was removed from the registry.
    Evicted,
    /// 429 - rate limited; retried on a future publish, never in-call.
    TransientFailure,
    /// 400/413 - the service rejected this payload; the subscription may
    /// still be valid for other payloads.
    RejectedPayload,
    /// Any other status code, logged and ignored.
    Unhandled,
}

/// Aggregate outcome counts for one publish call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeliveryTally {
    /// Accepted by the push service.
    pub delivered: usize,
    /// Removed from the registry.
    pub evicted: usize,
    /// Rate limited.
    pub transient: usize,
    /// Payload rejected.
    pub rejected: usize,
    /// Unrecognized status codes.
    pub unhandled: usize,
    /// Members skipped before any request was sent (vanished subscription
    /// or invalid encryption keys).
    pub skipped: usize,
}

impl DeliveryTally {
    fn record(&mut self, outcome: Option<DeliveryOutcome>) {
        match outcome {
            Some(DeliveryOutcome::Delivered) => self.delivered += 1,
            Some(DeliveryOutcome::Evicted) => self.evicted += 1,
            Some(DeliveryOutcome::TransientFailure) => self.transient += 1,
            Some(DeliveryOutcome::RejectedPayload) => self.rejected += 1,
            Some(DeliveryOutcome::Unhandled) => self.unhandled += 1,
            None => self.skipped += 1,
        }
    }
}

/// Fans messages out to a topic's subscribers.
#[derive(Debug)]
pub struct Dispatcher<S = MemoryStore> {
    client: reqwest::Client,
    registry: Arc<SubscriptionRegistry<S>>,
    issuer: VapidIssuer,
    ttl_secs: u64,
    max_concurrency: usize,
}

impl<S: SubscriptionStore> Dispatcher<S> {
    /// A dispatcher delivering on behalf of `registry`, authorized by
    /// `issuer`.
    pub fn new(
        registry: Arc<SubscriptionRegistry<S>>,
        issuer: VapidIssuer,
        config: &Config,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            registry,
            issuer,
            ttl_secs: config.ttl_secs,
            max_concurrency: config.max_concurrency.max(1),
        })
    }

    /// Publish `message` to every subscriber of `topic`.
    ///
    /// An empty topic is a logged no-op. Each subscriber's
    /// encrypt → authorize → send → classify sequence runs independently,
    /// at most `max_concurrency` at a time.
    pub async fn publish(&self, topic: &str, message: &PushMessage) -> DeliveryTally {
        let members = self.registry.members_of(topic);
        if members.is_empty() {
            log::info!("[WebPush] Topic {topic} has no subscribers, nothing to publish");
            return DeliveryTally::default();
        }

        let payload = match message.to_bytes() {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("[WebPush] Failed to serialize message for topic {topic}: {e}");
                return DeliveryTally::default();
            }
        };

        let outcomes: Vec<Option<DeliveryOutcome>> = stream::iter(members)
            .map(|username| self.deliver_member(username, &payload))
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let mut tally = DeliveryTally::default();
        for outcome in outcomes {
            tally.record(outcome);
        }
        log::info!("[WebPush] Published to topic {topic}: {tally:?}");
        tally
    }

    /// Deliver to one member. `None` means the member was skipped before
    /// any request went out.
    async fn deliver_member(
        &self,
        username: String,
        payload: &[u8],
    ) -> Option<DeliveryOutcome> {
        // Subscription may have vanished in a race with unsubscribe
        let Some(subscription) = self.registry.resolve(&username) else {
            log::debug!("[WebPush] {username} has no subscription anymore, skipping");
            return None;
        };

        let body = match self.encrypt_for(&subscription, payload) {
            Ok(body) => body,
            Err(e) => {
                log::warn!(
                    "[WebPush] Cannot encrypt for {username} ({}): {e}",
                    subscription.endpoint
                );
                return None;
            }
        };

        let authorization = match self.issuer.authorization(&subscription.endpoint) {
            Ok(authorization) => authorization,
            Err(e) => {
                log::warn!(
                    "[WebPush] Invalid endpoint for {username} ({}), evicting: {e}",
                    subscription.endpoint
                );
                self.registry.unsubscribe(&subscription.endpoint);
                return Some(DeliveryOutcome::Evicted);
            }
        };

        Some(self.send(&subscription, authorization, body).await)
    }

    fn encrypt_for(&self, subscription: &Subscription, payload: &[u8]) -> Result<Vec<u8>> {
        let p256dh = subscription.keys.p256dh_bytes()?;
        let auth = subscription.keys.auth_bytes()?;
        encrypt_aes128gcm(payload, &p256dh, &auth, 0)
    }

    async fn send(
        &self,
        subscription: &Subscription,
        authorization: String,
        body: Vec<u8>,
    ) -> DeliveryOutcome {
        let response = self
            .client
            .post(&subscription.endpoint)
            .header("TTL", self.ttl_secs.to_string())
            .header("Content-Type", "application/octet-stream")
            .header("Content-Encoding", "aes128gcm")
            .header("Authorization", authorization)
            .body(body)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                // Unreachable endpoints are assumed dead, same as 404/410
                log::warn!(
                    "[WebPush] Transport failure for {}, evicting: {e}",
                    subscription.endpoint
                );
                self.registry.unsubscribe(&subscription.endpoint);
                return DeliveryOutcome::Evicted;
            }
        };

        let outcome = classify(response.status().as_u16());
        match outcome {
            DeliveryOutcome::Delivered => {
                log::info!("[WebPush] Delivered to {}", subscription.endpoint);
            }
            DeliveryOutcome::Evicted => {
                log::info!(
                    "[WebPush] Subscription not found or gone ({}), evicting {}",
                    response.status(),
                    subscription.endpoint
                );
                self.registry.unsubscribe(&subscription.endpoint);
            }
            DeliveryOutcome::TransientFailure => {
                log::warn!("[WebPush] Rate limited by {}", subscription.endpoint);
            }
            DeliveryOutcome::RejectedPayload => {
                log::warn!(
                    "[WebPush] Payload rejected ({}) by {}",
                    response.status(),
                    subscription.endpoint
                );
            }
            DeliveryOutcome::Unhandled => {
                log::warn!(
                    "[WebPush] Unhandled status {} from {}",
                    response.status(),
                    subscription.endpoint
                );
            }
        }
        outcome
    }
}

/// Map a push-service status code onto a delivery outcome.
fn classify(status: u16) -> DeliveryOutcome {
    match status {
        201 => DeliveryOutcome::Delivered,
        404 | 410 => DeliveryOutcome::Evicted,
        429 => DeliveryOutcome::TransientFailure,
        400 | 413 => DeliveryOutcome::RejectedPayload,
        _ => DeliveryOutcome::Unhandled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_terminal_codes() {
        assert_eq!(classify(201), DeliveryOutcome::Delivered);
        assert_eq!(classify(404), DeliveryOutcome::Evicted);
        assert_eq!(classify(410), DeliveryOutcome::Evicted);
    }

    #[test]
    fn test_classify_non_terminal_codes() {
        assert_eq!(classify(429), DeliveryOutcome::TransientFailure);
        assert_eq!(classify(400), DeliveryOutcome::RejectedPayload);
        assert_eq!(classify(413), DeliveryOutcome::RejectedPayload);
    }

    #[test]
    fn test_classify_unknown_codes_are_unhandled() {
        assert_eq!(classify(200), DeliveryOutcome::Unhandled);
        assert_eq!(classify(500), DeliveryOutcome::Unhandled);
        assert_eq!(classify(502), DeliveryOutcome::Unhandled);
    }

    #[test]
    fn test_tally_counts_each_outcome() {
        let mut tally = DeliveryTally::default();
        tally.record(Some(DeliveryOutcome::Delivered));
        tally.record(Some(DeliveryOutcome::Delivered));
        tally.record(Some(DeliveryOutcome::Evicted));
        tally.record(Some(DeliveryOutcome::TransientFailure));
        tally.record(Some(DeliveryOutcome::RejectedPayload));
        tally.record(Some(DeliveryOutcome::Unhandled));
        tally.record(None);

        assert_eq!(tally.delivered, 2);
        assert_eq!(tally.evicted, 1);
        assert_eq!(tally.transient, 1);
        assert_eq!(tally.rejected, 1);
        assert_eq!(tally.unhandled, 1);
        assert_eq!(tally.skipped, 1);
    }
}
