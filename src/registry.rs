//! Subscription and topic registry.
//!
//! Keeps three mappings mutually consistent: username → subscription,
//! endpoint → username, and topic → member set. Registering a
//! subscription installs the first two together; removing one (by either
//! key) removes both and strips the username from every topic. No
//! half-registrations survive a completed call.

use crate::store::{MemoryStore, SubscriptionStore};
use crate::subscription::Subscription;
use std::collections::HashSet;

/// Registry over an abstract [`SubscriptionStore`].
#[derive(Debug)]
pub struct SubscriptionRegistry<S = MemoryStore> {
    store: S,
}

impl SubscriptionRegistry<MemoryStore> {
    /// A registry over the in-memory store.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }
}

impl<S: SubscriptionStore> SubscriptionRegistry<S> {
    /// A registry over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Register a subscriber, upserting by username.
    ///
    /// A re-subscribe under the same username with a new endpoint removes
    /// the stale endpoint mapping first, so the old endpoint can never
    /// resolve back to this user. An endpoint names exactly one
    /// subscriber: if a different username already owns the incoming
    /// endpoint, that user is evicted entirely before the new mappings
    /// are installed.
    pub fn subscribe(&self, subscription: Subscription) {
        if let Some(previous) = self.store.get_subscription(&subscription.username) {
            if previous.endpoint != subscription.endpoint {
                log::info!(
                    "[WebPush] {} re-subscribed with a new endpoint, dropping {}",
                    subscription.username,
                    previous.endpoint
                );
                self.store.remove_endpoint(&previous.endpoint);
            }
        }

        if let Some(owner) = self.store.get_endpoint_owner(&subscription.endpoint) {
            if owner != subscription.username {
                log::info!(
                    "[WebPush] {} took over endpoint {} from {owner}, evicting {owner}",
                    subscription.username,
                    subscription.endpoint
                );
                self.store.remove_member_everywhere(&owner);
                self.store.remove_subscription(&owner);
            }
        }

        self.store
            .put_endpoint_owner(&subscription.endpoint, &subscription.username);
        self.store.put_subscription(subscription);
    }

    /// Remove the subscriber registered under `endpoint`, including its
    /// membership in every topic. Returns whether anything was removed.
    pub fn unsubscribe(&self, endpoint: &str) -> bool {
        let Some(username) = self.store.get_endpoint_owner(endpoint) else {
            return false;
        };
        self.store.remove_member_everywhere(&username);
        self.store.remove_endpoint(endpoint);
        self.store.remove_subscription(&username);
        true
    }

    /// Remove the subscriber registered under `username`, including its
    /// membership in every topic. Returns whether anything was removed.
    pub fn unsubscribe_by_username(&self, username: &str) -> bool {
        let Some(subscription) = self.store.get_subscription(username) else {
            return false;
        };
        self.store.remove_member_everywhere(username);
        self.store.remove_endpoint(&subscription.endpoint);
        self.store.remove_subscription(username);
        true
    }

    /// Whether any subscriber is registered under `endpoint`.
    pub fn is_subscribed(&self, endpoint: &str) -> bool {
        self.store.contains_endpoint(endpoint)
    }

    /// Add `username` to `topic` (idempotent set-insert).
    pub fn subscribe_to_topic(&self, username: &str, topic: &str) {
        self.store.add_topic_member(topic, username);
    }

    /// Remove `username` from `topic` only.
    pub fn unsubscribe_from_topic(&self, username: &str, topic: &str) {
        self.store.remove_topic_member(topic, username);
    }

    /// Member usernames of `topic`; empty for an unknown topic.
    pub fn members_of(&self, topic: &str) -> HashSet<String> {
        self.store.topic_members(topic)
    }

    /// Subscription registered under `username`, if any.
    pub fn resolve(&self, username: &str) -> Option<Subscription> {
        self.store.get_subscription(username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::SubscriptionKeys;

    fn sub(username: &str, endpoint: &str) -> Subscription {
        Subscription {
            username: username.to_string(),
            endpoint: endpoint.to_string(),
            expiration_time: None,
            keys: SubscriptionKeys {
                p256dh: "p".to_string(),
                auth: "a".to_string(),
            },
        }
    }

    #[test]
    fn test_subscribe_roundtrip() {
        let registry = SubscriptionRegistry::in_memory();
        let alice = sub("alice", "https://push.example/a");

        registry.subscribe(alice.clone());
        assert!(registry.is_subscribed("https://push.example/a"));
        assert_eq!(registry.resolve("alice"), Some(alice));

        assert!(registry.unsubscribe("https://push.example/a"));
        assert!(!registry.is_subscribed("https://push.example/a"));
        assert_eq!(registry.resolve("alice"), None);
    }

    #[test]
    fn test_unsubscribe_unknown_endpoint_is_noop() {
        let registry = SubscriptionRegistry::in_memory();
        assert!(!registry.unsubscribe("https://push.example/never"));
    }

    #[test]
    fn test_resubscribe_cleans_stale_endpoint() {
        let registry = SubscriptionRegistry::in_memory();
        registry.subscribe(sub("alice", "https://push.example/old"));
        registry.subscribe(sub("alice", "https://push.example/new"));

        assert!(!registry.is_subscribed("https://push.example/old"));
        assert!(registry.is_subscribed("https://push.example/new"));
        assert_eq!(
            registry.resolve("alice").unwrap().endpoint,
            "https://push.example/new"
        );
    }

    #[test]
    fn test_endpoint_takeover_evicts_previous_owner() {
        let registry = SubscriptionRegistry::in_memory();
        registry.subscribe(sub("alice", "https://push.example/shared"));
        registry.subscribe_to_topic("alice", "news");

        registry.subscribe(sub("bob", "https://push.example/shared"));

        assert_eq!(registry.resolve("alice"), None);
        assert!(registry.members_of("news").is_empty());
        assert!(registry.is_subscribed("https://push.example/shared"));
        assert_eq!(
            registry.resolve("bob").unwrap().endpoint,
            "https://push.example/shared"
        );
    }

    #[test]
    fn test_unsubscribe_after_takeover_leaves_nothing() {
        let registry = SubscriptionRegistry::in_memory();
        registry.subscribe(sub("alice", "https://push.example/shared"));
        registry.subscribe(sub("bob", "https://push.example/shared"));

        assert!(registry.unsubscribe("https://push.example/shared"));
        assert!(!registry.is_subscribed("https://push.example/shared"));
        assert_eq!(registry.resolve("alice"), None);
        assert_eq!(registry.resolve("bob"), None);
    }

    #[test]
    fn test_resubscribe_same_endpoint_keeps_mapping() {
        let registry = SubscriptionRegistry::in_memory();
        registry.subscribe(sub("alice", "https://push.example/a"));
        registry.subscribe(sub("alice", "https://push.example/a"));

        assert!(registry.is_subscribed("https://push.example/a"));
    }

    #[test]
    fn test_topic_membership_idempotent() {
        let registry = SubscriptionRegistry::in_memory();
        registry.subscribe_to_topic("alice", "news");
        registry.subscribe_to_topic("alice", "news");

        let members = registry.members_of("news");
        assert_eq!(members.len(), 1);
        assert!(members.contains("alice"));
    }

    #[test]
    fn test_unsubscribe_removes_topic_membership() {
        let registry = SubscriptionRegistry::in_memory();
        registry.subscribe(sub("alice", "https://push.example/a"));
        registry.subscribe_to_topic("alice", "t1");
        registry.subscribe_to_topic("alice", "t2");

        registry.unsubscribe("https://push.example/a");
        assert!(!registry.members_of("t1").contains("alice"));
        assert!(!registry.members_of("t2").contains("alice"));
    }

    #[test]
    fn test_unsubscribe_by_username_removes_everything() {
        let registry = SubscriptionRegistry::in_memory();
        registry.subscribe(sub("bob", "https://push.example/b"));
        registry.subscribe_to_topic("bob", "news");

        assert!(registry.unsubscribe_by_username("bob"));
        assert!(!registry.is_subscribed("https://push.example/b"));
        assert!(registry.members_of("news").is_empty());
        assert!(!registry.unsubscribe_by_username("bob"));
    }

    #[test]
    fn test_unsubscribe_from_single_topic() {
        let registry = SubscriptionRegistry::in_memory();
        registry.subscribe(sub("carol", "https://push.example/c"));
        registry.subscribe_to_topic("carol", "t1");
        registry.subscribe_to_topic("carol", "t2");

        registry.unsubscribe_from_topic("carol", "t1");
        assert!(registry.members_of("t1").is_empty());
        assert!(registry.members_of("t2").contains("carol"));
        assert!(registry.is_subscribed("https://push.example/c"));
    }

    #[test]
    fn test_members_of_unknown_topic_is_empty() {
        let registry = SubscriptionRegistry::in_memory();
        assert!(registry.members_of("ghost").is_empty());
    }

    #[test]
    fn test_no_dangling_half_registration() {
        let registry = SubscriptionRegistry::in_memory();
        registry.subscribe(sub("alice", "https://push.example/a"));

        // Both directions resolve, or neither does
        assert_eq!(
            registry.resolve("alice").is_some(),
            registry.is_subscribed("https://push.example/a")
        );
        registry.unsubscribe("https://push.example/a");
        assert_eq!(
            registry.resolve("alice").is_some(),
            registry.is_subscribed("https://push.example/a")
        );
    }
}
