//! Storage contract behind the subscription registry.
//!
//! The registry works against three logical maps - username to
//! subscription, endpoint to username, and a topic-to-members multimap -
//! expressed as one trait so the in-memory store can be swapped for a
//! distributed one without touching registry semantics. Each method is
//! atomic per key; cross-map consistency is the registry's job.

use crate::subscription::Subscription;
use dashmap::DashMap;
use std::collections::HashSet;

/// Abstract key/value + set-multimap storage for subscriptions.
pub trait SubscriptionStore: Send + Sync {
    /// Install or replace the subscription stored under its username.
    fn put_subscription(&self, subscription: Subscription);

    /// Subscription stored under `username`, if any.
    fn get_subscription(&self, username: &str) -> Option<Subscription>;

    /// Drop the subscription stored under `username`.
    fn remove_subscription(&self, username: &str);

    /// Install or replace the endpoint → username mapping.
    fn put_endpoint_owner(&self, endpoint: &str, username: &str);

    /// Username owning `endpoint`, if any.
    fn get_endpoint_owner(&self, endpoint: &str) -> Option<String>;

    /// Drop the endpoint → username mapping.
    fn remove_endpoint(&self, endpoint: &str);

    /// Whether any subscriber is registered under `endpoint`.
    fn contains_endpoint(&self, endpoint: &str) -> bool;

    /// Add `username` to the member set of `topic` (idempotent).
    fn add_topic_member(&self, topic: &str, username: &str);

    /// Remove `username` from the member set of `topic`.
    fn remove_topic_member(&self, topic: &str, username: &str);

    /// Member set of `topic`; empty for an unknown topic.
    fn topic_members(&self, topic: &str) -> HashSet<String>;

    /// Remove `username` from every topic it belongs to.
    fn remove_member_everywhere(&self, username: &str);
}

/// In-memory store over concurrent maps.
///
/// Safe for simultaneous subscribe/unsubscribe/publish callers; per-key
/// operations are atomic. A topic whose member set becomes empty is
/// dropped, so an empty topic and a nonexistent topic are the same thing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    subscriptions: DashMap<String, Subscription>,
    endpoint_owners: DashMap<String, String>,
    topic_members: DashMap<String, HashSet<String>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SubscriptionStore for MemoryStore {
    fn put_subscription(&self, subscription: Subscription) {
        self.subscriptions
            .insert(subscription.username.clone(), subscription);
    }

    fn get_subscription(&self, username: &str) -> Option<Subscription> {
        self.subscriptions.get(username).map(|s| s.value().clone())
    }

    fn remove_subscription(&self, username: &str) {
        self.subscriptions.remove(username);
    }

    fn put_endpoint_owner(&self, endpoint: &str, username: &str) {
        self.endpoint_owners
            .insert(endpoint.to_string(), username.to_string());
    }

    fn get_endpoint_owner(&self, endpoint: &str) -> Option<String> {
        self.endpoint_owners.get(endpoint).map(|u| u.value().clone())
    }

    fn remove_endpoint(&self, endpoint: &str) {
        self.endpoint_owners.remove(endpoint);
    }

    fn contains_endpoint(&self, endpoint: &str) -> bool {
        self.endpoint_owners.contains_key(endpoint)
    }

    fn add_topic_member(&self, topic: &str, username: &str) {
        self.topic_members
            .entry(topic.to_string())
            .or_default()
            .insert(username.to_string());
    }

    fn remove_topic_member(&self, topic: &str, username: &str) {
        // Mutate under the entry lock, then prune outside it (dashmap
        // deadlocks if remove_if runs while the shard guard is held).
        let now_empty = self
            .topic_members
            .get_mut(topic)
            .map(|mut members| {
                members.remove(username);
                members.is_empty()
            })
            .unwrap_or(false);

        if now_empty {
            self.topic_members.remove_if(topic, |_, members| members.is_empty());
        }
    }

    fn topic_members(&self, topic: &str) -> HashSet<String> {
        self.topic_members
            .get(topic)
            .map(|members| members.value().clone())
            .unwrap_or_default()
    }

    fn remove_member_everywhere(&self, username: &str) {
        self.topic_members.retain(|_, members| {
            members.remove(username);
            !members.is_empty()
        });
    }
}
