//! Publishable message payloads.
//!
//! The dispatcher encrypts one canonical byte serialization per publish
//! call, so the payload is a tagged variant rather than an untyped value:
//! either a structured notification descriptor (what service workers
//! expect under a `notification` key) or opaque pre-serialized bytes the
//! application produced itself.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Structured notification content shown by the subscriber's browser.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification title.
    pub title: String,
    /// Body text, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Icon URL, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl Notification {
    /// A title-only notification.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: None,
            icon: None,
        }
    }

    /// Sets the body text.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the icon URL.
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// A message to publish to a topic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushMessage {
    /// A notification descriptor, serialized as `{"notification": {...}}`.
    Notification(Notification),
    /// Pre-serialized payload bytes, passed through untouched.
    Raw(Vec<u8>),
}

impl PushMessage {
    /// Convenience constructor for a plain text payload (JSON string).
    pub fn text(text: impl AsRef<str>) -> Self {
        let json = serde_json::to_vec(text.as_ref())
            .expect("serializing a string to JSON cannot fail");
        Self::Raw(json)
    }

    /// The canonical wire serialization encrypted per subscriber.
    ///
    /// Deterministic for a given message: publishing the same message
    /// yields the same plaintext for every subscriber.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::Notification(notification) => {
                serde_json::to_vec(&serde_json::json!({ "notification": notification }))
                    .context("Failed to serialize notification payload")
            }
            Self::Raw(bytes) => Ok(bytes.clone()),
        }
    }
}

impl From<Notification> for PushMessage {
    fn from(notification: Notification) -> Self {
        Self::Notification(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_payload_shape() {
        let message = PushMessage::Notification(
            Notification::new("Build failed").with_body("3 tests red"),
        );
        let bytes = message.to_bytes().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["notification"]["title"], "Build failed");
        assert_eq!(value["notification"]["body"], "3 tests red");
        assert!(value["notification"].get("icon").is_none());
    }

    #[test]
    fn test_raw_passes_through() {
        let message = PushMessage::Raw(b"{\"k\":1}".to_vec());
        assert_eq!(message.to_bytes().unwrap(), b"{\"k\":1}");
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let message = PushMessage::Notification(Notification::new("same"));
        assert_eq!(message.to_bytes().unwrap(), message.to_bytes().unwrap());
    }

    #[test]
    fn test_text_is_json_string() {
        let bytes = PushMessage::text("hello").to_bytes().unwrap();
        assert_eq!(bytes, b"\"hello\"");
    }

    #[test]
    fn test_text_escapes_and_never_produces_empty_payload() {
        let bytes = PushMessage::text("say \"hi\"").to_bytes().unwrap();
        assert_eq!(bytes, b"\"say \\\"hi\\\"\"");

        let empty = PushMessage::text("").to_bytes().unwrap();
        assert_eq!(empty, b"\"\"");
    }
}
