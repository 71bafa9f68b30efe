//! VAPID authorization for push-service requests (RFC 8292).
//!
//! Builds the `Authorization: vapid t=<jwt>, k=<key>` header a push
//! service expects: an ES256 JWT whose audience is the push-service
//! origin, signed with the server's VAPID key, plus the server's public
//! key so the service can verify the signature.
//!
//! Tokens are recomputed per call. Signing is cheap next to the network
//! round trip, so there is no per-origin cache to invalidate.

use crate::keys::ServerKeys;
use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use chrono::Utc;
use p256::ecdsa::{signature::Signer, Signature};
use serde::Serialize;
use std::sync::Arc;
use url::Url;

/// JWT lifetime. Push services reject anything beyond 24 hours.
const TOKEN_LIFETIME_HOURS: i64 = 12;

/// Issues signed Authorization header values per push-service origin.
#[derive(Clone, Debug)]
pub struct VapidIssuer {
    keys: Arc<ServerKeys>,
    subject: String,
}

#[derive(Serialize)]
struct Claims<'a> {
    aud: &'a str,
    exp: i64,
    sub: &'a str,
}

impl VapidIssuer {
    /// An issuer signing with `keys` and identifying as `subject`
    /// (a `mailto:` contact URI).
    pub fn new(keys: Arc<ServerKeys>, subject: impl Into<String>) -> Self {
        Self {
            keys,
            subject: subject.into(),
        }
    }

    /// The full Authorization header value for a push request to `endpoint`.
    ///
    /// # Errors
    ///
    /// Fails if the endpoint does not parse as a URL with a host. The
    /// dispatcher treats that as a dead-endpoint signal: such a
    /// subscription can never be delivered to.
    pub fn authorization(&self, endpoint: &str) -> Result<String> {
        let audience = origin(endpoint)?;
        let token = self.sign_token(&audience)?;
        Ok(format!(
            "vapid t={}, k={}",
            token,
            self.keys.public_key_base64()
        ))
    }

    fn sign_token(&self, audience: &str) -> Result<String> {
        let header = serde_json::json!({ "typ": "JWT", "alg": "ES256" });
        let claims = Claims {
            aud: audience,
            exp: (Utc::now() + chrono::Duration::hours(TOKEN_LIFETIME_HOURS)).timestamp(),
            sub: &self.subject,
        };

        let header_b64 = BASE64URL.encode(serde_json::to_vec(&header)?);
        let claims_b64 = BASE64URL.encode(serde_json::to_vec(&claims)?);
        let signing_input = format!("{header_b64}.{claims_b64}");

        // ES256: raw 64-byte r || s signature, not DER
        let signature: Signature = self.keys.signing_key().sign(signing_input.as_bytes());
        let signature_b64 = BASE64URL.encode(signature.to_bytes());

        Ok(format!("{signing_input}.{signature_b64}"))
    }
}

/// The JWT audience for a push endpoint: scheme://host, with the port
/// only when it is not the scheme default.
fn origin(endpoint: &str) -> Result<String> {
    let url = Url::parse(endpoint).context("Push endpoint is not a valid URL")?;
    let host = url.host().context("Push endpoint has no host")?;

    let host = match host {
        url::Host::Domain(domain) => domain.to_string(),
        url::Host::Ipv4(ip) => ip.to_string(),
        url::Host::Ipv6(ip) => format!("[{ip}]"),
    };

    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}
