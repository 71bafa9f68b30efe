//! Web push payload encryption (RFC 8291 / RFC 8188 aes128gcm).
//!
//! A pure function of the subscriber's key material and the plaintext:
//! every call generates a fresh ephemeral P-256 keypair and a fresh
//! 16-byte salt, derives the content-encryption key and nonce through
//! HKDF-SHA256, encrypts one record with AES-128-GCM, and prepends the
//! aes128gcm coding header.
//!
//! # Record Format
//!
//! ```text
//! salt (16) || record size (4, BE) || key id length (1, = 65)
//!          || ephemeral public key (65, uncompressed) || ciphertext+tag
//! ```

use anyhow::{Context, Result};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes128Gcm, Nonce,
};
use hkdf::Hkdf;
use p256::ecdh::EphemeralSecret;
use p256::elliptic_curve::rand_core::{OsRng, RngCore};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use sha2::Sha256;

/// Per-message salt length.
const SALT_LEN: usize = 16;
/// Uncompressed SEC1 P-256 point length.
const PUBLIC_KEY_LEN: usize = 65;
/// Subscriber auth secret length.
const AUTH_SECRET_LEN: usize = 16;
/// Content-encryption key length (AES-128).
const CEK_LEN: usize = 16;
/// AES-GCM nonce length.
const NONCE_LEN: usize = 12;

/// HKDF info prefix binding both public keys into the PRK derivation.
const IKM_INFO_PREFIX: &[u8] = b"WebPush: info\0";
/// HKDF info for the content-encryption key.
const CEK_INFO: &[u8] = b"Content-Encoding: aes128gcm\0";
/// HKDF info for the nonce.
const NONCE_INFO: &[u8] = b"Content-Encoding: nonce\0";

/// Encrypt `plaintext` for one subscriber, producing a complete aes128gcm
/// record ready to be sent as the push request body.
///
/// `subscriber_public` is the subscriber's raw uncompressed P-256 point
/// (the decoded `p256dh` value, 65 bytes) and `auth_secret` the decoded
/// 16-byte `auth` value. `padding_len` appends that many zero bytes after
/// the 0x02 record delimiter; delivery uses 0.
///
/// Two calls with identical inputs never produce identical output: the
/// ephemeral keypair and salt are fresh per call.
///
/// # Errors
///
/// Fails if the subscriber key material has the wrong shape or is not a
/// valid curve point. The caller should treat the subscriber as
/// undeliverable for this message; this is never an eviction signal.
pub fn encrypt_aes128gcm(
    plaintext: &[u8],
    subscriber_public: &[u8],
    auth_secret: &[u8],
    padding_len: usize,
) -> Result<Vec<u8>> {
    let subscriber_public: &[u8; PUBLIC_KEY_LEN] = subscriber_public
        .try_into()
        .map_err(|_| anyhow::anyhow!("p256dh must be {PUBLIC_KEY_LEN} bytes uncompressed"))?;
    anyhow::ensure!(
        auth_secret.len() == AUTH_SECRET_LEN,
        "auth secret must be {AUTH_SECRET_LEN} bytes, got {}",
        auth_secret.len()
    );

    let remote_public = p256::PublicKey::from_sec1_bytes(subscriber_public)
        .context("p256dh is not a valid P-256 point")?;

    // Fresh ephemeral keypair and salt for this single message
    let mut rng = OsRng;
    let ephemeral_secret = EphemeralSecret::random(&mut rng);
    let ephemeral_point = p256::PublicKey::from(&ephemeral_secret).to_encoded_point(false);
    let ephemeral_public: [u8; PUBLIC_KEY_LEN] = ephemeral_point
        .as_bytes()
        .try_into()
        .map_err(|_| anyhow::anyhow!("unexpected ephemeral point length"))?;

    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);

    let shared_secret = ephemeral_secret.diffie_hellman(&remote_public);

    // PRK = HKDF(salt: auth, ikm: ecdh, info: "WebPush: info" || ua_pub || as_pub)
    let mut ikm_info = Vec::with_capacity(IKM_INFO_PREFIX.len() + 2 * PUBLIC_KEY_LEN);
    ikm_info.extend_from_slice(IKM_INFO_PREFIX);
    ikm_info.extend_from_slice(subscriber_public);
    ikm_info.extend_from_slice(&ephemeral_public);
    let prk = hkdf_sha256(
        auth_secret,
        shared_secret.raw_secret_bytes().as_slice(),
        &ikm_info,
        32,
    )?;

    let cek = hkdf_sha256(&salt, &prk, CEK_INFO, CEK_LEN)?;
    let nonce = hkdf_sha256(&salt, &prk, NONCE_INFO, NONCE_LEN)?;

    // Single last record: plaintext || 0x02 delimiter || zero padding
    let mut record = Vec::with_capacity(plaintext.len() + 1 + padding_len);
    record.extend_from_slice(plaintext);
    record.push(0x02);
    record.resize(record.len() + padding_len, 0);

    let cipher = Aes128Gcm::new_from_slice(&cek)
        .map_err(|_| anyhow::anyhow!("derived CEK has invalid length"))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), record.as_slice())
        .map_err(|_| anyhow::anyhow!("AES-128-GCM encryption failed"))?;

    // aes128gcm coding header; record size covers ciphertext + tag
    let mut body =
        Vec::with_capacity(SALT_LEN + 4 + 1 + PUBLIC_KEY_LEN + ciphertext.len());
    body.extend_from_slice(&salt);
    body.extend_from_slice(&(ciphertext.len() as u32).to_be_bytes());
    body.push(PUBLIC_KEY_LEN as u8);
    body.extend_from_slice(&ephemeral_public);
    body.extend_from_slice(&ciphertext);

    Ok(body)
}

fn hkdf_sha256(salt: &[u8], ikm: &[u8], info: &[u8], len: usize) -> Result<Vec<u8>> {
    let hk = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = vec![0u8; len];
    hk.expand(info, &mut okm)
        .map_err(|_| anyhow::anyhow!("HKDF expand failed"))?;
    Ok(okm)
}
