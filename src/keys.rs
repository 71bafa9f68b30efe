//! VAPID server keypair persistence.
//!
//! The server identity is a single P-256 ECDSA keypair used both to sign
//! VAPID JWTs (RFC 8292) and, in its uncompressed point form, as the
//! `applicationServerKey` handed to browsers when they subscribe.
//!
//! # Storage
//!
//! Two DER files at configurable paths: the public key as X.509
//! SubjectPublicKeyInfo, the private key as PKCS#8. Generated once on
//! first start, loaded unchanged on every subsequent start. The
//! uncompressed encoding and its base64url form are always recomputed
//! from the loaded key material, never read back from disk.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::elliptic_curve::rand_core::OsRng;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Uncompressed SEC1/X9.62 P-256 point length (0x04 || x || y).
const UNCOMPRESSED_POINT_LEN: usize = 65;

/// Categorized key-store failures. All variants are fatal at startup:
/// the engine never runs with missing or unverifiable signing keys.
#[derive(Debug)]
pub enum KeyStoreError {
    /// Exactly one of the two key files exists.
    PartialState { present: String, missing: String },
    /// A key file exists but its bytes do not decode as EC key material.
    InvalidKeyMaterial(String),
}

impl std::fmt::Display for KeyStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PartialState { present, missing } => write!(
                f,
                "Partial key store: {present} exists but {missing} is missing"
            ),
            Self::InvalidKeyMaterial(msg) => write!(f, "Invalid key material: {msg}"),
        }
    }
}

impl std::error::Error for KeyStoreError {}

/// The server's VAPID keypair and its derived public encodings.
///
/// Read-only after construction; freely shared across tasks.
#[derive(Debug)]
pub struct ServerKeys {
    signing_key: SigningKey,
    public_key_uncompressed: [u8; UNCOMPRESSED_POINT_LEN],
    public_key_base64: String,
}

impl ServerKeys {
    /// Load the persisted keypair, or generate and persist a fresh one if
    /// neither key file exists yet.
    ///
    /// # Errors
    ///
    /// Fails with [`KeyStoreError::PartialState`] if exactly one of the two
    /// files exists, and with [`KeyStoreError::InvalidKeyMaterial`] if the
    /// stored bytes do not decode. Both are fatal: callers must not start
    /// delivery with a broken key store.
    pub fn load_or_generate(public_path: &Path, private_path: &Path) -> Result<Self> {
        match (public_path.exists(), private_path.exists()) {
            (true, true) => Self::load(public_path, private_path),
            (false, false) => Self::generate_and_persist(public_path, private_path),
            (true, false) => Err(KeyStoreError::PartialState {
                present: public_path.display().to_string(),
                missing: private_path.display().to_string(),
            }
            .into()),
            (false, true) => Err(KeyStoreError::PartialState {
                present: private_path.display().to_string(),
                missing: public_path.display().to_string(),
            }
            .into()),
        }
    }

    fn load(public_path: &Path, private_path: &Path) -> Result<Self> {
        let public_der = fs::read(public_path)
            .with_context(|| format!("Failed to read {}", public_path.display()))?;
        let private_der = fs::read(private_path)
            .with_context(|| format!("Failed to read {}", private_path.display()))?;

        let verifying_key = VerifyingKey::from_public_key_der(&public_der)
            .map_err(|e| KeyStoreError::InvalidKeyMaterial(format!("public key: {e}")))?;
        let signing_key = SigningKey::from_pkcs8_der(&private_der)
            .map_err(|e| KeyStoreError::InvalidKeyMaterial(format!("private key: {e}")))?;

        log::info!("[WebPush] Loaded VAPID keypair from key store");
        Self::from_parts(signing_key, verifying_key)
    }

    fn generate_and_persist(public_path: &Path, private_path: &Path) -> Result<Self> {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);

        if let Some(dir) = public_path.parent() {
            fs::create_dir_all(dir)?;
        }
        if let Some(dir) = private_path.parent() {
            fs::create_dir_all(dir)?;
        }

        let public_der = verifying_key
            .to_public_key_der()
            .map_err(|e| KeyStoreError::InvalidKeyMaterial(format!("encode public key: {e}")))?;
        let private_der = signing_key
            .to_pkcs8_der()
            .map_err(|e| KeyStoreError::InvalidKeyMaterial(format!("encode private key: {e}")))?;

        fs::write(public_path, public_der.as_bytes())
            .with_context(|| format!("Failed to write {}", public_path.display()))?;
        write_private_key(private_path, private_der.as_bytes())
            .with_context(|| format!("Failed to write {}", private_path.display()))?;

        log::info!("[WebPush] Generated fresh VAPID keypair and persisted it");
        Self::from_parts(signing_key, verifying_key)
    }

    fn from_parts(signing_key: SigningKey, verifying_key: VerifyingKey) -> Result<Self> {
        let point = verifying_key.to_encoded_point(false);
        let public_key_uncompressed: [u8; UNCOMPRESSED_POINT_LEN] = point
            .as_bytes()
            .try_into()
            .map_err(|_| KeyStoreError::InvalidKeyMaterial("unexpected point length".into()))?;
        let public_key_base64 = BASE64URL.encode(public_key_uncompressed);

        Ok(Self {
            signing_key,
            public_key_uncompressed,
            public_key_base64,
        })
    }

    /// The P-256 ECDSA signing key used for VAPID JWTs.
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Uncompressed X9.62 public key bytes (65 bytes: 0x04 || x || y).
    ///
    /// This exact byte layout is exposed to browsers as the
    /// `applicationServerKey` and must be bit-reproducible across restarts.
    pub fn public_key_uncompressed(&self) -> &[u8; UNCOMPRESSED_POINT_LEN] {
        &self.public_key_uncompressed
    }

    /// URL-safe unpadded base64 of the uncompressed public key.
    pub fn public_key_base64(&self) -> &str {
        &self.public_key_base64
    }
}

/// Create the private key file owner read/write only from the start, so
/// it is never observable with wider permissions.
#[cfg(unix)]
fn write_private_key(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(bytes)
}

#[cfg(not(unix))]
fn write_private_key(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key_paths(dir: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
        (
            dir.path().join("server_public.der"),
            dir.path().join("server_private.der"),
        )
    }

    #[test]
    fn test_generate_creates_both_files() {
        let dir = TempDir::new().unwrap();
        let (public, private) = key_paths(&dir);

        let keys = ServerKeys::load_or_generate(&public, &private).unwrap();
        assert!(public.exists());
        assert!(private.exists());

        let point = keys.public_key_uncompressed();
        assert_eq!(point.len(), 65);
        assert_eq!(point[0], 0x04);
        assert!(!keys.public_key_base64().is_empty());
        assert!(!keys.public_key_base64().contains('='));
    }

    #[test]
    fn test_reload_is_bit_reproducible() {
        let dir = TempDir::new().unwrap();
        let (public, private) = key_paths(&dir);

        let first = ServerKeys::load_or_generate(&public, &private).unwrap();
        let second = ServerKeys::load_or_generate(&public, &private).unwrap();

        assert_eq!(
            first.public_key_uncompressed(),
            second.public_key_uncompressed()
        );
        assert_eq!(first.public_key_base64(), second.public_key_base64());
    }

    #[cfg(unix)]
    #[test]
    fn test_private_key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let (public, private) = key_paths(&dir);
        ServerKeys::load_or_generate(&public, &private).unwrap();

        let mode = fs::metadata(&private).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_partial_state_is_fatal() {
        let dir = TempDir::new().unwrap();
        let (public, private) = key_paths(&dir);

        ServerKeys::load_or_generate(&public, &private).unwrap();
        fs::remove_file(&private).unwrap();

        let err = ServerKeys::load_or_generate(&public, &private).unwrap_err();
        assert!(err.downcast_ref::<KeyStoreError>().is_some());
    }

    #[test]
    fn test_corrupt_key_material_is_fatal() {
        let dir = TempDir::new().unwrap();
        let (public, private) = key_paths(&dir);

        ServerKeys::load_or_generate(&public, &private).unwrap();
        fs::write(&private, b"not a key").unwrap();

        let err = ServerKeys::load_or_generate(&public, &private).unwrap_err();
        let kind = err.downcast_ref::<KeyStoreError>();
        assert!(matches!(kind, Some(KeyStoreError::InvalidKeyMaterial(_))));
    }
}
