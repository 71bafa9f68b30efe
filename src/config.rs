//! Configuration loading and persistence.
//!
//! Handles reading and writing the pushhub configuration file.
//! Every field can be overridden through a `PUSHHUB_*` environment
//! variable, which is how integration tests point the engine at
//! temporary key files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

/// Configuration for the push delivery engine.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    /// Path of the persisted VAPID public key (X.509 SubjectPublicKeyInfo DER).
    pub public_key_path: PathBuf,
    /// Path of the persisted VAPID private key (PKCS#8 DER).
    pub private_key_path: PathBuf,
    /// Contact identity placed in the VAPID JWT `sub` claim.
    pub vapid_subject: String,
    /// TTL header value sent with every push request, in seconds.
    pub ttl_secs: u64,
    /// Per-request timeout for outbound push requests, in seconds.
    pub request_timeout_secs: u64,
    /// Maximum number of simultaneous outbound push requests per publish.
    pub max_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        let key_dir = dirs::config_dir()
            .map(|d| d.join("pushhub"))
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            public_key_path: key_dir.join("server_public.der"),
            private_key_path: key_dir.join("server_private.der"),
            vapid_subject: "mailto:example@example.com".to_string(),
            ttl_secs: 180,
            request_timeout_secs: 5,
            max_concurrency: 16,
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// `PUSHHUB_CONFIG_DIR` overrides the platform config directory.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = std::env::var("PUSHHUB_CONFIG_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("pushhub")
        };
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Loads configuration from file, with environment variable overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file().unwrap_or_default();
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::config_dir()?.join("config.json");
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            anyhow::bail!("Config file not found")
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("PUSHHUB_PUBLIC_KEY_PATH") {
            self.public_key_path = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("PUSHHUB_PRIVATE_KEY_PATH") {
            self.private_key_path = PathBuf::from(path);
        }

        if let Ok(subject) = std::env::var("PUSHHUB_VAPID_SUBJECT") {
            self.vapid_subject = subject;
        }

        if let Ok(ttl) = std::env::var("PUSHHUB_TTL_SECS") {
            if let Ok(ttl) = ttl.parse::<u64>() {
                self.ttl_secs = ttl;
            }
        }

        if let Ok(timeout) = std::env::var("PUSHHUB_REQUEST_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                self.request_timeout_secs = timeout;
            }
        }

        if let Ok(concurrency) = std::env::var("PUSHHUB_MAX_CONCURRENCY") {
            if let Ok(concurrency) = concurrency.parse::<usize>() {
                self.max_concurrency = concurrency;
            }
        }
    }

    /// Persists the current configuration to disk.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_dir()?.join("config.json");
        fs::write(&config_path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.vapid_subject, "mailto:example@example.com");
        assert_eq!(config.ttl_secs, 180);
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.max_concurrency, 16);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let loaded: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.ttl_secs, config.ttl_secs);
        assert_eq!(loaded.public_key_path, config.public_key_path);
    }

    #[test]
    fn test_save_writes_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        std::env::set_var("PUSHHUB_CONFIG_DIR", dir.path());

        let config = Config::default();
        config.save().unwrap();

        let content = fs::read_to_string(dir.path().join("config.json")).unwrap();
        let loaded: Config = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.ttl_secs, config.ttl_secs);
        assert_eq!(loaded.public_key_path, config.public_key_path);

        std::env::remove_var("PUSHHUB_CONFIG_DIR");
    }

    #[test]
    fn test_key_paths_differ() {
        let config = Config::default();
        assert_ne!(config.public_key_path, config.private_key_path);
    }
}
