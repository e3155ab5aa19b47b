//! Configuration management with environment variable support.
//!
//! This module provides [`Config`] for loading and validating vaultcrypt
//! settings from JSON files and environment variables.
//!
//! ## Environment Variables
//!
//! - `VAULTCRYPT_ENC_STORE`: Override encrypted artifact directory
//! - `VAULTCRYPT_DEC_STORE`: Override decrypted artifact directory
//! - `VAULTCRYPT_COMPRESS_STORE`: Override archive staging directory
//! - `VAULTCRYPT_DECOMPRESS_STORE`: Override extraction directory
//! - `VAULTCRYPT_EDITOR`: Override the text editor command
//! - `VAULTCRYPT_BROWSER`: Override the folder browser command
//! - `VAULTCRYPT_CONFIG`: Override config file path

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable names for configuration overrides
pub const ENV_ENC_STORE: &str = "VAULTCRYPT_ENC_STORE";
pub const ENV_DEC_STORE: &str = "VAULTCRYPT_DEC_STORE";
pub const ENV_COMPRESS_STORE: &str = "VAULTCRYPT_COMPRESS_STORE";
pub const ENV_DECOMPRESS_STORE: &str = "VAULTCRYPT_DECOMPRESS_STORE";
pub const ENV_EDITOR: &str = "VAULTCRYPT_EDITOR";
pub const ENV_BROWSER: &str = "VAULTCRYPT_BROWSER";
pub const ENV_CONFIG_PATH: &str = "VAULTCRYPT_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where encrypted artifacts land
    pub enc_store: String,
    /// Where decrypted artifacts (and edit scratch content) land
    pub dec_store: String,
    /// Staging area for archives produced before encryption
    pub compress_store: String,
    /// Where decrypted archives are extracted
    pub decompress_store: String,
    /// Blocking text editor command for single-file edits
    pub editor: String,
    /// Blocking folder browser command for directory edits
    pub browser: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enc_store: "./Admin/EncStore".to_string(),
            dec_store: "./Admin/DecStore".to_string(),
            compress_store: "./Admin/CompressStore".to_string(),
            decompress_store: "./Admin/DecompressStore".to_string(),
            editor: "vim".to_string(),
            browser: "ranger".to_string(),
        }
    }
}

impl Config {
    /// Load config from file path
    pub fn load(path: &str) -> Result<Self> {
        let s =
            fs::read_to_string(path).with_context(|| format!("reading config file {}", path))?;
        let mut config: Config = serde_json::from_str(&s)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config with environment variable overrides
    /// Priority: ENV vars > config file > defaults
    pub fn load_with_env(path: Option<&str>) -> Result<Self> {
        let config_path = path
            .map(String::from)
            .or_else(|| env::var(ENV_CONFIG_PATH).ok());

        let mut config = match config_path {
            Some(ref p) if Path::new(p).exists() => {
                info!(path = p, "loading config from file");
                let s = fs::read_to_string(p)
                    .with_context(|| format!("reading config file {}", p))?;
                serde_json::from_str(&s)?
            }
            _ => {
                debug!("using default configuration");
                Config::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to config
    fn apply_env_overrides(&mut self) {
        let overrides = [
            (ENV_ENC_STORE, &mut self.enc_store),
            (ENV_DEC_STORE, &mut self.dec_store),
            (ENV_COMPRESS_STORE, &mut self.compress_store),
            (ENV_DECOMPRESS_STORE, &mut self.decompress_store),
            (ENV_EDITOR, &mut self.editor),
            (ENV_BROWSER, &mut self.browser),
        ];
        for (var, field) in overrides {
            if let Ok(value) = env::var(var) {
                debug!(var, value = %value, "overriding config from environment");
                *field = value;
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("enc_store", &self.enc_store),
            ("dec_store", &self.dec_store),
            ("compress_store", &self.compress_store),
            ("decompress_store", &self.decompress_store),
            ("editor", &self.editor),
            ("browser", &self.browser),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }
        }

        // The stores must be distinct or cleanup of one operation
        // could delete another operation's output
        let stores = [
            &self.enc_store,
            &self.dec_store,
            &self.compress_store,
            &self.decompress_store,
        ];
        for (i, a) in stores.iter().enumerate() {
            for b in stores.iter().skip(i + 1) {
                if a == b {
                    anyhow::bail!("store directories must be distinct, found duplicate {}", a);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn duplicate_stores_are_rejected() {
        let mut cfg = Config::default();
        cfg.dec_store = cfg.enc_store.clone();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn empty_editor_is_rejected() {
        let mut cfg = Config::default();
        cfg.editor = "  ".to_string();
        assert!(cfg.validate().is_err());
    }
}
