//! Password-based key derivation.
//!
//! This module turns a password and a random salt into the 256-bit
//! symmetric key used by the stream cipher, via Argon2id at a fixed
//! "moderate" cost preset.
//!
//! ## Security Features
//!
//! - Keys are zeroized on drop (via `ZeroizeOnDrop`)
//! - Salts come from the OS CSPRNG and are unique per encryption
//! - Derivation is memory-hard to resist offline brute force

use argon2::{Algorithm, Argon2, Params, Version};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, VaultError};

/// Symmetric key length in bytes (XChaCha20-Poly1305 key size)
pub const KEY_LEN: usize = 32;

/// Salt length in bytes, stored unencrypted in the file header
pub const SALT_LEN: usize = 16;

/// Random salt mixed into key derivation, generated fresh per encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Salt([u8; SALT_LEN]);

impl Salt {
    /// Draw a fresh salt from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SALT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }
}

/// Password-derived symmetric key.
///
/// Owned exclusively by the codec call that derived it; never written
/// to disk and wiped from memory when dropped on any exit path.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

/// Argon2id cost parameters.
///
/// The default preset is the moderate one used for all normal
/// operations; tests substitute cheaper parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Number of iterations
    pub time_cost: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl KdfParams {
    /// Moderate preset: noticeable but tolerable derivation time.
    pub fn moderate() -> Self {
        Self {
            memory_cost: 65536, // 64 MiB
            time_cost: 3,
            parallelism: 1,
        }
    }

    /// Validate the parameters against the backend.
    ///
    /// Called once at engine startup so that bad parameters surface as
    /// a fatal [`VaultError::CryptoInit`] before any file is touched.
    pub fn validate(&self) -> Result<()> {
        self.to_params().map(|_| ())
    }

    fn to_params(&self) -> Result<Params> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| VaultError::crypto_init(format!("invalid Argon2 parameters: {e}")))
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::moderate()
    }
}

/// Derive a symmetric key from a password and salt.
///
/// Deterministic given identical inputs. The password itself is never
/// persisted; only the derived key lives in memory, and only until the
/// returned value is dropped.
pub fn derive_key(password: &[u8], salt: &Salt, params: &KdfParams) -> Result<SymmetricKey> {
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_params()?);

    let mut key_bytes = [0u8; KEY_LEN];
    argon2
        .hash_password_into(password, salt.as_bytes(), &mut key_bytes)
        .map_err(|e| VaultError::crypto_init(format!("key derivation failed: {e}")))?;

    Ok(SymmetricKey(key_bytes))
}
