//! # vaultcrypt - Password-Based File & Folder Encryption
//!
//! vaultcrypt encrypts files and whole directory trees with a password,
//! using XChaCha20-Poly1305 in a chunked streaming format with Argon2id
//! key derivation, and supports an edit-in-place workflow that decrypts,
//! launches an external editor, and re-encrypts.
//!
//! ## Features
//!
//! - **Authenticated streaming format**: per-chunk tags detect any
//!   corruption, truncation, or wrong password
//! - **Password-derived keys**: Argon2id with a fresh salt per
//!   encryption; keys are zeroized on every exit path
//! - **Transactional tree operations**: recursive encrypt/decrypt rolls
//!   back the whole target on any per-file failure
//! - **Edit-in-place**: decrypt to scratch, edit, re-encrypt, clean up
//! - **Archive workflows**: compress-then-encrypt via an external tar
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use vaultcrypt::{config::Config, workflow::{Engine, Operation}};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = Engine::new(Config::default())?;
//!     let ok = engine
//!         .run(Operation::Encrypt, Path::new("notes.txt"), "correct horse")
//!         .await;
//!     assert!(ok);
//!     Ok(())
//! }
//! ```
//!
//! ## On-Disk Format
//!
//! `[header:24][salt:16][chunk...]` where each chunk is the ciphertext
//! of up to 4096 plaintext bytes plus 17 bytes of overhead; the last
//! chunk carries an authenticated final marker.

pub mod codec;
pub mod config;
pub mod error;
pub mod external;
pub mod kdf;
pub mod streaming;
pub mod util;
pub mod walker;
pub mod workflow;

// Re-export common types for convenience
pub use error::VaultError;
