//! Single-file encryption and decryption.
//!
//! [`FileCodec`] frames the stream cipher sessions onto disk:
//!
//! ```text
//! [header:24][salt:16][chunk0][chunk1]...
//! ```
//!
//! Files are processed in 4096-byte plaintext chunks; a short read
//! (including zero bytes) marks the final chunk, so files whose size is
//! a multiple of the chunk length end with an empty final chunk.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, error, info};

use crate::error::{Result, VaultError};
use crate::kdf::{derive_key, KdfParams, Salt, SALT_LEN};
use crate::streaming::{
    ChunkTag, PullStream, PushStream, StreamHeader, CIPHER_CHUNK_LEN, HEADER_LEN, PLAIN_CHUNK_LEN,
};

/// Extension appended to encrypted artifacts
pub const VAULT_EXT: &str = "vlt";

/// Whether a codec pass encrypts or decrypts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// Encrypts and decrypts individual files with a password-derived key.
pub struct FileCodec {
    params: KdfParams,
}

impl FileCodec {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    /// Target file name for one codec pass: `name.ext` becomes
    /// `name.ext.vlt` on encrypt; decrypt strips the last extension.
    pub fn target_name(direction: Direction, source: &Path) -> Result<PathBuf> {
        let file_name = source.file_name().ok_or_else(|| VaultError::PathResolution {
            path: source.to_path_buf(),
            base: PathBuf::new(),
        })?;
        Ok(match direction {
            Direction::Encrypt => {
                let mut name = file_name.to_os_string();
                name.push(".");
                name.push(VAULT_EXT);
                PathBuf::from(name)
            }
            Direction::Decrypt => PathBuf::from(Path::new(file_name).file_stem().unwrap_or(file_name)),
        })
    }

    /// Encrypt `source` into `target`, returning the salt used.
    ///
    /// The derived key is dropped (and zeroized) on every exit path.
    pub async fn encode(&self, source: &Path, target: &Path, password: &str) -> Result<Salt> {
        debug!(source = %source.display(), target = %target.display(), "encrypting file");
        let mut reader = fs::File::open(source).await?;
        let mut writer = fs::File::create(target).await?;

        let salt = Salt::generate();
        let key = derive_key(password.as_bytes(), &salt, &self.params)?;
        let (mut push, header) = PushStream::init(&key);

        writer.write_all(&header).await?;
        writer.write_all(salt.as_bytes()).await?;

        let mut buffer = vec![0u8; PLAIN_CHUNK_LEN];
        loop {
            let n = read_fill(&mut reader, &mut buffer).await?;
            // A short read means EOF; the final chunk may be empty
            let tag = if n < PLAIN_CHUNK_LEN {
                ChunkTag::Final
            } else {
                ChunkTag::Message
            };
            let chunk = push.push(&buffer[..n], tag)?;
            writer.write_all(&chunk).await?;
            if tag == ChunkTag::Final {
                break;
            }
        }
        writer.flush().await?;

        info!(source = %source.display(), target = %target.display(), "file encrypted");
        Ok(salt)
    }

    /// Decrypt `source` into `target`.
    ///
    /// Aborts on the first chunk that fails authentication; no partial
    /// plaintext is treated as valid by callers (they roll back).
    pub async fn decode(&self, source: &Path, target: &Path, password: &str) -> Result<()> {
        debug!(source = %source.display(), target = %target.display(), "decrypting file");
        let mut reader = fs::File::open(source).await?;
        let mut writer = fs::File::create(target).await?;

        let mut header: StreamHeader = [0u8; HEADER_LEN];
        let mut salt_bytes = [0u8; SALT_LEN];
        read_prefix(&mut reader, &mut header).await?;
        read_prefix(&mut reader, &mut salt_bytes).await?;

        let salt = Salt::from_bytes(salt_bytes);
        let key = derive_key(password.as_bytes(), &salt, &self.params)?;
        let mut pull = PullStream::init(header, &key);

        let mut buffer = vec![0u8; CIPHER_CHUNK_LEN];
        loop {
            let n = read_fill(&mut reader, &mut buffer).await?;
            if n == 0 {
                break;
            }
            let (plaintext, tag) = match pull.pull(&buffer[..n]) {
                Ok(out) => out,
                Err(e) => {
                    error!(source = %source.display(), "chunk authentication failed");
                    return Err(e);
                }
            };
            writer.write_all(&plaintext).await?;
            if tag == ChunkTag::Final {
                break;
            }
        }
        writer.flush().await?;

        info!(source = %source.display(), target = %target.display(), "file decrypted");
        Ok(())
    }
}

/// Fill `buf` from the reader, tolerating short reads; returns the
/// number of bytes read (less than `buf.len()` only at EOF).
async fn read_fill<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Read an exact-length prefix; a truncated header or salt means the
/// input is not a valid encrypted file.
async fn read_prefix<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(VaultError::Authentication),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_name_appends_marker() {
        let name = FileCodec::target_name(Direction::Encrypt, Path::new("/a/b/notes.txt")).unwrap();
        assert_eq!(name, PathBuf::from("notes.txt.vlt"));
    }

    #[test]
    fn decrypt_name_strips_marker() {
        let name = FileCodec::target_name(Direction::Decrypt, Path::new("/a/b/notes.txt.vlt")).unwrap();
        assert_eq!(name, PathBuf::from("notes.txt"));
    }

    #[test]
    fn target_name_requires_a_file_name() {
        assert!(FileCodec::target_name(Direction::Encrypt, Path::new("/")).is_err());
    }
}
