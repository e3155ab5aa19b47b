//! Stateful stream cipher sessions.
//!
//! This module wraps XChaCha20-Poly1305 into push (encrypt) and pull
//! (decrypt) sessions bound to one header/key pair for their lifetime.
//!
//! ## Chunk framing
//!
//! ```text
//! [header:24][chunk0][chunk1]...
//!
//! Each chunk:
//! [ciphertext of (plaintext || tag_byte)][mac:16]
//! ```
//!
//! The per-chunk nonce is the session header with its last four bytes
//! XORed with a little-endian chunk counter, so reordered or replayed
//! chunks fail authentication. The continue/final tag byte travels
//! inside the sealed chunk rather than as a separate on-disk field.

use chacha20poly1305::aead::{Aead, OsRng};
use chacha20poly1305::{KeyInit, XChaCha20Poly1305, XNonce};
use rand_core::RngCore;

use crate::error::{Result, VaultError};
use crate::kdf::SymmetricKey;

/// Stream header length in bytes
pub const HEADER_LEN: usize = 24;

/// Maximum plaintext bytes per chunk
pub const PLAIN_CHUNK_LEN: usize = 4096;

/// Per-chunk overhead: embedded tag byte plus Poly1305 MAC
pub const CHUNK_OVERHEAD: usize = 17;

/// On-disk size of a full ciphertext chunk
pub const CIPHER_CHUNK_LEN: usize = PLAIN_CHUNK_LEN + CHUNK_OVERHEAD;

/// Opaque session header, stored unencrypted ahead of the chunk sequence.
pub type StreamHeader = [u8; HEADER_LEN];

/// Marker carried by every chunk; exactly one final chunk ends a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkTag {
    /// More chunks follow
    Message,
    /// Last chunk of the stream
    Final,
}

impl ChunkTag {
    fn to_byte(self) -> u8 {
        match self {
            ChunkTag::Message => 0x00,
            ChunkTag::Final => 0x01,
        }
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(ChunkTag::Message),
            0x01 => Some(ChunkTag::Final),
            _ => None,
        }
    }
}

fn chunk_nonce(header: &StreamHeader, counter: u32) -> XNonce {
    let mut nonce = *header;
    for (b, c) in nonce[HEADER_LEN - 4..].iter_mut().zip(counter.to_le_bytes()) {
        *b ^= c;
    }
    XNonce::from(nonce)
}

fn build_cipher(key: &SymmetricKey) -> XChaCha20Poly1305 {
    XChaCha20Poly1305::new(key.as_bytes().into())
}

/// Encrypting session. Produces one authenticated chunk per `push`.
pub struct PushStream {
    cipher: XChaCha20Poly1305,
    header: StreamHeader,
    counter: u32,
    finalized: bool,
}

impl PushStream {
    /// Start a push session, generating a fresh random header.
    pub fn init(key: &SymmetricKey) -> (Self, StreamHeader) {
        let mut header = [0u8; HEADER_LEN];
        OsRng.fill_bytes(&mut header);
        let stream = Self {
            cipher: build_cipher(key),
            header,
            counter: 0,
            finalized: false,
        };
        (stream, header)
    }

    /// Seal one plaintext chunk of at most [`PLAIN_CHUNK_LEN`] bytes.
    ///
    /// Pushing after the final chunk, or oversized input, is a caller
    /// bug and reported as an error rather than silently corrupting the
    /// stream.
    pub fn push(&mut self, plaintext: &[u8], tag: ChunkTag) -> Result<Vec<u8>> {
        if self.finalized {
            return Err(VaultError::crypto_init("push after final chunk"));
        }
        if plaintext.len() > PLAIN_CHUNK_LEN {
            return Err(VaultError::crypto_init("plaintext chunk too large"));
        }

        let nonce = chunk_nonce(&self.header, self.counter);
        let mut message = Vec::with_capacity(plaintext.len() + 1);
        message.extend_from_slice(plaintext);
        message.push(tag.to_byte());

        let ciphertext = self
            .cipher
            .encrypt(&nonce, message.as_slice())
            .map_err(|e| VaultError::crypto_init(format!("encryption failed: {e}")))?;

        self.counter = self
            .counter
            .checked_add(1)
            .ok_or_else(|| VaultError::crypto_init("chunk counter overflow"))?;
        if tag == ChunkTag::Final {
            self.finalized = true;
        }
        Ok(ciphertext)
    }
}

/// Decrypting session over a previously written header.
pub struct PullStream {
    cipher: XChaCha20Poly1305,
    header: StreamHeader,
    counter: u32,
    finalized: bool,
}

impl PullStream {
    /// Start a pull session from a stored header and the derived key.
    pub fn init(header: StreamHeader, key: &SymmetricKey) -> Self {
        Self {
            cipher: build_cipher(key),
            header,
            counter: 0,
            finalized: false,
        }
    }

    /// Open one ciphertext chunk, returning the plaintext and its tag.
    ///
    /// Any corruption, wrong key, chunk reordering, or data after the
    /// final chunk fails with [`VaultError::Authentication`].
    pub fn pull(&mut self, ciphertext: &[u8]) -> Result<(Vec<u8>, ChunkTag)> {
        if self.finalized {
            // Trailing data after the final chunk is not part of the stream
            return Err(VaultError::Authentication);
        }

        let nonce = chunk_nonce(&self.header, self.counter);
        let mut message = self
            .cipher
            .decrypt(&nonce, ciphertext)
            .map_err(|_| VaultError::Authentication)?;

        let tag_byte = message.pop().ok_or(VaultError::Authentication)?;
        let tag = ChunkTag::from_byte(tag_byte).ok_or(VaultError::Authentication)?;

        self.counter = self
            .counter
            .checked_add(1)
            .ok_or(VaultError::Authentication)?;
        if tag == ChunkTag::Final {
            self.finalized = true;
        }
        Ok((message, tag))
    }

    /// Whether the final chunk has been observed.
    pub fn finalized(&self) -> bool {
        self.finalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::{derive_key, KdfParams, Salt, SALT_LEN};

    fn make_key() -> SymmetricKey {
        let params = KdfParams {
            memory_cost: 16,
            time_cost: 1,
            parallelism: 1,
        };
        derive_key(b"test password", &Salt::from_bytes([3u8; SALT_LEN]), &params).unwrap()
    }

    #[test]
    fn push_pull_round_trip() {
        let key = make_key();
        let (mut push, header) = PushStream::init(&key);

        let c0 = push.push(b"first chunk", ChunkTag::Message).unwrap();
        let c1 = push.push(b"last chunk", ChunkTag::Final).unwrap();

        let mut pull = PullStream::init(header, &key);
        let (p0, t0) = pull.pull(&c0).unwrap();
        let (p1, t1) = pull.pull(&c1).unwrap();

        assert_eq!(p0, b"first chunk");
        assert_eq!(t0, ChunkTag::Message);
        assert_eq!(p1, b"last chunk");
        assert_eq!(t1, ChunkTag::Final);
        assert!(pull.finalized());
    }

    #[test]
    fn empty_final_chunk_round_trips() {
        let key = make_key();
        let (mut push, header) = PushStream::init(&key);
        let chunk = push.push(b"", ChunkTag::Final).unwrap();
        assert_eq!(chunk.len(), CHUNK_OVERHEAD);

        let mut pull = PullStream::init(header, &key);
        let (plaintext, tag) = pull.pull(&chunk).unwrap();
        assert!(plaintext.is_empty());
        assert_eq!(tag, ChunkTag::Final);
    }

    #[test]
    fn corrupted_chunk_fails_authentication() {
        let key = make_key();
        let (mut push, header) = PushStream::init(&key);
        let mut chunk = push.push(b"payload", ChunkTag::Final).unwrap();
        chunk[3] ^= 0x40;

        let mut pull = PullStream::init(header, &key);
        assert!(matches!(
            pull.pull(&chunk),
            Err(VaultError::Authentication)
        ));
    }

    #[test]
    fn reordered_chunks_fail_authentication() {
        let key = make_key();
        let (mut push, header) = PushStream::init(&key);
        let c0 = push.push(b"one", ChunkTag::Message).unwrap();
        let c1 = push.push(b"two", ChunkTag::Final).unwrap();

        let mut pull = PullStream::init(header, &key);
        assert!(pull.pull(&c1).is_err());
        let _ = c0;
    }

    #[test]
    fn data_after_final_chunk_is_rejected() {
        let key = make_key();
        let (mut push, header) = PushStream::init(&key);
        let c0 = push.push(b"only", ChunkTag::Final).unwrap();

        let mut pull = PullStream::init(header, &key);
        pull.pull(&c0).unwrap();
        assert!(matches!(
            pull.pull(&c0),
            Err(VaultError::Authentication)
        ));
    }

    #[test]
    fn push_after_final_is_an_error() {
        let key = make_key();
        let (mut push, _header) = PushStream::init(&key);
        push.push(b"done", ChunkTag::Final).unwrap();
        assert!(push.push(b"more", ChunkTag::Message).is_err());
    }

    #[test]
    fn headers_are_unique_per_session() {
        let key = make_key();
        let (_, h1) = PushStream::init(&key);
        let (_, h2) = PushStream::init(&key);
        assert_ne!(h1, h2);
    }
}
