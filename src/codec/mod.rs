// src/codec/mod.rs

//! Encrypted content codec.
//!
//! Core API: [`encode`] turns a plaintext stream into a complete content
//! entry (`[mac:32][iv:16][AES-256-CBC ciphertext]`) and reports the
//! plaintext digest and MAC; [`decode`] skips the header and decrypts the
//! rest. [`verify_mac`] is an opt-in integrity check; [`decode`] never
//! checks the MAC on its own.

pub(crate) mod decode;
pub(crate) mod encode;

pub use decode::{decode, verify_mac};
pub use encode::{encode, EncodeSummary};

use crate::cancel::CancelToken;
use crate::consts::{DEFAULT_CHUNK_SIZE, ENCRYPTION_KEY_LEN, IV_LEN, MAC_KEY_LEN};
use crate::error::IntuneWinError;
use std::io::{self, Write};

/// Raw key material for one codec pass.
#[derive(Clone, Copy)]
pub struct CodecKeys<'a> {
    pub encryption_key: &'a [u8],
    pub iv: &'a [u8],
    pub mac_key: &'a [u8],
}

impl CodecKeys<'_> {
    /// Checks every length before any byte is written.
    pub fn validate(&self) -> Result<(), IntuneWinError> {
        check_len(self.encryption_key, ENCRYPTION_KEY_LEN, "encryption key")?;
        check_len(self.iv, IV_LEN, "initialization vector")?;
        check_len(self.mac_key, MAC_KEY_LEN, "MAC key")
    }
}

fn check_len(bytes: &[u8], expected: usize, what: &str) -> Result<(), IntuneWinError> {
    if bytes.len() == expected {
        Ok(())
    } else {
        Err(IntuneWinError::InvalidKeyMaterial(format!(
            "{what} must be {expected} bytes, got {}",
            bytes.len()
        )))
    }
}

/// Buffering and cancellation settings shared by every streaming pass.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub chunk_size: usize,
    pub cancel: Option<CancelToken>,
}

impl StreamConfig {
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub(crate) fn cancel(&self) -> Option<&CancelToken> {
        self.cancel.as_ref()
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            cancel: None,
        }
    }
}

/// Counts bytes on their way to the wrapped writer.
pub(crate) struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> CountingWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }

    pub(crate) fn count(&self) -> u64 {
        self.count
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
