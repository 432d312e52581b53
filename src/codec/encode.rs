//! src/codec/encode.rs
//! Plaintext stream → content entry bytes.

use crate::aliases::{Digest32, Mac32};
use crate::codec::{CodecKeys, StreamConfig};
use crate::consts::{HEADER_LEN, IV_OFFSET};
use crate::crypto::cipher::{cipher_stream, CipherDirection};
use crate::crypto::digest::{feed_chunks, hmac_sha256_stream, sha256_stream};
use crate::error::IntuneWinError;
use std::io::{Read, Seek, SeekFrom, Write};
use tracing::debug;

/// What an [`encode`] pass produced, besides the bytes themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSummary {
    /// Plaintext bytes consumed.
    pub plaintext_len: u64,
    /// Total length of the content entry, header included.
    pub encoded_len: u64,
    /// SHA-256 of the plaintext.
    pub content_digest: Digest32,
    /// HMAC-SHA256 over bytes `[32, EOF)` of the content entry.
    pub mac: Mac32,
}

/// Encode `plaintext` into `output` as a complete content entry.
///
/// `output` must be empty; it is read back for the MAC pass, so it needs
/// `Read + Seek` as well as `Write`. On return it is positioned at 0.
///
/// Order of operations:
/// 1. SHA-256 of the plaintext (position restored afterwards)
/// 2. 48 placeholder bytes for the header
/// 3. AES-256-CBC of the plaintext from offset 48, padded final block
/// 4. IV written at offset 32
/// 5. HMAC-SHA256 over `[32, EOF)`
/// 6. MAC written at offset 0
pub fn encode<R, W>(
    plaintext: &mut R,
    output: &mut W,
    keys: &CodecKeys<'_>,
    config: &StreamConfig,
) -> Result<EncodeSummary, IntuneWinError>
where
    R: Read + Seek + ?Sized,
    W: Read + Write + Seek + ?Sized,
{
    keys.validate()?;

    let content_digest = sha256_stream(plaintext, config.chunk_size, config.cancel())?;

    output.seek(SeekFrom::Start(0))?;
    output.write_all(&[0u8; HEADER_LEN])?;

    let mut stream = cipher_stream(
        &mut *output,
        keys.encryption_key,
        keys.iv,
        CipherDirection::Encrypt,
    )?;
    let plaintext_len = feed_chunks(plaintext, config.chunk_size, config.cancel(), |chunk| {
        stream.write_all(chunk).map_err(IntuneWinError::from)
    })?;
    stream.finish()?;

    output.seek(SeekFrom::Start(IV_OFFSET))?;
    output.write_all(keys.iv)?;
    output.seek(SeekFrom::Start(IV_OFFSET))?;

    let mac = hmac_sha256_stream(output, keys.mac_key, config.chunk_size, config.cancel())?;

    output.seek(SeekFrom::Start(0))?;
    output.write_all(&mac)?;
    output.flush()?;

    let encoded_len = output.seek(SeekFrom::End(0))?;
    output.seek(SeekFrom::Start(0))?;

    debug!(plaintext_len, encoded_len, "content encoded");

    Ok(EncodeSummary {
        plaintext_len,
        encoded_len,
        content_digest,
        mac,
    })
}
