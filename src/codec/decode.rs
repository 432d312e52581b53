//! src/codec/decode.rs
//! Content entry bytes → plaintext, and the opt-in MAC check.

use crate::aliases::Mac32;
use crate::codec::{CountingWriter, StreamConfig};
use crate::crypto::cipher::{cipher_stream, CipherDirection};
use crate::crypto::digest::{feed_chunks, new_hmac};
use crate::error::IntuneWinError;
use crate::header::{read_content_header, ContentHeader};
use crate::utils::ct_eq;
use hmac::Mac;
use std::io::{Read, Write};
use tracing::debug;

/// Decode a content entry into `sink`. Returns the plaintext length.
///
/// The 48-byte header is skipped: the MAC is not checked and the stored IV
/// copy is ignored in favour of `iv`, which comes from the metadata record.
/// Use [`verify_mac`] first when integrity matters.
///
/// # Errors
///
/// - [`IntuneWinError::InvalidKeyMaterial`] - key or IV of the wrong length
/// - [`IntuneWinError::CorruptCiphertext`] - header truncated, ciphertext not
///   block-aligned, or bad padding
pub fn decode<R, W>(
    content: &mut R,
    sink: &mut W,
    encryption_key: &[u8],
    iv: &[u8],
    config: &StreamConfig,
) -> Result<u64, IntuneWinError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut counted = CountingWriter::new(&mut *sink);
    let mut stream = cipher_stream(&mut counted, encryption_key, iv, CipherDirection::Decrypt)?;

    read_content_header(&mut *content)?;

    let ciphertext_len = feed_chunks(content, config.chunk_size, config.cancel(), |chunk| {
        stream.write_all(chunk).map_err(IntuneWinError::from)
    })?;
    stream.finish()?;

    let plaintext_len = counted.count();
    debug!(ciphertext_len, plaintext_len, "content decoded");
    Ok(plaintext_len)
}

/// Recompute the HMAC-SHA256 of a content entry and compare it with the
/// MAC stored in its header and, if given, the MAC from the metadata record.
///
/// Returns the parsed header on success.
pub fn verify_mac<R>(
    content: &mut R,
    mac_key: &[u8],
    expected: Option<&Mac32>,
    config: &StreamConfig,
) -> Result<ContentHeader, IntuneWinError>
where
    R: Read + ?Sized,
{
    let mut hmac = new_hmac(mac_key)?;
    let header = read_content_header(&mut *content)?;

    hmac.update(&header.iv);
    feed_chunks(content, config.chunk_size, config.cancel(), |chunk| {
        hmac.update(chunk);
        Ok(())
    })?;
    let computed: Mac32 = hmac.finalize().into_bytes().into();

    if !ct_eq(&computed, &header.mac) {
        return Err(IntuneWinError::CorruptCiphertext(
            "stored MAC does not match content".into(),
        ));
    }
    if let Some(expected) = expected {
        if !ct_eq(&computed, expected) {
            return Err(IntuneWinError::CorruptCiphertext(
                "metadata MAC does not match content".into(),
            ));
        }
    }
    Ok(header)
}
