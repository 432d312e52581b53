//! src/crypto/digest.rs
//! Streaming SHA-256 / HMAC-SHA256 over a seekable source.
//!
//! Both functions hash from the current position to end-of-stream in
//! `chunk_size` pieces, then seek back to where they started, whether the
//! pass succeeded or not. The caller can hand the same handle straight to
//! the next pass.

use crate::aliases::{Digest32, HmacSha256, Mac32};
use crate::cancel::{self, CancelToken};
use crate::consts::{AES_BLOCK_LEN, MAC_KEY_LEN};
use crate::error::IntuneWinError;
use hmac::Mac;
use sha2::{Digest, Sha256};
use std::io::{ErrorKind, Read, Seek, SeekFrom};

/// SHA-256 of `input` from its current position to EOF.
pub fn sha256_stream<R>(
    input: &mut R,
    chunk_size: usize,
    cancel: Option<&CancelToken>,
) -> Result<Digest32, IntuneWinError>
where
    R: Read + Seek + ?Sized,
{
    let mut hasher = Sha256::new();
    with_restored_position(input, |input| {
        feed_chunks(input, chunk_size, cancel, |chunk| {
            hasher.update(chunk);
            Ok(())
        })
    })?;
    Ok(hasher.finalize().into())
}

/// HMAC-SHA256 of `input` from its current position to EOF, keyed by a
/// 32-byte `key`.
pub fn hmac_sha256_stream<R>(
    input: &mut R,
    key: &[u8],
    chunk_size: usize,
    cancel: Option<&CancelToken>,
) -> Result<Mac32, IntuneWinError>
where
    R: Read + Seek + ?Sized,
{
    let mut hmac = new_hmac(key)?;
    with_restored_position(input, |input| {
        feed_chunks(input, chunk_size, cancel, |chunk| {
            hmac.update(chunk);
            Ok(())
        })
    })?;
    Ok(hmac.finalize().into_bytes().into())
}

/// Keyed HMAC-SHA256 instance; the key must be exactly [`MAC_KEY_LEN`] bytes.
pub(crate) fn new_hmac(key: &[u8]) -> Result<HmacSha256, IntuneWinError> {
    if key.len() != MAC_KEY_LEN {
        return Err(IntuneWinError::InvalidKeyMaterial(format!(
            "MAC key must be {MAC_KEY_LEN} bytes, got {}",
            key.len()
        )));
    }
    <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| IntuneWinError::InvalidKeyMaterial(e.to_string()))
}

/// Reads `input` to EOF in `chunk_size` pieces, handing each to `sink`.
/// Checks `cancel` before every read. Returns the number of bytes read.
pub(crate) fn feed_chunks<R, F>(
    input: &mut R,
    chunk_size: usize,
    cancel: Option<&CancelToken>,
    mut sink: F,
) -> Result<u64, IntuneWinError>
where
    R: Read + ?Sized,
    F: FnMut(&[u8]) -> Result<(), IntuneWinError>,
{
    let mut buffer = vec![0u8; chunk_size.max(AES_BLOCK_LEN)];
    let mut total = 0u64;
    loop {
        cancel::check(cancel)?;
        let n = match input.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        sink(&buffer[..n])?;
        total += n as u64;
    }
    Ok(total)
}

fn with_restored_position<R, T, F>(input: &mut R, pass: F) -> Result<T, IntuneWinError>
where
    R: Seek + ?Sized,
    F: FnOnce(&mut R) -> Result<T, IntuneWinError>,
{
    let start = input.stream_position()?;
    let result = pass(&mut *input);
    let restored = input.seek(SeekFrom::Start(start));
    let value = result?;
    restored?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn sha256_of_empty_input() {
        let digest = sha256_stream(&mut Cursor::new(Vec::<u8>::new()), 64, None).unwrap();
        assert_eq!(
            hex::encode(digest),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn sha256_is_chunk_size_independent_and_restores_position() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let expected: Digest32 = Sha256::digest(&data).into();

        for chunk in [1, 16, 17, 4096, 1 << 20] {
            let mut cursor = Cursor::new(data.clone());
            assert_eq!(sha256_stream(&mut cursor, chunk, None).unwrap(), expected);
            assert_eq!(cursor.position(), 0, "chunk {chunk}: position not restored");
        }
    }

    #[test]
    fn hashing_starts_at_current_position() {
        let mut cursor = Cursor::new(b"skipHELLO".to_vec());
        cursor.set_position(4);
        let digest = sha256_stream(&mut cursor, 8, None).unwrap();
        let expected: Digest32 = Sha256::digest(b"HELLO").into();
        assert_eq!(digest, expected);
        assert_eq!(cursor.position(), 4);
    }

    #[test]
    fn hmac_matches_one_shot() {
        let key = [0x0bu8; 32];
        let data = vec![0x5au8; 5000];
        let mut one_shot = <HmacSha256 as Mac>::new_from_slice(&key).unwrap();
        one_shot.update(&data);
        let expected: Mac32 = one_shot.finalize().into_bytes().into();

        let got = hmac_sha256_stream(&mut Cursor::new(data), &key, 333, None).unwrap();
        assert_eq!(got, expected);
    }

    #[test]
    fn hmac_rejects_short_key() {
        let err = hmac_sha256_stream(&mut Cursor::new(b"x".to_vec()), &[0u8; 16], 16, None)
            .unwrap_err();
        assert!(matches!(err, IntuneWinError::InvalidKeyMaterial(_)));
    }

    #[test]
    fn cancelled_pass_still_restores_position() {
        let token = CancelToken::new();
        token.cancel();
        let mut cursor = Cursor::new(vec![1u8; 100]);
        cursor.set_position(10);
        let err = sha256_stream(&mut cursor, 16, Some(&token)).unwrap_err();
        assert!(matches!(err, IntuneWinError::Cancelled));
        assert_eq!(cursor.position(), 10);
    }
}
