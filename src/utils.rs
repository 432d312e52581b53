// ============================================================================
// FILE: src/utils.rs
// ============================================================================

//! Utility functions used across the library.

use crate::consts::AES_BLOCK_LEN;
use crate::error::IntuneWinError;

/// XORs two 16-byte blocks and writes the result to `output`.
///
/// Used by both CBC directions: plaintext ^ previous ciphertext before
/// encryption, decrypted block ^ previous ciphertext after decryption.
///
/// # Panics (by contract)
///
/// Panics if any slice is shorter than 16 bytes. Callers always pass
/// `expose_secret()` of a [`Block16`](crate::aliases::Block16) or a
/// 16-byte slice of a chunk.
#[inline(always)]
pub const fn xor_blocks(block_a: &[u8], block_b: &[u8], output: &mut [u8]) {
    let mut i = 0;
    while i < AES_BLOCK_LEN {
        output[i] = block_a[i] ^ block_b[i];
        i += 1;
    }
}

/// Compares two byte strings without short-circuiting on the first mismatch.
#[inline]
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Copies `bytes` into a fixed array, failing with
/// [`IntuneWinError::InvalidKeyMaterial`] when the length is wrong.
pub fn to_fixed<const N: usize>(bytes: &[u8], what: &str) -> Result<[u8; N], IntuneWinError> {
    bytes.try_into().map_err(|_| {
        IntuneWinError::InvalidKeyMaterial(format!(
            "{what} must be {N} bytes, got {}",
            bytes.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_is_self_inverse() {
        let a = [0xA5u8; 16];
        let b: [u8; 16] = core::array::from_fn(|i| i as u8);
        let mut once = [0u8; 16];
        let mut twice = [0u8; 16];
        xor_blocks(&a, &b, &mut once);
        xor_blocks(&once, &b, &mut twice);
        assert_eq!(twice, a);
    }

    #[test]
    fn ct_eq_rejects_length_mismatch() {
        assert!(ct_eq(b"abc", b"abc"));
        assert!(!ct_eq(b"abc", b"abd"));
        assert!(!ct_eq(b"abc", b"ab"));
    }

    #[test]
    fn to_fixed_reports_length() {
        let err = to_fixed::<32>(&[0u8; 31], "encryption key").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid key material: encryption key must be 32 bytes, got 31"
        );
    }
}
