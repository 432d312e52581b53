// src/crypto/rng.rs
//! Fresh key material for a new package.
//!
//! A package gets one AES-256 key, one HMAC key and one IV at creation time
//! and keeps them for its whole life. The default source is the OS
//! generator; any `rand::CryptoRng` can be supplied instead.

use crate::aliases::{Aes256Key32, Iv16, MacKey32};
use crate::consts::{ENCRYPTION_KEY_LEN, IV_LEN, MAC_KEY_LEN};
use crate::error::IntuneWinError;
use rand::{rngs::OsRng, CryptoRng, TryRngCore};

/// The three secrets generated once per package.
pub struct KeyMaterial {
    pub encryption_key: Aes256Key32,
    pub mac_key: MacKey32,
    pub initialization_vector: Iv16,
}

impl KeyMaterial {
    /// Generate from the operating system CSPRNG.
    pub fn generate() -> Result<Self, IntuneWinError> {
        let mut rng = OsRng;
        let mut encryption_key = [0u8; ENCRYPTION_KEY_LEN];
        let mut mac_key = [0u8; MAC_KEY_LEN];
        let mut iv = [0u8; IV_LEN];
        for buf in [&mut encryption_key[..], &mut mac_key[..], &mut iv[..]] {
            rng.try_fill_bytes(buf).map_err(|e| {
                IntuneWinError::InvalidKeyMaterial(format!("OS random source failed: {e}"))
            })?;
        }
        Ok(Self::from_parts(encryption_key, mac_key, iv))
    }

    /// Generate from a caller-supplied CSPRNG.
    pub fn generate_with<G>(rng: &mut G) -> Self
    where
        G: CryptoRng + ?Sized,
    {
        let mut encryption_key = [0u8; ENCRYPTION_KEY_LEN];
        let mut mac_key = [0u8; MAC_KEY_LEN];
        let mut iv = [0u8; IV_LEN];
        rng.fill_bytes(&mut encryption_key);
        rng.fill_bytes(&mut mac_key);
        rng.fill_bytes(&mut iv);
        Self::from_parts(encryption_key, mac_key, iv)
    }

    fn from_parts(
        encryption_key: [u8; ENCRYPTION_KEY_LEN],
        mac_key: [u8; MAC_KEY_LEN],
        iv: [u8; IV_LEN],
    ) -> Self {
        Self {
            encryption_key: Aes256Key32::new(encryption_key),
            mac_key: MacKey32::new(mac_key),
            initialization_vector: Iv16::new(iv),
        }
    }
}
