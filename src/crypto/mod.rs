// src/crypto/mod.rs

//! Low-level crypto primitives.
//!
//! - [`digest`]: streaming SHA-256 and HMAC-SHA256 with position restore
//! - [`cipher`]: AES-256-CBC write-side transforms (PKCS#7)
//! - [`rng`]: fresh key material from a CSPRNG
//!
//! Every primitive is a free function or a short-lived value built per call;
//! nothing here holds shared state between packages.

pub mod cipher;
pub mod digest;
pub mod rng;

pub use cipher::{cipher_stream, CbcDecryptor, CbcEncryptor, CipherDirection, CipherStream};
pub use digest::{hmac_sha256_stream, sha256_stream};
pub use rng::KeyMaterial;
