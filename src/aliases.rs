//! # Secure-Gate Type Aliases
//!
//! Fixed-size buffers for key material, wrapped in [`secure-gate`](https://github.com/Slurp9187/secure-gate)
//! so secrets are zeroized on drop and only reachable through an explicit
//! `.expose_secret()`.
//!
//! ## Type Categories
//!
//! ### HMAC Primitives
//! - [`HmacSha256`] - HMAC-SHA256 over the content entry
//!
//! ### Generic Secure Buffers
//! - [`SpanBuffer<N>`] - Generic secure stack buffer for any size `N`
//!
//! ### Semantic Fixed-Size Types
//! - [`Block16`] - 16-byte AES block
//! - [`Aes256Key32`] - 32-byte AES-256 content key
//! - [`MacKey32`] - 32-byte HMAC-SHA256 key
//! - [`Iv16`] - 16-byte CBC initialization vector
//!
//! ### Public Values
//! - [`Digest32`] - SHA-256 digest of the plaintext
//! - [`Mac32`] - HMAC-SHA256 tag of the content entry
//!
//! Digests and tags are not secret; they are plain arrays.

use hmac::Hmac;
use sha2::Sha256;

pub type HmacSha256 = Hmac<Sha256>;

// ─────────────────────────────────────────────────────────────────────────────
// SpanBuffer: generic secure stack buffer (direct alias to secure-gate's Fixed)
// ─────────────────────────────────────────────────────────────────────────────
pub type SpanBuffer<const N: usize> = secure_gate::Fixed<[u8; N]>;

pub type Block16 = SpanBuffer<16>; // one AES block
pub type Aes256Key32 = SpanBuffer<32>; // content encryption key
pub type MacKey32 = SpanBuffer<32>; // HMAC key
pub type Iv16 = SpanBuffer<16>; // CBC IV

// ─────────────────────────────────────────────────────────────────────────────
// Public values
// ─────────────────────────────────────────────────────────────────────────────
pub type Digest32 = [u8; 32];
pub type Mac32 = [u8; 32];
