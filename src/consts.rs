//! # Constants
//!
//! Fixed values of the `.intunewin` format: byte layout of the encrypted
//! content entry, key material sizes, archive paths and the identifiers
//! written into the metadata record.

/// Size of the buffer used by every streaming pass (digest, cipher, MAC).
///
/// 2 MiB bounds peak memory while keeping the per-call overhead of the
/// hash and cipher updates negligible.
pub const DEFAULT_CHUNK_SIZE: usize = 2 * 1024 * 1024;

/// AES block size in bytes.
pub const AES_BLOCK_LEN: usize = 16;

/// AES-256 key length in bytes.
pub const ENCRYPTION_KEY_LEN: usize = 32;

/// HMAC-SHA256 key length in bytes.
pub const MAC_KEY_LEN: usize = 32;

/// CBC initialization vector length in bytes.
pub const IV_LEN: usize = 16;

/// HMAC-SHA256 tag length in bytes.
pub const MAC_LEN: usize = 32;

/// SHA-256 digest length in bytes.
pub const DIGEST_LEN: usize = 32;

/// Offset of the cleartext IV copy inside the content entry.
pub const IV_OFFSET: u64 = MAC_LEN as u64;

/// Length of the content entry header: `[mac:32][iv:16]`.
pub const HEADER_LEN: usize = MAC_LEN + IV_LEN;

/// Archive path of the metadata record.
pub const METADATA_ENTRY_PATH: &str = "IntuneWinPackage/Metadata/Detection.xml";

/// Archive directory holding the encrypted content entry.
pub const CONTENTS_DIR: &str = "IntuneWinPackage/Contents";

/// Content file name used when the caller does not pick one.
pub const DEFAULT_CONTENT_FILE_NAME: &str = "IntunePackage.intunewin";

/// `ToolVersion` attribute written on new packages.
pub const TOOL_VERSION: &str = "1.4.0.0";

/// Encryption profile tag written on new packages.
pub const PROFILE_IDENTIFIER: &str = "ProfileVersion1";

/// Digest algorithm identifier stored next to the content digest.
pub const DIGEST_ALGORITHM: &str = "SHA256";

/// Content entries at or above this size need ZIP64 records.
pub const ZIP64_THRESHOLD: u64 = u32::MAX as u64;
