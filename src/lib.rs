// src/lib.rs

pub mod aliases;
#[cfg(feature = "batch-ops")]
pub mod batch_ops;
pub mod builders;
pub mod cancel;
pub mod codec;
pub mod consts;
pub mod container;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod header;
pub mod metadata;
pub mod utils;

// High-level API
pub use builders::{ContainerBuilder, ContainerOptions};
pub use cancel::CancelToken;
pub use container::ContainerFile;
pub use error::IntuneWinError;
pub use metadata::{ContentInfo, EncryptionInfo, PackageMetadata};

// Content entry codec, for callers that manage the archive themselves
pub use codec::{decode, encode, verify_mac, CodecKeys, EncodeSummary, StreamConfig};
pub use header::{read_content_header, ContentHeader};

pub use envelope::Storage;

#[cfg(feature = "batch-ops")]
pub use batch_ops::{embed_batch, extract_batch};
