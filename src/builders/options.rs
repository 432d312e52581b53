//! src/builders/options.rs
//! Per-handle tuning for [`ContainerFile`](crate::ContainerFile).

use crate::cancel::CancelToken;
use crate::codec::StreamConfig;
use crate::consts::{AES_BLOCK_LEN, DEFAULT_CHUNK_SIZE};
use std::path::{Path, PathBuf};

/// Runtime options for a container handle.
///
/// Defaults: 2 MiB chunks, staging files in the OS temp dir, no MAC check on
/// extract, no cancellation.
///
/// # Thread Safety
///
/// `Send + Sync`. A [`CancelToken`] set here can be cancelled from any
/// thread while an embed or extract is running.
#[derive(Debug, Clone)]
pub struct ContainerOptions {
    chunk_size: usize,
    temp_dir: Option<PathBuf>,
    verify_mac: bool,
    cancel_token: Option<CancelToken>,
}

impl ContainerOptions {
    #[must_use]
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            temp_dir: None,
            verify_mac: false,
            cancel_token: None,
        }
    }

    /// Buffer size for the streaming passes (minimum one AES block).
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(AES_BLOCK_LEN);
        self
    }

    /// Directory for scoped staging files.
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Check the content MAC before every extract.
    #[must_use]
    pub fn with_verify_mac(mut self, verify: bool) -> Self {
        self.verify_mac = verify;
        self
    }

    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[must_use]
    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_deref()
    }

    #[must_use]
    pub const fn verify_mac(&self) -> bool {
        self.verify_mac
    }

    #[must_use]
    pub fn cancel_token(&self) -> Option<&CancelToken> {
        self.cancel_token.as_ref()
    }

    /// The subset the codec needs.
    pub(crate) fn stream_config(&self) -> StreamConfig {
        let config = StreamConfig::default().with_chunk_size(self.chunk_size);
        match &self.cancel_token {
            Some(token) => config.with_cancel_token(token.clone()),
            None => config,
        }
    }
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self::new()
    }
}
