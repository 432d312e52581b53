//! # Error Types
//!
//! All operations return [`Result<T, IntuneWinError>`](IntuneWinError).
//!
//! Failures that come from reading a foreign or damaged package are wrapped
//! in [`IntuneWinError::InvalidContainer`] at the [`ContainerFile`] boundary,
//! so open/extract failures share one kind and differ only by their cause.
//! Local misuse (bad key lengths at embed time) surfaces unwrapped.
//!
//! [`ContainerFile`]: crate::ContainerFile

use thiserror::Error;

/// The error type for all package operations.
#[derive(Error, Debug)]
pub enum IntuneWinError {
    /// The file is not a usable package.
    ///
    /// Always carries the structural cause: a missing entry, an unreadable
    /// archive, unparsable metadata, or a ciphertext that fails to decode.
    #[error("malformed IntuneWin package: {0}")]
    InvalidContainer(#[source] Box<IntuneWinError>),

    /// Key, IV or MAC key is missing or has the wrong length.
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// The cipher could not finalize (truncated input, bad padding) or an
    /// opt-in MAC check failed.
    #[error("corrupt ciphertext: {0}")]
    CorruptCiphertext(String),

    /// The archive has no entry at the given path.
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    /// The backing ZIP structure could not be read or written.
    #[error("archive error: {0}")]
    ArchiveCorrupt(#[source] zip::result::ZipError),

    /// The metadata record could not be parsed or serialized.
    #[error("metadata error: {0}")]
    Metadata(String),

    /// The operation was cancelled through its [`CancelToken`](crate::CancelToken).
    #[error("operation cancelled")]
    Cancelled,

    /// I/O error on the payload, the sink, or the backing storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntuneWinError {
    /// Wrap `self` as the cause of an [`InvalidContainer`](Self::InvalidContainer).
    ///
    /// Errors that are already `InvalidContainer`, and cancellations, are
    /// returned as they are.
    pub fn into_invalid_container(self) -> Self {
        match self {
            Self::InvalidContainer(_) | Self::Cancelled => self,
            other => Self::InvalidContainer(Box::new(other)),
        }
    }

    /// The innermost error, looking through `InvalidContainer` wrappers.
    pub fn root_cause(&self) -> &IntuneWinError {
        let mut current = self;
        while let Self::InvalidContainer(inner) = current {
            current = inner;
        }
        current
    }

    pub fn is_invalid_container(&self) -> bool {
        matches!(self, Self::InvalidContainer(_))
    }
}

impl From<zip::result::ZipError> for IntuneWinError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => Self::Io(io),
            other => Self::ArchiveCorrupt(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_is_idempotent() {
        let err = IntuneWinError::EntryNotFound("a".into())
            .into_invalid_container()
            .into_invalid_container();
        assert!(err.is_invalid_container());
        assert!(matches!(err.root_cause(), IntuneWinError::EntryNotFound(_)));
    }

    #[test]
    fn cancellation_is_never_wrapped() {
        let err = IntuneWinError::Cancelled.into_invalid_container();
        assert!(matches!(err, IntuneWinError::Cancelled));
    }

    #[test]
    fn display_includes_cause() {
        let err = IntuneWinError::CorruptCiphertext("bad padding".into()).into_invalid_container();
        assert_eq!(
            err.to_string(),
            "malformed IntuneWin package: corrupt ciphertext: bad padding"
        );
    }
}
