//! # Container File
//!
//! [`ContainerFile`] is one open package: the envelope, the metadata record
//! it owns, and the options it runs with.
//!
//! ## Lifecycle
//!
//! - **Created** ([`ContainerBuilder`](crate::ContainerBuilder) or
//!   [`ContainerFile::create`]): fresh keys, initial metadata written.
//! - **Opened** ([`ContainerFile::open`], [`ContainerFile::from_storage`]):
//!   metadata parsed from the envelope.
//! - **Ready**: any number of [`embed`](ContainerFile::embed) and
//!   [`extract`](ContainerFile::extract) calls.
//! - **Closed**: [`close`](ContainerFile::close) consumes the handle.
//!   Dropping it releases the storage as well.
//!
//! The metadata record is only changed through the handle, and every change
//! is persisted before the call returns.
//!
//! ## Errors
//!
//! Open, extract and header reads wrap every failure in
//! [`IntuneWinError::InvalidContainer`]. Create and embed return errors
//! unwrapped, apart from an embed into a record without a content file
//! name. Cancellation is never wrapped.

use crate::builders::ContainerOptions;
use crate::codec;
use crate::consts::METADATA_ENTRY_PATH;
use crate::crypto::rng::KeyMaterial;
use crate::envelope::{self, EntryUpdate, Envelope, OpenMode, Storage};
use crate::error::IntuneWinError;
use crate::header::{read_content_header, ContentHeader};
use crate::metadata::{ContentInfo, PackageMetadata};
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, info, warn};
use zip::CompressionMethod;

/// An open `.intunewin` package.
///
/// Not safe for overlapping calls; `embed` and `extract` take `&mut self`.
/// Different handles are independent and may run on different threads.
pub struct ContainerFile<S: Storage = File> {
    envelope: Envelope<S>,
    metadata: PackageMetadata,
    options: ContainerOptions,
}

impl ContainerFile<File> {
    /// Create a package at `path` with fresh keys from the OS generator.
    /// An existing file at `path` is replaced.
    pub fn create(path: impl AsRef<Path>, info: ContentInfo) -> Result<Self, IntuneWinError> {
        let keys = KeyMaterial::generate()?;
        Self::create_with(path.as_ref(), info, keys, ContainerOptions::default())
    }

    pub(crate) fn create_with(
        path: &Path,
        info: ContentInfo,
        keys: KeyMaterial,
        options: ContainerOptions,
    ) -> Result<Self, IntuneWinError> {
        let envelope = Envelope::open_path(path, OpenMode::Create)?;
        Self::initialize(envelope, info, keys, options)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, IntuneWinError> {
        Self::open_with(path, ContainerOptions::default())
    }

    /// Open an existing package at `path`.
    ///
    /// # Errors
    ///
    /// [`IntuneWinError::InvalidContainer`] wrapping the cause: the file is
    /// missing or unreadable, is not a ZIP archive, has no metadata entry,
    /// or its metadata does not parse.
    pub fn open_with(
        path: impl AsRef<Path>,
        options: ContainerOptions,
    ) -> Result<Self, IntuneWinError> {
        let path = path.as_ref();
        let envelope = Envelope::open_path(path, OpenMode::Open)
            .map_err(IntuneWinError::into_invalid_container)?;
        let container = Self::load(envelope, options)?;
        info!(path = %path.display(), name = %container.metadata.name, "package opened");
        Ok(container)
    }
}

impl<S: Storage> ContainerFile<S> {
    /// Open an existing package held in `storage`.
    pub fn from_storage(storage: S, options: ContainerOptions) -> Result<Self, IntuneWinError> {
        let envelope = Envelope::new(storage).map_err(IntuneWinError::into_invalid_container)?;
        Self::load(envelope, options)
    }

    /// Create a package inside `storage` with fresh keys from the OS
    /// generator. Whatever `storage` held is discarded.
    pub fn create_in(storage: S, info: ContentInfo) -> Result<Self, IntuneWinError> {
        let keys = KeyMaterial::generate()?;
        Self::create_in_with(storage, info, keys, ContainerOptions::default())
    }

    pub(crate) fn create_in_with(
        mut storage: S,
        info: ContentInfo,
        keys: KeyMaterial,
        options: ContainerOptions,
    ) -> Result<Self, IntuneWinError> {
        storage.seek(SeekFrom::Start(0))?;
        storage.truncate(0)?;
        Self::initialize(Envelope::new(storage)?, info, keys, options)
    }

    fn initialize(
        envelope: Envelope<S>,
        info: ContentInfo,
        keys: KeyMaterial,
        options: ContainerOptions,
    ) -> Result<Self, IntuneWinError> {
        check_content_file_name(&info.content_file_name)?;
        let mut container = Self::assemble(envelope, PackageMetadata::new(info, keys), options);
        container.persist_metadata()?;
        info!(
            name = %container.metadata.name,
            content = %container.metadata.content_file_name,
            "package created"
        );
        Ok(container)
    }

    fn load(mut envelope: Envelope<S>, options: ContainerOptions) -> Result<Self, IntuneWinError> {
        let metadata = read_metadata(&mut envelope).map_err(IntuneWinError::into_invalid_container)?;
        debug!(
            name = %metadata.name,
            content = %metadata.content_file_name,
            size = metadata.unencrypted_content_size,
            "metadata loaded"
        );
        Ok(Self::assemble(envelope, metadata, options))
    }

    fn assemble(mut envelope: Envelope<S>, metadata: PackageMetadata, options: ContainerOptions) -> Self {
        envelope.set_temp_dir(options.temp_dir().map(Path::to_path_buf));
        Self {
            envelope,
            metadata,
            options,
        }
    }

    #[must_use]
    pub fn metadata(&self) -> &PackageMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn options(&self) -> &ContainerOptions {
        &self.options
    }

    /// Archive path of the content entry.
    #[must_use]
    pub fn content_entry_path(&self) -> String {
        envelope::content_entry_path(&self.metadata.content_file_name)
    }

    /// Whether any content has been embedded yet.
    pub fn has_content(&mut self) -> Result<bool, IntuneWinError> {
        let path = self.content_entry_path();
        self.envelope.contains(&path)
    }

    /// MAC and IV stored at the start of the content entry.
    pub fn content_header(&mut self) -> Result<ContentHeader, IntuneWinError> {
        let path = self.content_entry_path();
        self.envelope
            .read_entry(&path, |reader| read_content_header(reader))
            .map_err(IntuneWinError::into_invalid_container)
    }

    /// Encrypt `payload` (from its current position to EOF) into the content
    /// entry and update the metadata record to match.
    ///
    /// The new content and metadata replace the old pair in a single archive
    /// rebuild. On any failure the previous pair stays in place and the
    /// metadata entry is rewritten from the in-memory record.
    ///
    /// # Errors
    ///
    /// - [`IntuneWinError::Cancelled`] - the cancel token fired
    /// - [`IntuneWinError::InvalidContainer`] - the record has no content
    ///   file name; nothing is written
    /// - [`IntuneWinError::InvalidKeyMaterial`] - the record lacks a key
    /// - [`IntuneWinError::Io`] / [`IntuneWinError::ArchiveCorrupt`] - reading
    ///   the payload or rewriting the archive failed
    pub fn embed<R: Read + Seek + ?Sized>(&mut self, payload: &mut R) -> Result<(), IntuneWinError> {
        self.with_metadata_rewrite(|this| this.embed_seekable(payload))
    }

    /// [`embed`](Self::embed) for a single-pass source. The payload is
    /// spooled to a staging file first.
    pub fn embed_reader<R: Read + ?Sized>(&mut self, payload: &mut R) -> Result<(), IntuneWinError> {
        self.with_metadata_rewrite(|this| {
            let mut spool = envelope::staging_file(this.options.temp_dir())?;
            let spooled = io::copy(payload, &mut spool)?;
            spool.seek(SeekFrom::Start(0))?;
            debug!(bytes = spooled, "payload spooled");
            this.embed_seekable(&mut spool)
        })
    }

    pub fn embed_path(&mut self, path: impl AsRef<Path>) -> Result<(), IntuneWinError> {
        let path = path.as_ref();
        self.with_metadata_rewrite(|this| {
            let mut file = File::open(path)?;
            this.embed_seekable(&mut file)
        })
    }

    /// Decrypt the content entry into `sink`. Returns the number of
    /// plaintext bytes written.
    ///
    /// With [`ContainerOptions::with_verify_mac`] set, the MAC is checked
    /// before anything is written to `sink`.
    ///
    /// # Errors
    ///
    /// [`IntuneWinError::InvalidContainer`] wrapping the cause (no content
    /// entry, truncated header, bad padding, MAC mismatch, I/O), or
    /// [`IntuneWinError::Cancelled`].
    pub fn extract<W: Write + ?Sized>(&mut self, sink: &mut W) -> Result<u64, IntuneWinError> {
        self.extract_into(sink)
            .map_err(IntuneWinError::into_invalid_container)
    }

    /// [`extract`](Self::extract) into a file at `path`, created or
    /// truncated. A partial file is removed on failure.
    pub fn extract_path(&mut self, path: impl AsRef<Path>) -> Result<u64, IntuneWinError> {
        let path = path.as_ref();
        let mut file = File::create(path)?;
        let result = self.extract(&mut file).and_then(|n| {
            file.sync_all()?;
            Ok(n)
        });
        if result.is_err() {
            drop(file);
            if let Err(e) = fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "could not remove partial output");
            }
        }
        result
    }

    /// Flush and release the envelope, returning the backing storage.
    pub fn close(self) -> Result<S, IntuneWinError> {
        let storage = self.envelope.into_inner()?;
        info!(name = %self.metadata.name, "package closed");
        Ok(storage)
    }

    fn with_metadata_rewrite<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, IntuneWinError>,
    ) -> Result<T, IntuneWinError> {
        // A record from another producer may lack FileName
        check_content_file_name(&self.metadata.content_file_name)
            .map_err(IntuneWinError::into_invalid_container)?;
        let result = op(self);
        if let Err(err) = &result {
            debug!(error = %err, "embed failed, rewriting metadata");
            if let Err(save_err) = self.persist_metadata() {
                warn!(error = %save_err, "metadata rewrite after failed embed also failed");
            }
        }
        result
    }

    fn embed_seekable<R: Read + Seek + ?Sized>(&mut self, payload: &mut R) -> Result<(), IntuneWinError> {
        let config = self.options.stream_config();
        let mut staged = envelope::staging_file(self.options.temp_dir())?;

        let summary = {
            let keys = self.metadata.encryption_info.codec_keys()?;
            codec::encode(payload, &mut staged, &keys, &config)?
        };

        let saved = self.metadata.integrity();
        self.metadata.apply(&summary);
        if let Err(err) = self.swap_content(&mut staged, summary.encoded_len) {
            self.metadata.restore(saved);
            return Err(err);
        }

        info!(
            name = %self.metadata.name,
            plaintext_len = summary.plaintext_len,
            encoded_len = summary.encoded_len,
            "payload embedded"
        );
        Ok(())
    }

    /// Replace content and metadata entries in one rebuild.
    fn swap_content(&mut self, staged: &mut File, encoded_len: u64) -> Result<(), IntuneWinError> {
        let xml = self.metadata.to_xml()?;
        let content_path = self.content_entry_path();
        let mut xml_bytes = xml.as_bytes();
        staged.seek(SeekFrom::Start(0))?;

        self.envelope.replace_entries(&mut [
            EntryUpdate {
                name: &content_path,
                content: staged,
                size_hint: encoded_len,
                compression: CompressionMethod::Stored,
            },
            EntryUpdate {
                name: METADATA_ENTRY_PATH,
                content: &mut xml_bytes,
                size_hint: xml.len() as u64,
                compression: CompressionMethod::Deflated,
            },
        ])
    }

    fn persist_metadata(&mut self) -> Result<(), IntuneWinError> {
        let xml = self.metadata.to_xml()?;
        self.envelope.replace_entry(
            METADATA_ENTRY_PATH,
            &mut xml.as_bytes(),
            xml.len() as u64,
            CompressionMethod::Deflated,
        )
    }

    fn extract_into<W: Write + ?Sized>(&mut self, sink: &mut W) -> Result<u64, IntuneWinError> {
        check_content_file_name(&self.metadata.content_file_name)?;
        let config = self.options.stream_config();
        let path = self.content_entry_path();
        let keys = self.metadata.encryption_info.codec_keys()?;

        if self.options.verify_mac() {
            let expected = self.metadata.encryption_info.mac.as_ref();
            self.envelope.read_entry(&path, |reader| {
                codec::verify_mac(reader, keys.mac_key, expected, &config)
            })?;
            debug!(entry = %path, "content MAC verified");
        }

        let written = self.envelope.read_entry(&path, |reader| {
            let n = codec::decode(reader, &mut *sink, keys.encryption_key, keys.iv, &config)?;
            sink.flush()?;
            Ok(n)
        })?;

        if i64::try_from(written).ok() != Some(self.metadata.unencrypted_content_size) {
            warn!(
                written,
                recorded = self.metadata.unencrypted_content_size,
                "decoded length differs from recorded content size"
            );
        }
        info!(name = %self.metadata.name, bytes = written, "payload extracted");
        Ok(written)
    }
}

/// An empty name would address the `Contents` directory itself.
fn check_content_file_name(name: &str) -> Result<(), IntuneWinError> {
    if name.trim().is_empty() {
        return Err(IntuneWinError::Metadata(
            "content file name must not be empty".into(),
        ));
    }
    Ok(())
}

fn read_metadata<S: Storage>(envelope: &mut Envelope<S>) -> Result<PackageMetadata, IntuneWinError> {
    let xml = envelope.read_entry(METADATA_ENTRY_PATH, |reader| {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Ok(text)
    })?;
    PackageMetadata::from_xml(&xml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Cursor;

    fn info() -> ContentInfo {
        ContentInfo {
            name: "App".into(),
            description: String::new(),
            content_file_name: "payload.bin".into(),
            setup_file: "run.cmd".into(),
        }
    }

    fn in_memory(options: ContainerOptions) -> ContainerFile<Cursor<Vec<u8>>> {
        let keys = KeyMaterial::generate_with(&mut StdRng::seed_from_u64(7));
        ContainerFile::create_in_with(Cursor::new(Vec::<u8>::new()), info(), keys, options).unwrap()
    }

    #[test]
    fn new_package_has_metadata_but_no_content() {
        let mut package = in_memory(ContainerOptions::default());
        assert!(!package.has_content().unwrap());
        assert!(package.envelope.contains(METADATA_ENTRY_PATH).unwrap());
        assert_eq!(package.content_entry_path(), "IntuneWinPackage/Contents/payload.bin");
    }

    #[test]
    fn embed_then_extract_in_memory() {
        let mut package = in_memory(ContainerOptions::default().with_chunk_size(64));
        let payload: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        package.embed(&mut Cursor::new(payload.clone())).unwrap();

        let mut out = Vec::new();
        assert_eq!(package.extract(&mut out).unwrap(), 1000);
        assert_eq!(out, payload);
        assert_eq!(package.metadata().unencrypted_content_size, 1000);
    }

    #[test]
    fn cancelled_embed_keeps_previous_state() {
        let token = CancelToken::new();
        let mut package = in_memory(ContainerOptions::default().with_cancel_token(token.clone()));
        package.embed(&mut Cursor::new(b"first".to_vec())).unwrap();
        let mac_before = package.metadata().encryption_info.mac;

        token.cancel();
        let err = package.embed(&mut Cursor::new(vec![9u8; 4096])).unwrap_err();
        assert!(matches!(err, IntuneWinError::Cancelled));
        assert_eq!(package.metadata().encryption_info.mac, mac_before);

        token.reset();
        let mut out = Vec::new();
        package.extract(&mut out).unwrap();
        assert_eq!(out, b"first");
    }

    #[test]
    fn empty_content_file_name_is_rejected() {
        let keys = KeyMaterial::generate_with(&mut StdRng::seed_from_u64(1));
        let mut bad = info();
        bad.content_file_name = "  ".into();
        let result =
            ContainerFile::create_in_with(Cursor::new(Vec::<u8>::new()), bad, keys, ContainerOptions::default());
        assert!(matches!(result, Err(IntuneWinError::Metadata(_))));
    }
}
