//! # Envelope
//!
//! The ZIP archive around a package. It only ever creates or deletes two
//! entries: the metadata record and the content entry. Entries written by
//! other producers are copied through untouched.
//!
//! ZIP archives cannot delete entries in place, so a replacement rebuilds
//! the archive into a scoped temporary file (existing entries are raw-copied
//! without recompression), then swaps the result into the backing storage.
//! Nothing is visible until the swap, and the staging file is removed on
//! every exit path. A swap that fails part way leaves the previous archive
//! in the storage.

use crate::consts::{CONTENTS_DIR, ZIP64_THRESHOLD};
use crate::error::IntuneWinError;
use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Seekable, readable, writable, truncatable byte container backing an
/// envelope.
pub trait Storage: Read + Write + Seek {
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl Storage for File {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

impl Storage for Cursor<Vec<u8>> {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        let len = usize::try_from(len).map_err(io::Error::other)?;
        self.get_mut().truncate(len);
        if self.position() > len as u64 {
            self.set_position(len as u64);
        }
        Ok(())
    }
}

impl<S: Storage + ?Sized> Storage for &mut S {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        (**self).truncate(len)
    }
}

/// How [`Envelope::open_path`] treats the file at `path`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Start from an empty archive, discarding any existing file.
    Create,
    /// The file must exist and be a valid archive.
    Open,
    /// Open if present, otherwise start empty.
    OpenOrCreate,
}

/// One entry to stage in a [`Envelope::replace_entries`] rebuild.
pub(crate) struct EntryUpdate<'a> {
    pub name: &'a str,
    pub content: &'a mut dyn Read,
    /// Expected length; decides whether ZIP64 records are needed.
    pub size_hint: u64,
    pub compression: CompressionMethod,
}

/// Archive path of the content entry for `file_name`.
pub fn content_entry_path(file_name: &str) -> String {
    format!("{CONTENTS_DIR}/{file_name}")
}

/// A ZIP archive over some [`Storage`].
pub struct Envelope<S: Storage> {
    storage: S,
    temp_dir: Option<PathBuf>,
}

impl Envelope<File> {
    /// Open or create the archive at `path` according to `mode`.
    ///
    /// # Errors
    ///
    /// - [`IntuneWinError::Io`] - the file cannot be opened or created
    /// - [`IntuneWinError::ArchiveCorrupt`] - the file exists, is not empty,
    ///   and is not a ZIP archive
    pub fn open_path(path: &Path, mode: OpenMode) -> Result<Self, IntuneWinError> {
        let mut options = OpenOptions::new();
        options.read(true).write(true);
        match mode {
            OpenMode::Create => options.create(true).truncate(true),
            OpenMode::Open => &mut options,
            OpenMode::OpenOrCreate => options.create(true),
        };
        let file = options.open(path)?;
        debug!(path = %path.display(), ?mode, "envelope file opened");
        Self::new(file)
    }
}

impl<S: Storage> Envelope<S> {
    /// Wrap `storage`. Empty storage is an empty archive; anything else must
    /// parse as ZIP.
    pub fn new(mut storage: S) -> Result<Self, IntuneWinError> {
        if storage_len(&mut storage)? > 0 {
            ZipArchive::new(&mut storage).map_err(IntuneWinError::from)?;
        }
        Ok(Self {
            storage,
            temp_dir: None,
        })
    }

    /// Directory for staging files; `None` uses the OS temp dir.
    pub fn set_temp_dir(&mut self, dir: Option<PathBuf>) {
        self.temp_dir = dir;
    }

    pub fn is_empty(&mut self) -> Result<bool, IntuneWinError> {
        Ok(storage_len(&mut self.storage)? == 0)
    }

    pub fn contains(&mut self, name: &str) -> Result<bool, IntuneWinError> {
        if self.is_empty()? {
            return Ok(false);
        }
        let archive = self.archive()?;
        let found = archive.file_names().any(|n| n == name);
        Ok(found)
    }

    /// Run `f` over a reader of entry `name`.
    ///
    /// Fails with [`IntuneWinError::EntryNotFound`] if the entry is absent.
    pub fn read_entry<T, F>(&mut self, name: &str, f: F) -> Result<T, IntuneWinError>
    where
        F: FnOnce(&mut dyn Read) -> Result<T, IntuneWinError>,
    {
        if self.is_empty()? {
            return Err(IntuneWinError::EntryNotFound(name.to_string()));
        }
        let mut archive = self.archive()?;
        let mut entry = match archive.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(IntuneWinError::EntryNotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        debug!(entry = name, size = entry.size(), "reading entry");
        f(&mut entry)
    }

    /// Read entry `name` fully into memory.
    pub fn read_entry_to_vec(&mut self, name: &str) -> Result<Vec<u8>, IntuneWinError> {
        self.read_entry(name, |reader| {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf)?;
            Ok(buf)
        })
    }

    /// Replace (or create) a single entry.
    pub(crate) fn replace_entry<R: Read>(
        &mut self,
        name: &str,
        content: &mut R,
        size_hint: u64,
        compression: CompressionMethod,
    ) -> Result<(), IntuneWinError> {
        self.replace_entries(&mut [EntryUpdate {
            name,
            content,
            size_hint,
            compression,
        }])
    }

    /// Replace (or create) several entries in one rebuild.
    ///
    /// Existing entries with the same names are dropped; all other entries
    /// are copied as they are. The new archive only replaces the old one
    /// once it has been fully written.
    pub(crate) fn replace_entries(&mut self, updates: &mut [EntryUpdate<'_>]) -> Result<(), IntuneWinError> {
        let mut staged = self.staging_file()?;
        let has_entries = !self.is_empty()?;

        {
            let mut writer = ZipWriter::new(&mut staged);

            if has_entries {
                let mut archive = ZipArchive::new(&mut self.storage)?;
                for i in 0..archive.len() {
                    let entry = archive.by_index_raw(i)?;
                    if updates.iter().any(|u| u.name == entry.name()) {
                        debug!(entry = entry.name(), "dropping replaced entry");
                        continue;
                    }
                    writer.raw_copy_file(entry)?;
                }
            }

            for update in updates.iter_mut() {
                let options = SimpleFileOptions::default()
                    .compression_method(update.compression)
                    .large_file(update.size_hint >= ZIP64_THRESHOLD);
                writer.start_file(update.name, options)?;
                let written = io::copy(&mut update.content, &mut writer)?;
                debug!(entry = update.name, bytes = written, "entry staged");
            }

            writer.finish()?;
        }

        self.swap_in(&mut staged)
    }

    /// Flush and hand back the backing storage.
    pub fn into_inner(mut self) -> Result<S, IntuneWinError> {
        self.storage.flush()?;
        Ok(self.storage)
    }

    fn archive(&mut self) -> Result<ZipArchive<&mut S>, IntuneWinError> {
        self.storage.seek(SeekFrom::Start(0))?;
        Ok(ZipArchive::new(&mut self.storage)?)
    }

    fn staging_file(&self) -> Result<File, IntuneWinError> {
        staging_file(self.temp_dir.as_deref())
    }

    /// Move the staged archive into the backing storage.
    ///
    /// The staged bytes are first appended behind the live archive, which
    /// claims all the space the swap needs without touching it. A failure
    /// there trims the tail again. Only then is the front overwritten; a
    /// failure in that phase writes the backup of the live archive back.
    fn swap_in(&mut self, staged: &mut File) -> Result<(), IntuneWinError> {
        let live_len = storage_len(&mut self.storage)?;
        let mut backup = self.staging_file()?;
        self.storage.seek(SeekFrom::Start(0))?;
        io::copy(&mut (&mut self.storage).take(live_len), &mut backup)?;

        if let Err(err) = self.write_at(staged, live_len) {
            warn!(error = %err, "staging archive did not fit, keeping the live one");
            if let Err(trim_err) = self.storage.truncate(live_len) {
                warn!(error = %trim_err, "could not trim the partial tail");
            }
            return Err(err);
        }
        if live_len == 0 {
            debug!("archive written to empty storage");
            return Ok(());
        }

        let swapped = self.write_at(staged, 0).and_then(|len| {
            self.storage.truncate(len)?;
            self.storage.flush()?;
            Ok(len)
        });
        match swapped {
            Ok(len) => {
                debug!(bytes = len, "archive swapped in");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "swap failed, writing back the previous archive");
                let restored = self.write_at(&mut backup, 0).and_then(|len| {
                    self.storage.truncate(len)?;
                    self.storage.flush()?;
                    Ok(len)
                });
                if let Err(restore_err) = restored {
                    warn!(error = %restore_err, "previous archive could not be restored");
                }
                Err(err)
            }
        }
    }

    /// Copy all of `source` into the storage at `offset`.
    fn write_at(&mut self, source: &mut File, offset: u64) -> Result<u64, IntuneWinError> {
        source.seek(SeekFrom::Start(0))?;
        self.storage.seek(SeekFrom::Start(offset))?;
        let len = io::copy(source, &mut self.storage)?;
        self.storage.flush()?;
        Ok(len)
    }
}

/// Anonymous scratch file in `dir` (or the OS temp dir), deleted when dropped.
pub(crate) fn staging_file(dir: Option<&Path>) -> Result<File, IntuneWinError> {
    let file = match dir {
        Some(dir) => tempfile::tempfile_in(dir)?,
        None => tempfile::tempfile()?,
    };
    Ok(file)
}

fn storage_len<S: Seek + ?Sized>(storage: &mut S) -> Result<u64, IntuneWinError> {
    let len = storage.seek(SeekFrom::End(0))?;
    storage.seek(SeekFrom::Start(0))?;
    Ok(len)
}
