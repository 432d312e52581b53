//! src/builders/container_builder.rs
//! Fluent Create API for new packages.

use crate::builders::ContainerOptions;
use crate::consts::DEFAULT_CONTENT_FILE_NAME;
use crate::container::ContainerFile;
use crate::crypto::rng::KeyMaterial;
use crate::envelope::Storage;
use crate::error::IntuneWinError;
use crate::metadata::ContentInfo;
use rand::CryptoRng;
use std::fs::File;
use std::path::Path;

/// Builder for a new package.
///
/// Only the display name is required. The content file name defaults to
/// [`DEFAULT_CONTENT_FILE_NAME`]; description and setup file default to
/// empty.
///
/// ```no_run
/// use intunewin_rs::{ContainerBuilder, ContainerOptions};
///
/// let mut package = ContainerBuilder::new("App")
///     .content_file_name("payload.bin")
///     .setup_file("run.cmd")
///     .options(ContainerOptions::new().with_verify_mac(true))
///     .create("App.intunewin")?;
/// package.embed_path("payload.zip")?;
/// # Ok::<(), intunewin_rs::IntuneWinError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ContainerBuilder {
    info: ContentInfo,
    options: ContainerOptions,
}

impl ContainerBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: ContentInfo {
                name: name.into(),
                description: String::new(),
                content_file_name: DEFAULT_CONTENT_FILE_NAME.to_string(),
                setup_file: String::new(),
            },
            options: ContainerOptions::default(),
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.info.description = description.into();
        self
    }

    /// Name of the encrypted entry under `IntuneWinPackage/Contents/`.
    #[must_use]
    pub fn content_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.info.content_file_name = file_name.into();
        self
    }

    #[must_use]
    pub fn setup_file(mut self, setup_file: impl Into<String>) -> Self {
        self.info.setup_file = setup_file.into();
        self
    }

    #[must_use]
    pub fn options(mut self, options: ContainerOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn content_info(&self) -> &ContentInfo {
        &self.info
    }

    /// Create the package at `path` with keys from the OS generator.
    /// An existing file at `path` is replaced.
    pub fn create(self, path: impl AsRef<Path>) -> Result<ContainerFile<File>, IntuneWinError> {
        let keys = KeyMaterial::generate()?;
        ContainerFile::create_with(path.as_ref(), self.info, keys, self.options)
    }

    /// Same as [`create`](Self::create), drawing keys from `rng`.
    pub fn create_with_rng<G>(
        self,
        path: impl AsRef<Path>,
        rng: &mut G,
    ) -> Result<ContainerFile<File>, IntuneWinError>
    where
        G: CryptoRng + ?Sized,
    {
        let keys = KeyMaterial::generate_with(rng);
        ContainerFile::create_with(path.as_ref(), self.info, keys, self.options)
    }

    /// Create the package inside `storage`, discarding its current bytes.
    pub fn create_in<S: Storage>(self, storage: S) -> Result<ContainerFile<S>, IntuneWinError> {
        let keys = KeyMaterial::generate()?;
        ContainerFile::create_in_with(storage, self.info, keys, self.options)
    }

    pub fn create_in_with_rng<S, G>(
        self,
        storage: S,
        rng: &mut G,
    ) -> Result<ContainerFile<S>, IntuneWinError>
    where
        S: Storage,
        G: CryptoRng + ?Sized,
    {
        let keys = KeyMaterial::generate_with(rng);
        ContainerFile::create_in_with(storage, self.info, keys, self.options)
    }
}
