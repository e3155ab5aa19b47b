//! Workflow orchestration.
//!
//! [`Engine`] composes the file codec, the tree walker, and the
//! external collaborators into the six user-facing operations. Every
//! operation follows the same destructive-move cleanup policy: the
//! losing side is deleted once the outcome is known, so a successful
//! encrypt removes the plaintext source and a failed one removes the
//! partial target.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{error, info, warn};

use crate::codec::{Direction, FileCodec};
use crate::config::Config;
use crate::error::Result;
use crate::external::{Archiver, CommandBrowser, CommandEditor, Editor, FolderBrowser, TarArchiver};
use crate::kdf::KdfParams;
use crate::util::{remove_path, remove_path_quiet};
use crate::walker::{self, OpDescriptor};

/// The six user-facing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Encrypt a file or directory into the encrypt store
    Encrypt,
    /// Decrypt a file or directory into the decrypt store
    Decrypt,
    /// Decrypt, edit interactively, re-encrypt, delete the scratch
    TempEdit,
    /// Compress into an archive, then encrypt the archive
    ArchiveEncrypt,
    /// Decrypt an archive, then extract it
    ArchiveDecrypt,
    /// ArchiveDecrypt, edit interactively, ArchiveEncrypt back
    ArchiveTempEdit,
}

/// Crypto orchestration engine.
///
/// Strictly sequential: callers must not start a second operation
/// before the previous one completes.
pub struct Engine {
    config: Config,
    codec: FileCodec,
    archiver: Box<dyn Archiver>,
    editor: Box<dyn Editor>,
    browser: Box<dyn FolderBrowser>,
}

impl Engine {
    /// Build an engine with the default process-backed collaborators.
    ///
    /// Fails with a fatal [`crate::VaultError::CryptoInit`] if the KDF
    /// parameters are rejected by the backend; callers abort startup.
    pub fn new(config: Config) -> Result<Self> {
        let archiver = Box::new(TarArchiver::new(
            &config.compress_store,
            &config.decompress_store,
        ));
        let editor = Box::new(CommandEditor::new(config.editor.clone()));
        let browser = Box::new(CommandBrowser::new(config.browser.clone()));
        Self::with_collaborators(config, KdfParams::moderate(), archiver, editor, browser)
    }

    /// Build an engine with explicit collaborators and KDF parameters.
    pub fn with_collaborators(
        config: Config,
        params: KdfParams,
        archiver: Box<dyn Archiver>,
        editor: Box<dyn Editor>,
        browser: Box<dyn FolderBrowser>,
    ) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            config,
            codec: FileCodec::new(params),
            archiver,
            editor,
            browser,
        })
    }

    /// Run one operation, reporting only success or failure.
    ///
    /// This is the entry point consumed by the shell/TUI layer; the
    /// typed error is logged rather than surfaced.
    pub async fn run(&self, operation: Operation, source: &Path, password: &str) -> bool {
        match self.try_run(operation, source, password).await {
            Ok(target) => {
                info!(?operation, target = %target.display(), "operation succeeded");
                true
            }
            Err(e) => {
                error!(?operation, source = %source.display(), error = %e, "operation failed");
                false
            }
        }
    }

    /// Run one operation, returning the primary artifact path.
    pub async fn try_run(
        &self,
        operation: Operation,
        source: &Path,
        password: &str,
    ) -> Result<PathBuf> {
        match operation {
            Operation::Encrypt => {
                self.crypt(Direction::Encrypt, self.enc_store(), source, password, true)
                    .await
            }
            Operation::Decrypt => {
                self.crypt(Direction::Decrypt, self.dec_store(), source, password, true)
                    .await
            }
            Operation::TempEdit => self.temp_edit(source, password).await,
            Operation::ArchiveEncrypt => self.archive_encrypt(source, password).await,
            Operation::ArchiveDecrypt => self.archive_decrypt(source, password).await,
            Operation::ArchiveTempEdit => self.archive_temp_edit(source, password).await,
        }
    }

    fn enc_store(&self) -> &Path {
        Path::new(&self.config.enc_store)
    }

    fn dec_store(&self) -> &Path {
        Path::new(&self.config.dec_store)
    }

    /// One plain encrypt or decrypt pass over a file or directory.
    async fn crypt(
        &self,
        direction: Direction,
        target_dir: &Path,
        source: &Path,
        password: &str,
        cleanup: bool,
    ) -> Result<PathBuf> {
        fs::create_dir_all(target_dir).await?;
        let desc = OpDescriptor {
            target_dir,
            source,
            password,
            cleanup,
        };

        if fs::metadata(source).await?.is_dir() {
            match direction {
                Direction::Encrypt => walker::encrypt_tree(&self.codec, &desc).await,
                Direction::Decrypt => walker::decrypt_tree(&self.codec, &desc).await,
            }
        } else {
            self.crypt_single(direction, &desc).await
        }
    }

    async fn crypt_single(&self, direction: Direction, desc: &OpDescriptor<'_>) -> Result<PathBuf> {
        let target = desc
            .target_dir
            .join(FileCodec::target_name(direction, desc.source)?);

        let outcome = match direction {
            Direction::Encrypt => self
                .codec
                .encode(desc.source, &target, desc.password)
                .await
                .map(|_| ()),
            Direction::Decrypt => self.codec.decode(desc.source, &target, desc.password).await,
        };

        match outcome {
            Ok(()) => {
                if desc.cleanup {
                    remove_path(desc.source).await?;
                }
                Ok(target)
            }
            Err(e) => {
                // Never leave a partially written artifact behind
                remove_path_quiet(&target).await;
                Err(e)
            }
        }
    }

    /// Decrypt into scratch, hand off to the editor or browser, then
    /// re-encrypt and delete the scratch.
    async fn temp_edit(&self, source: &Path, password: &str) -> Result<PathBuf> {
        let scratch = self
            .crypt(Direction::Decrypt, self.dec_store(), source, password, true)
            .await?;

        self.edit_interactively(&scratch).await?;

        self.crypt(Direction::Encrypt, self.enc_store(), &scratch, password, true)
            .await
    }

    /// Compress the source, then encrypt the resulting archive. The
    /// archive intermediate is the cleanup target, so the original
    /// source survives.
    async fn archive_encrypt(&self, source: &Path, password: &str) -> Result<PathBuf> {
        let archive = self.archiver.compress(source).await?;
        self.crypt(Direction::Encrypt, self.enc_store(), &archive, password, true)
            .await
    }

    /// Decrypt to an archive, then extract it. The encrypted source and
    /// the archive intermediate are both consumed on success.
    async fn archive_decrypt(&self, source: &Path, password: &str) -> Result<PathBuf> {
        let archive = self
            .crypt(Direction::Decrypt, self.dec_store(), source, password, true)
            .await?;

        let extracted = match self.archiver.decompress(&archive).await {
            Ok(extracted) => extracted,
            Err(e) => {
                warn!(archive = %archive.display(), "extraction failed, keeping archive");
                return Err(e);
            }
        };
        remove_path(&archive).await?;
        Ok(extracted)
    }

    /// Archive-aware temporary edit: extract, edit, re-archive, and
    /// remove the extracted scratch tree.
    async fn archive_temp_edit(&self, source: &Path, password: &str) -> Result<PathBuf> {
        let scratch = self.archive_decrypt(source, password).await?;

        self.edit_interactively(&scratch).await?;

        let target = self.archive_encrypt(&scratch, password).await?;
        remove_path(&scratch).await?;
        Ok(target)
    }

    async fn edit_interactively(&self, path: &Path) -> Result<()> {
        if fs::metadata(path).await?.is_dir() {
            self.browser.browse(path).await
        } else {
            self.editor.edit(path).await
        }
    }
}
