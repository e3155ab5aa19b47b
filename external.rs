//! External collaborator interfaces.
//!
//! The engine delegates archiving and interactive editing to external
//! processes. Each collaborator is a trait so tests can substitute
//! scripted implementations; the defaults shell out to `tar` and to the
//! configured editor/browser, blocking until the process exits.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Result, VaultError};
use crate::util::remove_path_quiet;

/// Compresses a path into an archive and extracts archives back.
///
/// Implementations stage their outputs in their own directories and
/// clean up that staging on failure.
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Compress `source` into an archive, returning the archive path.
    async fn compress(&self, source: &Path) -> Result<PathBuf>;
    /// Extract `archive`, returning the extracted path.
    async fn decompress(&self, archive: &Path) -> Result<PathBuf>;
}

/// Blocking external text editor.
#[async_trait]
pub trait Editor: Send + Sync {
    async fn edit(&self, file: &Path) -> Result<()>;
}

/// Blocking external folder browser for directory-rooted edits.
#[async_trait]
pub trait FolderBrowser: Send + Sync {
    async fn browse(&self, dir: &Path) -> Result<()>;
}

/// Archive extension produced by [`TarArchiver`]
pub const ARCHIVE_EXT: &str = "tar.gz";

/// Archiver backed by the system `tar` binary with gzip compression.
pub struct TarArchiver {
    compress_store: PathBuf,
    decompress_store: PathBuf,
}

impl TarArchiver {
    pub fn new(compress_store: impl Into<PathBuf>, decompress_store: impl Into<PathBuf>) -> Self {
        Self {
            compress_store: compress_store.into(),
            decompress_store: decompress_store.into(),
        }
    }

    /// Path the extracted content will occupy: the archive file name
    /// with both `.gz` and `.tar` stripped, under the decompress store.
    fn extracted_path(&self, archive: &Path) -> Result<PathBuf> {
        let name = archive
            .file_name()
            .map(Path::new)
            .and_then(|n| n.file_stem())
            .map(Path::new)
            .and_then(|n| n.file_stem())
            .ok_or_else(|| VaultError::archive(format!("bad archive name: {}", archive.display())))?;
        Ok(self.decompress_store.join(name))
    }
}

#[async_trait]
impl Archiver for TarArchiver {
    async fn compress(&self, source: &Path) -> Result<PathBuf> {
        fs::create_dir_all(&self.compress_store).await?;
        let name = source
            .file_name()
            .ok_or_else(|| VaultError::archive(format!("bad source name: {}", source.display())))?;
        let mut archive_name = name.to_os_string();
        archive_name.push(".");
        archive_name.push(ARCHIVE_EXT);
        let archive = self.compress_store.join(archive_name);

        // Archive relative to the source's parent so the stored paths
        // start at the source's own name
        let parent = source.parent().unwrap_or_else(|| Path::new("."));
        debug!(source = %source.display(), archive = %archive.display(), "compressing");
        let status = Command::new("tar")
            .arg("-czf")
            .arg(&archive)
            .arg("-C")
            .arg(parent)
            .arg(name)
            .status()
            .await
            .map_err(|e| VaultError::archive(format!("failed to launch tar: {e}")))?;

        if !status.success() {
            remove_path_quiet(&archive).await;
            return Err(VaultError::archive(format!("tar exited with {status}")));
        }
        info!(archive = %archive.display(), "archive created");
        Ok(archive)
    }

    async fn decompress(&self, archive: &Path) -> Result<PathBuf> {
        fs::create_dir_all(&self.decompress_store).await?;
        let extracted = self.extracted_path(archive)?;

        debug!(archive = %archive.display(), target = %self.decompress_store.display(), "extracting");
        let status = Command::new("tar")
            .arg("-xzf")
            .arg(archive)
            .arg("-C")
            .arg(&self.decompress_store)
            .status()
            .await
            .map_err(|e| VaultError::archive(format!("failed to launch tar: {e}")))?;

        if !status.success() {
            remove_path_quiet(&extracted).await;
            return Err(VaultError::archive(format!("tar exited with {status}")));
        }
        info!(extracted = %extracted.display(), "archive extracted");
        Ok(extracted)
    }
}

/// Editor launching a configured command with the terminal inherited.
pub struct CommandEditor {
    program: String,
}

impl CommandEditor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Editor for CommandEditor {
    async fn edit(&self, file: &Path) -> Result<()> {
        run_interactive(&self.program, file).await
    }
}

/// Folder browser launching a configured command with the terminal inherited.
pub struct CommandBrowser {
    program: String,
}

impl CommandBrowser {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl FolderBrowser for CommandBrowser {
    async fn browse(&self, dir: &Path) -> Result<()> {
        run_interactive(&self.program, dir).await
    }
}

async fn run_interactive(program: &str, path: &Path) -> Result<()> {
    info!(program, path = %path.display(), "launching interactive process");
    let status = Command::new(program)
        .arg(path)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|e| VaultError::editor(format!("failed to launch {program}: {e}")))?;

    if !status.success() {
        return Err(VaultError::editor(format!("{program} exited with {status}")));
    }
    Ok(())
}
