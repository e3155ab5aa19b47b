//! Recursive directory encryption and decryption.
//!
//! Mirrors a source tree under a target root with an explicit worklist
//! of pending directories instead of call-stack recursion. The whole
//! operation is all-or-nothing: any per-file failure deletes everything
//! created under the target root and leaves the source untouched.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::codec::{Direction, FileCodec};
use crate::error::{Result, VaultError};
use crate::util::remove_path_quiet;

/// One logical crypto operation over a source path.
///
/// `cleanup` decides what happens to the losing side once the outcome
/// is known: on success the source is deleted (the operation is a move),
/// on failure the partially built target is deleted.
pub struct OpDescriptor<'a> {
    pub target_dir: &'a Path,
    pub source: &'a Path,
    pub password: &'a str,
    pub cleanup: bool,
}

/// Encrypt a directory tree, returning the new target root.
pub async fn encrypt_tree(codec: &FileCodec, desc: &OpDescriptor<'_>) -> Result<PathBuf> {
    walk(codec, desc, Direction::Encrypt).await
}

/// Decrypt a directory tree, returning the new target root.
pub async fn decrypt_tree(codec: &FileCodec, desc: &OpDescriptor<'_>) -> Result<PathBuf> {
    walk(codec, desc, Direction::Decrypt).await
}

async fn walk(codec: &FileCodec, desc: &OpDescriptor<'_>, direction: Direction) -> Result<PathBuf> {
    let meta = fs::metadata(desc.source).await?;
    if !meta.is_dir() {
        return Err(VaultError::traversal(
            desc.source,
            VaultError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "source is not a directory",
            )),
        ));
    }

    let root_name = desc.source.file_name().ok_or_else(|| VaultError::PathResolution {
        path: desc.source.to_path_buf(),
        base: desc.target_dir.to_path_buf(),
    })?;
    let target_root = desc.target_dir.join(root_name);
    fs::create_dir_all(&target_root).await?;

    debug!(source = %desc.source.display(), target = %target_root.display(), ?direction, "walking tree");

    match mirror(codec, desc, direction, &target_root).await {
        Ok(files) => {
            if desc.cleanup {
                fs::remove_dir_all(desc.source).await?;
            }
            info!(target = %target_root.display(), files, "tree operation complete");
            Ok(target_root)
        }
        Err(e) => {
            warn!(target = %target_root.display(), error = %e, "tree operation failed, rolling back");
            remove_path_quiet(&target_root).await;
            Err(e)
        }
    }
}

async fn mirror(
    codec: &FileCodec,
    desc: &OpDescriptor<'_>,
    direction: Direction,
    target_root: &Path,
) -> Result<u64> {
    let mut pending: Vec<PathBuf> = vec![desc.source.to_path_buf()];
    let mut files = 0u64;

    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let entry_path = entry.path();
            let relative = entry_path
                .strip_prefix(desc.source)
                .map_err(|_| VaultError::PathResolution {
                    path: entry_path.clone(),
                    base: desc.source.to_path_buf(),
                })?;
            let target_pos = target_root.join(relative);

            if entry.file_type().await?.is_dir() {
                // Mirror the directory eagerly so empty ones survive
                fs::create_dir_all(&target_pos).await?;
                pending.push(entry_path);
            } else {
                let target_file = target_pos
                    .parent()
                    .unwrap_or(target_root)
                    .join(FileCodec::target_name(direction, &entry_path)?);
                let outcome = match direction {
                    Direction::Encrypt => codec
                        .encode(&entry_path, &target_file, desc.password)
                        .await
                        .map(|_| ()),
                    Direction::Decrypt => {
                        codec.decode(&entry_path, &target_file, desc.password).await
                    }
                };
                outcome.map_err(|e| VaultError::traversal(entry_path, e))?;
                files += 1;
            }
        }
    }
    Ok(files)
}
