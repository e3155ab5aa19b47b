//! Small filesystem helpers shared by the walker and workflows.

use std::path::Path;

use tokio::fs;

use crate::error::Result;

/// Remove a file or directory tree if it exists; missing paths are fine.
pub async fn remove_path(path: &Path) -> Result<()> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).await?,
        Ok(_) => fs::remove_file(path).await?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Best-effort removal used on rollback paths, where the original
/// error must win over any cleanup failure.
pub async fn remove_path_quiet(path: &Path) {
    if let Err(e) = remove_path(path).await {
        tracing::warn!(path = %path.display(), error = %e, "rollback cleanup failed");
    }
}
