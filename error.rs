use std::path::PathBuf;
use thiserror::Error;

/// Custom error types for vaultcrypt operations
#[derive(Debug, Error)]
pub enum VaultError {
    /// Source or destination I/O failures
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The crypto backend could not be initialized (fatal at startup)
    #[error("crypto initialization failed: {0}")]
    CryptoInit(String),

    /// Tag mismatch on decrypt: wrong password or corrupted/tampered data
    #[error("authentication failed: wrong password or corrupted data")]
    Authentication,

    /// Re-rooting a source path under the target root could not be computed
    #[error("cannot re-root {path} under {base}")]
    PathResolution { path: PathBuf, base: PathBuf },

    /// A recursive tree operation failed partway through (target was rolled back)
    #[error("tree operation failed at {path}: {source}")]
    Traversal {
        path: PathBuf,
        #[source]
        source: Box<VaultError>,
    },

    /// The external archive utility reported failure
    #[error("archive utility failed: {0}")]
    Archive(String),

    /// The external editor or folder browser reported failure
    #[error("editor failed: {0}")]
    Editor(String),
}

impl VaultError {
    pub fn crypto_init(msg: impl Into<String>) -> Self {
        Self::CryptoInit(msg.into())
    }

    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }

    pub fn editor(msg: impl Into<String>) -> Self {
        Self::Editor(msg.into())
    }

    pub fn traversal(path: impl Into<PathBuf>, source: VaultError) -> Self {
        Self::Traversal {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// True when the failure is an authentication failure, at any depth.
    pub fn is_authentication(&self) -> bool {
        match self {
            Self::Authentication => true,
            Self::Traversal { source, .. } => source.is_authentication(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;
