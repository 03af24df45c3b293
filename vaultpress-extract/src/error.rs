//! Error types for vaultpress-extract.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading the vault. Link-resolution problems are not
/// errors; they surface as warnings on [`ProcessedContent`](crate::ProcessedContent).
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Filesystem error while listing or reading vault files.
    #[error("vault io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The vault root does not exist or is not a directory.
    #[error("vault not found at {path}")]
    VaultNotFound { path: PathBuf },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ExtractError {
    ExtractError::Io {
        path: path.into(),
        source,
    }
}
