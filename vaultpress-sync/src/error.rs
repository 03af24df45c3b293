//! Error types for vaultpress-sync.

use std::path::PathBuf;

use thiserror::Error;

use vaultpress_core::ConfigError;
use vaultpress_extract::ExtractError;
use vaultpress_remote::RemoteError;

/// All errors that can arise from publish operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Reading the vault failed.
    #[error("vault error: {0}")]
    Extract(#[from] ExtractError),

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Manifest serialization error.
    #[error("manifest JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A document path that does not name a file inside the vault.
    #[error("not a document in the vault: {path}")]
    NotInVault { path: PathBuf },

    /// Only Markdown files are published as posts.
    #[error("not a Markdown document: {path}")]
    NotMarkdown { path: PathBuf },

    #[error("{path} is outside the posts folder '{posts_dir}'")]
    OutsidePosts { path: PathBuf, posts_dir: PathBuf },
}
