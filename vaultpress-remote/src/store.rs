//! The storage contract the sync engine publishes through.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Outcome of an idempotent write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    /// `false` when the remote already held identical bytes.
    pub uploaded: bool,
    /// Digest of the content now stored at `path`.
    pub sha: String,
    pub path: String,
}

/// A file fetched from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub path: String,
    pub sha: String,
    pub content: Vec<u8>,
}

impl RemoteFile {
    /// Content decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Submodule,
    #[serde(other)]
    Other,
}

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub name: String,
    pub path: String,
    pub sha: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default)]
    pub size: u64,
}

/// Content-addressed remote file store.
///
/// Paths are repository-relative and `/`-separated. Absence is `Ok(None)`
/// (or an empty listing), never an error.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn read(&self, path: &str) -> Result<Option<RemoteFile>>;

    /// Digest of the file at `path`, without its content when the backend
    /// can avoid transferring it.
    async fn digest(&self, path: &str) -> Result<Option<String>> {
        Ok(self.read(path).await?.map(|file| file.sha))
    }

    /// Store `content` at `path` unless the remote already holds the same
    /// bytes.
    async fn write(&self, path: &str, content: &[u8], message: &str) -> Result<UploadResult>;

    async fn write_text(&self, path: &str, text: &str, message: &str) -> Result<UploadResult> {
        self.write(path, text.as_bytes(), message).await
    }

    /// Remove `path`. `digest` must be the file's current digest.
    async fn delete(&self, path: &str, digest: &str, message: &str) -> Result<()>;

    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>>;
}
