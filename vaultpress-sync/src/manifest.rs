//! Publish manifest: the remote record of what the last run published.
//!
//! Stored as pretty JSON at a fixed repository path and written through the
//! same idempotent path as every other upload:
//!
//! ```json
//! { "version": 1, "lastPublish": "2026-01-01T00:00:00Z", "posts": {
//!     "my-post": { "vaultPath": "Posts/my-post.md",
//!                  "repoPath": "content/posts/my-post/index.md",
//!                  "assets": ["content/posts/my-post/cover.png"],
//!                  "contentSha": "…" } } }
//! ```
//!
//! A [`SyncManifest`] owns two separate values: the manifest loaded at the
//! start of a run (`previous`) and the one being built (`current`). Entries
//! present in the first and missing from the second are deleted remotely,
//! but only for paths under the content root.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use vaultpress_core::Slug;
use vaultpress_remote::{RemoteStore, UploadResult};

use crate::error::SyncError;

pub const MANIFEST_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Persisted types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestPost {
    pub vault_path: String,
    pub repo_path: String,
    #[serde(default)]
    pub assets: Vec<String>,
    pub content_sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishManifest {
    pub version: u32,
    #[serde(default)]
    pub last_publish: Option<DateTime<Utc>>,
    pub posts: BTreeMap<Slug, ManifestPost>,
}

impl Default for PublishManifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            last_publish: None,
            posts: BTreeMap::new(),
        }
    }
}

impl PublishManifest {
    /// Parse manifest bytes. `None` for anything other than a version 1
    /// object whose `posts` is an object of well-formed entries.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let value: Value = serde_json::from_slice(bytes).ok()?;
        let version = value.get("version")?.as_u64()?;
        if version != u64::from(MANIFEST_VERSION) || !value.get("posts")?.is_object() {
            return None;
        }
        serde_json::from_value(value).ok()
    }
}

// ---------------------------------------------------------------------------
// Deletion plan
// ---------------------------------------------------------------------------

/// A remote path scheduled for removal. The digest is fetched just before
/// deleting, so it starts out empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingDeletion {
    pub path: String,
    pub digest: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncOperations {
    pub deletions: Vec<PendingDeletion>,
    pub removed_slugs: Vec<Slug>,
    /// Recorded paths that were not scheduled because they fall outside the
    /// content root.
    pub refused: Vec<String>,
}

impl SyncOperations {
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty() && self.removed_slugs.is_empty()
    }

    pub fn paths(&self) -> Vec<String> {
        self.deletions.iter().map(|d| d.path.clone()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionSummary {
    pub deleted: usize,
    /// Already gone when the run reached them.
    pub absent: usize,
    pub failed: Vec<FailedDeletion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDeletion {
    pub path: String,
    pub error: String,
}

// ---------------------------------------------------------------------------
// SyncManifest
// ---------------------------------------------------------------------------

pub struct SyncManifest {
    path: String,
    content_root: String,
    previous: Option<PublishManifest>,
    current: PublishManifest,
}

impl SyncManifest {
    /// A manifest with the given prior state. `content_root` bounds which
    /// paths may ever be deleted.
    pub fn new(path: &str, content_root: &str, previous: Option<PublishManifest>) -> Self {
        Self {
            path: path.to_string(),
            content_root: content_root.trim_matches('/').to_string(),
            previous,
            current: PublishManifest::default(),
        }
    }

    /// Fetch the previous manifest from `store`.
    ///
    /// A missing, unparseable or wrong-version manifest is treated as empty.
    /// Only a failure to talk to the store is an error.
    pub async fn load(
        store: &dyn RemoteStore,
        path: &str,
        content_root: &str,
    ) -> Result<Self, SyncError> {
        let previous = match store.read(path).await? {
            None => {
                tracing::info!("no manifest at {path}; treating every post as new");
                None
            }
            Some(file) => {
                let parsed = PublishManifest::parse(&file.content);
                if parsed.is_none() {
                    tracing::warn!("manifest at {path} is unreadable or from another version; starting empty");
                }
                parsed
            }
        };
        Ok(Self::new(path, content_root, previous))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn content_root(&self) -> &str {
        &self.content_root
    }

    pub fn previous(&self) -> Option<&PublishManifest> {
        self.previous.as_ref()
    }

    pub fn current(&self) -> &PublishManifest {
        &self.current
    }

    pub fn is_registered(&self, slug: &Slug) -> bool {
        self.current.posts.contains_key(slug)
    }

    /// Record `slug` as published this run. Asset paths are deduplicated,
    /// first occurrence wins.
    pub fn register_published(
        &mut self,
        slug: Slug,
        source: &Path,
        remote_path: &str,
        asset_paths: Vec<String>,
        digest: &str,
    ) {
        let mut seen = BTreeSet::new();
        let assets = asset_paths
            .into_iter()
            .filter(|p| seen.insert(p.clone()))
            .collect();
        self.current.posts.insert(
            slug,
            ManifestPost {
                vault_path: source.to_string_lossy().replace('\\', "/"),
                repo_path: remote_path.to_string(),
                assets,
                content_sha: digest.to_string(),
            },
        );
    }

    /// Copy the previous entry for `slug` into the current manifest.
    /// Returns `false` when there is nothing to keep.
    pub fn retain_previous(&mut self, slug: &Slug) -> bool {
        let Some(entry) = self.previous.as_ref().and_then(|p| p.posts.get(slug)) else {
            return false;
        };
        self.current.posts.insert(slug.clone(), entry.clone());
        true
    }

    /// Keep every previous entry that was not registered this run. Returns
    /// how many were carried.
    pub fn carry_forward_unregistered(&mut self) -> usize {
        let Some(previous) = &self.previous else {
            return 0;
        };
        let mut carried = 0;
        for (slug, entry) in &previous.posts {
            if !self.current.posts.contains_key(slug) {
                self.current.posts.insert(slug.clone(), entry.clone());
                carried += 1;
            }
        }
        carried
    }

    /// Whether `digest` differs from what the previous run recorded for
    /// `slug`. Always true without a previous manifest or for a new slug.
    pub fn has_changed(&self, slug: &Slug, digest: &str) -> bool {
        match self.previous.as_ref().and_then(|p| p.posts.get(slug)) {
            Some(entry) => entry.content_sha != digest,
            None => true,
        }
    }

    /// Paths of posts that were published before and not this run.
    pub fn compute_deletions(&self) -> SyncOperations {
        let mut ops = SyncOperations::default();
        let Some(previous) = &self.previous else {
            return ops;
        };

        let mut scheduled = BTreeSet::new();
        for (slug, entry) in &previous.posts {
            if self.current.posts.contains_key(slug) {
                continue;
            }
            ops.removed_slugs.push(slug.clone());
            for path in std::iter::once(&entry.repo_path).chain(&entry.assets) {
                if !self.is_within_content_root(path) {
                    tracing::warn!(
                        "refusing to delete {path}: outside content root {}",
                        self.content_root
                    );
                    ops.refused.push(path.clone());
                } else if scheduled.insert(path.clone()) {
                    ops.deletions.push(PendingDeletion {
                        path: path.clone(),
                        digest: None,
                    });
                }
            }
        }
        ops
    }

    /// Delete every pending path, best effort. Each file's digest is looked
    /// up right before its deletion; files already gone are skipped.
    pub async fn execute_deletions(
        &self,
        store: &dyn RemoteStore,
        ops: &SyncOperations,
    ) -> DeletionSummary {
        let mut summary = DeletionSummary::default();
        for pending in &ops.deletions {
            let path = &pending.path;
            let digest = match store.digest(path).await {
                Ok(Some(digest)) => digest,
                Ok(None) => {
                    tracing::debug!("{path} already absent");
                    summary.absent += 1;
                    continue;
                }
                Err(err) => {
                    tracing::warn!("could not look up {path} for deletion: {err}");
                    summary.failed.push(FailedDeletion {
                        path: path.clone(),
                        error: err.to_string(),
                    });
                    continue;
                }
            };
            match store.delete(path, &digest, &format!("Remove {path}")).await {
                Ok(()) => {
                    tracing::info!("deleted {path}");
                    summary.deleted += 1;
                }
                Err(err) => {
                    tracing::warn!("failed to delete {path}: {err}");
                    summary.failed.push(FailedDeletion {
                        path: path.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }
        summary
    }

    /// Stamp `lastPublish` and write the current manifest.
    pub async fn save(&mut self, store: &dyn RemoteStore) -> Result<UploadResult, SyncError> {
        self.current.last_publish = Some(Utc::now());
        let json = serde_json::to_string_pretty(&self.current)?;
        let result = store
            .write_text(&self.path, &json, "Update publish manifest")
            .await?;
        Ok(result)
    }

    /// `path` lies strictly under the content root and has no `.`/`..`
    /// segments. An empty content root admits nothing.
    fn is_within_content_root(&self, path: &str) -> bool {
        if self.content_root.is_empty() {
            return false;
        }
        let Some(rest) = path
            .strip_prefix(self.content_root.as_str())
            .and_then(|r| r.strip_prefix('/'))
        else {
            return false;
        };
        !rest.is_empty()
            && rest
                .split('/')
                .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
    }
}
