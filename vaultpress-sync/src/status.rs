//! Post status: compare the vault with the published manifest.
//!
//! Classification per post:
//! 1. `New`: no previous manifest, or the slug is not in it
//! 2. `Modified`: the rewritten text digest differs from `contentSha`
//! 3. `Current`: digests match
//! 4. `Removed`: in the manifest, no longer in the vault
//!
//! Nothing is written.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use vaultpress_core::Slug;

use crate::error::SyncError;
use crate::manifest::SyncManifest;
use crate::publisher::{prepare, PublishContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    New,
    Modified,
    Current,
    Removed,
}

impl PostStatus {
    pub fn label(self) -> &'static str {
        match self {
            PostStatus::New => "new",
            PostStatus::Modified => "modified",
            PostStatus::Current => "current",
            PostStatus::Removed => "removed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    pub slug: Slug,
    pub status: PostStatus,
    /// Vault-relative source; for removed posts, where it used to be.
    pub vault_path: String,
    pub repo_path: String,
    pub assets: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub last_publish: Option<DateTime<Utc>>,
    pub entries: Vec<StatusEntry>,
    /// Documents that could not be read.
    pub errors: Vec<String>,
}

impl StatusReport {
    pub fn count(&self, status: PostStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    /// True when a publish would change something.
    pub fn is_dirty(&self) -> bool {
        self.entries.iter().any(|e| e.status != PostStatus::Current)
    }
}

/// Classify every document under the posts folder against the manifest.
pub async fn status(ctx: &PublishContext<'_>) -> Result<StatusReport, SyncError> {
    let manifest = SyncManifest::load(ctx.store, &ctx.manifest_path, &ctx.content_root).await?;
    let mut report = StatusReport {
        last_publish: manifest.previous().and_then(|p| p.last_publish),
        ..StatusReport::default()
    };

    let mut local = BTreeSet::new();
    for doc in ctx.documents()? {
        let prepared = match prepare(ctx, &doc) {
            Ok(prepared) => prepared,
            Err(err) => {
                report.errors.push(format!("{}: {err}", doc.path().display()));
                continue;
            }
        };
        let known = manifest
            .previous()
            .is_some_and(|p| p.posts.contains_key(&prepared.slug));
        let status = if !known {
            PostStatus::New
        } else if manifest.has_changed(&prepared.slug, &prepared.digest) {
            PostStatus::Modified
        } else {
            PostStatus::Current
        };
        local.insert(prepared.slug.clone());
        report.entries.push(StatusEntry {
            slug: prepared.slug,
            status,
            vault_path: doc.path().to_string_lossy().replace('\\', "/"),
            repo_path: prepared.repo_path,
            assets: prepared.processed.assets.len(),
            warnings: prepared.processed.warnings,
        });
    }

    if let Some(previous) = manifest.previous() {
        for (slug, entry) in &previous.posts {
            if local.contains(slug) {
                continue;
            }
            report.entries.push(StatusEntry {
                slug: slug.clone(),
                status: PostStatus::Removed,
                vault_path: entry.vault_path.clone(),
                repo_path: entry.repo_path.clone(),
                assets: entry.assets.len(),
                warnings: Vec::new(),
            });
        }
    }

    report
        .entries
        .sort_by(|a, b| a.status.cmp(&b.status).then_with(|| a.slug.cmp(&b.slug)));
    Ok(report)
}
