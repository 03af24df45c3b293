//! Publishing a single document.
//!
//! 1. Derive the slug and read the document.
//! 2. Extract image references, rewriting them for the post folder.
//! 3. Upload assets concurrently (bounded by the store's request gate).
//! 4. Upload the rewritten text.
//! 5. Register the post in the current manifest.
//!
//! An asset that fails to upload is reported and left out of the manifest;
//! the document is still published. A document that fails keeps its previous
//! manifest entry so the run never deletes it.

use std::path::{Component, Path, PathBuf};

use futures::future::join_all;
use serde::Serialize;

use vaultpress_core::{PublishConfig, Slug};
use vaultpress_extract::{derive_slug, extract, FsVault, ProcessedContent, SourceReader, VaultFile};
use vaultpress_remote::{text_sha, RemoteStore};

use crate::error::SyncError;
use crate::manifest::SyncManifest;

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Everything a run needs: the vault, the store, and where things go.
pub struct PublishContext<'a> {
    pub vault: &'a FsVault,
    pub store: &'a dyn RemoteStore,
    /// Vault-relative folder holding publishable documents.
    pub posts_dir: PathBuf,
    /// Remote directory that owns every published post, without slashes at
    /// either end.
    pub content_root: String,
    pub manifest_path: String,
}

impl<'a> PublishContext<'a> {
    pub fn new(vault: &'a FsVault, store: &'a dyn RemoteStore, config: &PublishConfig) -> Self {
        Self {
            vault,
            store,
            posts_dir: config.posts_dir.clone(),
            content_root: config.remote.normalized_content_root(),
            manifest_path: config.manifest_path.clone(),
        }
    }

    /// `{content_root}/{slug}`
    pub fn post_dir(&self, slug: &Slug) -> String {
        format!("{}/{}", self.content_root, slug)
    }

    /// `{content_root}/{slug}/index.md`
    pub fn document_path(&self, slug: &Slug) -> String {
        format!("{}/index.md", self.post_dir(slug))
    }

    /// Every publishable document, sorted by path.
    pub fn documents(&self) -> Result<Vec<VaultFile>, SyncError> {
        Ok(self.vault.documents_under(&self.posts_dir)?)
    }

    /// The publishable document named by an absolute or vault-relative
    /// `path`: a Markdown file under the posts folder.
    pub fn resolve_document(&self, path: &Path) -> Result<VaultFile, SyncError> {
        let file = self
            .vault
            .file_at(path)
            .ok_or_else(|| SyncError::NotInVault {
                path: path.to_path_buf(),
            })?;
        if file.extension().as_deref() != Some("md") {
            return Err(SyncError::NotMarkdown {
                path: file.path().to_path_buf(),
            });
        }
        let posts_dir: PathBuf = self
            .posts_dir
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect();
        if !file.path().starts_with(&posts_dir) {
            return Err(SyncError::OutsidePosts {
                path: file.path().to_path_buf(),
                posts_dir,
            });
        }
        Ok(file)
    }
}

// ---------------------------------------------------------------------------
// Prepared post
// ---------------------------------------------------------------------------

/// A document rewritten for publication, not yet uploaded.
#[derive(Debug, Clone)]
pub struct PreparedPost {
    pub slug: Slug,
    pub source: VaultFile,
    pub repo_path: String,
    pub processed: ProcessedContent,
    /// Blob digest of the rewritten text.
    pub digest: String,
}

/// Read and rewrite `doc`. No remote access.
pub fn prepare(ctx: &PublishContext<'_>, doc: &VaultFile) -> Result<PreparedPost, SyncError> {
    let slug = derive_slug(doc.path());
    let text = ctx.vault.read_text(doc)?;
    let processed = extract(&text, doc.path(), ctx.vault, &ctx.post_dir(&slug));
    for warning in &processed.warnings {
        tracing::warn!("{}: {warning}", doc.path().display());
    }
    let digest = text_sha(&processed.content);
    Ok(PreparedPost {
        repo_path: ctx.document_path(&slug),
        slug,
        source: doc.clone(),
        processed,
        digest,
    })
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PostState {
    /// The document text was transferred.
    Uploaded,
    /// The remote already held the same text.
    Unchanged,
    /// Dry run: the text differs from what the manifest records.
    WouldPublish,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostOutcome {
    pub slug: Slug,
    pub source: PathBuf,
    pub repo_path: String,
    pub state: PostState,
    pub assets_uploaded: usize,
    pub assets_unchanged: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl PostOutcome {
    fn new(slug: Slug, source: &Path, repo_path: String) -> Self {
        Self {
            slug,
            source: source.to_path_buf(),
            repo_path,
            state: PostState::Failed,
            assets_uploaded: 0,
            assets_unchanged: 0,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// A document refused before any work was done.
    pub fn rejected(slug: Slug, source: &Path, repo_path: String, error: String) -> Self {
        let mut outcome = Self::new(slug, source, repo_path);
        outcome.errors.push(error);
        outcome
    }

    pub fn is_failed(&self) -> bool {
        self.state == PostState::Failed
    }

    /// True when some asset failed even though the document went through.
    pub fn is_partial(&self) -> bool {
        !self.is_failed() && !self.errors.is_empty()
    }
}

// ---------------------------------------------------------------------------
// publish_document
// ---------------------------------------------------------------------------

/// Publish `doc` and register it in `manifest`.
///
/// With `dry_run` nothing is uploaded; the post is registered with its local
/// digest so that deletion planning sees it, and the state reports whether
/// the manifest would change.
pub async fn publish_document(
    ctx: &PublishContext<'_>,
    manifest: &mut SyncManifest,
    doc: &VaultFile,
    dry_run: bool,
) -> PostOutcome {
    let slug = derive_slug(doc.path());
    let prepared = match prepare(ctx, doc) {
        Ok(prepared) => prepared,
        Err(err) => {
            tracing::warn!("{}: {err}", doc.path().display());
            let outcome = PostOutcome::rejected(
                slug.clone(),
                doc.path(),
                ctx.document_path(&slug),
                err.to_string(),
            );
            manifest.retain_previous(&slug);
            return outcome;
        }
    };

    let mut outcome = PostOutcome::new(slug.clone(), doc.path(), prepared.repo_path.clone());
    outcome.warnings = prepared.processed.warnings.clone();

    if dry_run {
        outcome.state = if manifest.has_changed(&slug, &prepared.digest) {
            PostState::WouldPublish
        } else {
            PostState::Unchanged
        };
        let planned = prepared
            .processed
            .assets
            .iter()
            .map(|a| a.target_path.clone())
            .collect();
        manifest.register_published(slug, doc.path(), &prepared.repo_path, planned, &prepared.digest);
        return outcome;
    }

    let post = prepared.slug.as_str();
    let uploads = prepared.processed.assets.iter().map(|asset| async move {
        let bytes = ctx.vault.read_bytes(&asset.source)?;
        let message = format!("Publish {} for {post}", asset.file_name);
        let result = ctx.store.write(&asset.target_path, &bytes, &message).await?;
        Ok::<_, SyncError>(result)
    });
    let results = join_all(uploads).await;

    let mut asset_paths = Vec::new();
    for (asset, result) in prepared.processed.assets.iter().zip(results) {
        match result {
            Ok(upload) => {
                if upload.uploaded {
                    outcome.assets_uploaded += 1;
                } else {
                    outcome.assets_unchanged += 1;
                }
                asset_paths.push(asset.target_path.clone());
            }
            Err(err) => {
                tracing::warn!("{}: asset {} failed: {err}", slug, asset.target_path);
                outcome
                    .errors
                    .push(format!("asset {}: {err}", asset.target_path));
            }
        }
    }

    let message = format!("Publish {slug}");
    match ctx
        .store
        .write_text(&prepared.repo_path, &prepared.processed.content, &message)
        .await
    {
        Ok(upload) => {
            outcome.state = if upload.uploaded {
                PostState::Uploaded
            } else {
                PostState::Unchanged
            };
            manifest.register_published(slug, doc.path(), &prepared.repo_path, asset_paths, &upload.sha);
        }
        Err(err) => {
            tracing::warn!("{slug}: document upload failed: {err}");
            outcome.errors.push(format!("document: {err}"));
            outcome.state = PostState::Failed;
            manifest.retain_previous(&slug);
        }
    }
    outcome
}
