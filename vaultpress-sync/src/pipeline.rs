//! Publish run entrypoint used by the CLI.
//!
//! Load the previous manifest, publish every document in scope, delete what
//! disappeared, save the new manifest.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use vaultpress_core::Slug;
use vaultpress_extract::derive_slug;
use vaultpress_remote::UploadResult;

use crate::error::SyncError;
use crate::manifest::{DeletionSummary, SyncManifest};
use crate::publisher::{publish_document, PostOutcome, PostState, PublishContext};

/// Which documents a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishScope {
    /// Every document under the posts folder. Posts that disappeared are
    /// deleted remotely.
    All,
    /// One document; all other manifest entries are kept and nothing is
    /// deleted.
    Document(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    /// Checked between documents.
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PublishReport {
    pub posts: Vec<PostOutcome>,
    pub removed: Vec<Slug>,
    /// Paths deleted (or, in a dry run, that would be).
    pub planned_deletions: Vec<String>,
    pub refused_deletions: Vec<String>,
    pub deletions: DeletionSummary,
    pub manifest: Option<UploadResult>,
    pub dry_run: bool,
    pub cancelled: bool,
}

impl PublishReport {
    pub fn count(&self, state: PostState) -> usize {
        self.posts.iter().filter(|p| p.state == state).count()
    }

    pub fn failed(&self) -> usize {
        self.count(PostState::Failed)
    }

    /// Any failed document, failed asset, or failed deletion.
    pub fn has_failures(&self) -> bool {
        self.failed() > 0
            || self.posts.iter().any(PostOutcome::is_partial)
            || !self.deletions.failed.is_empty()
    }
}

/// Run a publish over `scope`.
///
/// Per-document problems are recorded in the report and never abort the run.
/// Errors are returned only when the previous manifest cannot be fetched,
/// the scope cannot be listed, or the new manifest cannot be saved.
pub async fn run(
    ctx: &PublishContext<'_>,
    scope: PublishScope,
    options: RunOptions,
) -> Result<PublishReport, SyncError> {
    let mut manifest = SyncManifest::load(ctx.store, &ctx.manifest_path, &ctx.content_root).await?;
    let documents = match &scope {
        PublishScope::All => ctx.documents()?,
        PublishScope::Document(path) => vec![ctx.resolve_document(path)?],
    };
    tracing::info!(
        "publishing {} document(s){}",
        documents.len(),
        if options.dry_run { " (dry run)" } else { "" }
    );

    let mut report = PublishReport {
        dry_run: options.dry_run,
        ..PublishReport::default()
    };
    let mut seen: BTreeMap<Slug, PathBuf> = BTreeMap::new();

    for doc in &documents {
        if options.cancel.is_cancelled() {
            tracing::warn!("publish cancelled; remaining documents skipped");
            report.cancelled = true;
            break;
        }

        let slug = derive_slug(doc.path());
        if let Some(first) = seen.get(&slug) {
            let error = format!(
                "slug {slug} is already used by {} in this run",
                first.display()
            );
            tracing::warn!("{}: {error}", doc.path().display());
            report.posts.push(PostOutcome::rejected(
                slug.clone(),
                doc.path(),
                ctx.document_path(&slug),
                error,
            ));
            continue;
        }
        seen.insert(slug, doc.path().to_path_buf());

        let outcome = publish_document(ctx, &mut manifest, doc, options.dry_run).await;
        report.posts.push(outcome);
    }

    let partial = report.cancelled || matches!(scope, PublishScope::Document(_));
    if partial {
        let carried = manifest.carry_forward_unregistered();
        tracing::debug!("carried {carried} unvisited post(s) forward");
    }

    let ops = manifest.compute_deletions();
    report.removed = ops.removed_slugs.clone();
    report.planned_deletions = ops.paths();
    report.refused_deletions = ops.refused.clone();

    if options.dry_run {
        return Ok(report);
    }

    if !ops.deletions.is_empty() {
        report.deletions = manifest.execute_deletions(ctx.store, &ops).await;
    }
    report.manifest = Some(manifest.save(ctx.store).await?);

    tracing::info!(
        "published {} uploaded, {} unchanged, {} failed, {} deleted",
        report.count(PostState::Uploaded),
        report.count(PostState::Unchanged),
        report.failed(),
        report.deletions.deleted
    );
    Ok(report)
}
