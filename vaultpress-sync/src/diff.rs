//! Unified diff of a post against its published copy, for `vaultpress diff`.

use std::path::Path;

use serde::Serialize;
use similar::TextDiff;

use vaultpress_core::Slug;

use crate::error::SyncError;
use crate::publisher::{prepare, PublishContext};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostDiff {
    pub slug: Slug,
    pub repo_path: String,
    /// `true` when nothing has been published at `repo_path` yet.
    pub unpublished: bool,
    /// Empty when local and remote text are identical.
    pub unified_diff: String,
}

impl PostDiff {
    pub fn is_empty(&self) -> bool {
        self.unified_diff.is_empty()
    }
}

/// Rewrite `document` as a publish would and diff it against the text at its
/// remote path. No writes.
pub async fn diff_post(ctx: &PublishContext<'_>, document: &Path) -> Result<PostDiff, SyncError> {
    let doc = ctx.resolve_document(document)?;
    let prepared = prepare(ctx, &doc)?;

    let remote = ctx.store.read(&prepared.repo_path).await?;
    let unpublished = remote.is_none();
    let published = remote
        .map(|file| normalize_line_endings(&file.text()))
        .unwrap_or_default();
    let local = normalize_line_endings(&prepared.processed.content);

    let unified_diff = if published == local {
        String::new()
    } else {
        let old_header = format!("a/{}", prepared.repo_path);
        let new_header = format!("b/{}", prepared.repo_path);
        TextDiff::from_lines(&published, &local)
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string()
    };

    Ok(PostDiff {
        slug: prepared.slug,
        repo_path: prepared.repo_path,
        unpublished,
        unified_diff,
    })
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n")
}
