//! `vaultpress diff <document>`: show what a publish would change in one post.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use vaultpress_sync::diff_post;

use super::{runtime, Session};

/// Arguments for `vaultpress diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Document to diff (absolute, or relative to the current directory).
    pub document: PathBuf,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let session = Session::open()?;
        let document = self.document.canonicalize().unwrap_or(self.document);

        let result = runtime()?
            .block_on(diff_post(&session.context(), &document))
            .with_context(|| format!("diff failed for '{}'", document.display()))?;

        if result.is_empty() {
            println!("No differences for '{}'.", result.slug);
            return Ok(());
        }
        if result.unpublished {
            println!("'{}' has not been published to {} yet.", result.slug, result.repo_path);
        }

        print!("{}", result.unified_diff);
        if !result.unified_diff.ends_with('\n') {
            println!();
        }
        Ok(())
    }
}
