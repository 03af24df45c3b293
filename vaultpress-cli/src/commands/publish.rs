//! `vaultpress publish [<document>] [--dry-run]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use vaultpress_sync::{run, PostOutcome, PostState, PublishReport, PublishScope, RunOptions};

use super::{runtime, Session};

/// Publish every post, or a single document, to the remote repository.
#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Publish only this document; other posts are left untouched.
    pub document: Option<PathBuf>,

    /// Show what would be uploaded and deleted without writing anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl PublishArgs {
    pub fn run(self) -> Result<()> {
        let session = Session::open()?;
        let scope = match self.document {
            Some(path) => PublishScope::Document(path.canonicalize().unwrap_or(path)),
            None => PublishScope::All,
        };
        let options = RunOptions {
            dry_run: self.dry_run,
            ..RunOptions::default()
        };

        let rt = runtime()?;
        let report = rt.block_on(async {
            let cancel = options.cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received; finishing the current post");
                    cancel.cancel();
                }
            });
            run(&session.context(), scope, options).await
        });
        let report = report.context("publish failed")?;

        print_report(&report);
        if report.has_failures() {
            anyhow::bail!("{} post(s) failed to publish", failure_count(&report));
        }
        Ok(())
    }
}

fn failure_count(report: &PublishReport) -> usize {
    report.failed()
        + report.posts.iter().filter(|p| p.is_partial()).count()
        + report.deletions.failed.len()
}

fn print_report(report: &PublishReport) {
    let prefix = if report.dry_run {
        format!("{} ", "[dry-run]".bright_black())
    } else {
        String::new()
    };

    for post in &report.posts {
        println!("{prefix}{}", post_line(post));
        for warning in &post.warnings {
            println!("    {} {warning}", "!".yellow());
        }
        for error in &post.errors {
            println!("    {} {error}", "✗".red());
        }
    }

    for slug in &report.removed {
        let verb = if report.dry_run { "would remove" } else { "removed" };
        println!("{prefix}{} {slug} ({verb})", "-".red().bold());
    }
    for path in &report.refused_deletions {
        println!(
            "{prefix}{} refused to delete {path}: outside the content root",
            "!".yellow().bold()
        );
    }
    for failed in &report.deletions.failed {
        println!("{} delete {}: {}", "✗".red(), failed.path, failed.error);
    }

    if report.cancelled {
        println!("{}", "Interrupted; unvisited posts were kept.".yellow());
    }

    if report.dry_run {
        println!(
            "{prefix}{} to publish, {} unchanged, {} path(s) to delete",
            report.count(PostState::WouldPublish),
            report.count(PostState::Unchanged),
            report.planned_deletions.len()
        );
        return;
    }

    println!(
        "✓ {} uploaded, {} unchanged, {} failed, {} deleted",
        report.count(PostState::Uploaded),
        report.count(PostState::Unchanged),
        report.failed(),
        report.deletions.deleted
    );
    if let Some(manifest) = &report.manifest {
        println!("  Manifest: {}", manifest.path);
    }
}

fn post_line(post: &PostOutcome) -> String {
    let marker = match post.state {
        PostState::Uploaded => "✓".green().bold(),
        PostState::WouldPublish => "✎".yellow().bold(),
        PostState::Unchanged => "·".bright_black(),
        PostState::Failed => "✗".red().bold(),
    };
    let assets = post.assets_uploaded + post.assets_unchanged;
    let detail = match post.state {
        PostState::Failed => "failed".to_string(),
        PostState::WouldPublish => format!("would publish, {assets} asset(s)"),
        _ if assets == 0 => post.repo_path.clone(),
        _ => format!(
            "{} ({} asset(s), {} uploaded)",
            post.repo_path, assets, post.assets_uploaded
        ),
    };
    format!("{marker} {} {}", post.slug, detail.bright_black())
}
