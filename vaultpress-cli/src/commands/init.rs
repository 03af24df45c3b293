//! `vaultpress init <vault> --owner <owner> --repo <repo> [...]`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use vaultpress_core::{
    config,
    types::{DEFAULT_API_BASE, DEFAULT_BRANCH, DEFAULT_CONTENT_ROOT, TOKEN_ENV},
    PublishConfig, RemoteConfig,
};

/// Configure the vault to publish and the repository to publish into.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path to the vault root directory.
    pub vault: PathBuf,

    /// Repository owner (user or organisation).
    #[arg(long)]
    pub owner: String,

    /// Repository name.
    #[arg(long)]
    pub repo: String,

    #[arg(long, default_value = DEFAULT_BRANCH)]
    pub branch: String,

    /// Repository folder that holds one sub-folder per post.
    #[arg(long, default_value = DEFAULT_CONTENT_ROOT)]
    pub content_root: String,

    /// Vault-relative folder whose notes are published (default: whole vault).
    #[arg(long, default_value = "")]
    pub posts_dir: PathBuf,

    #[arg(long, default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// API token to store in the config (0600). Prefer $VAULTPRESS_TOKEN.
    #[arg(long)]
    pub token: Option<String>,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let vault = self
            .vault
            .canonicalize()
            .with_context(|| format!("cannot resolve vault path '{}'", self.vault.display()))?;
        if !vault.join(&self.posts_dir).is_dir() {
            anyhow::bail!(
                "posts folder '{}' does not exist in {}",
                self.posts_dir.display(),
                vault.display()
            );
        }

        let remote = RemoteConfig {
            api_base: self.api_base,
            owner: self.owner,
            repo: self.repo,
            branch: self.branch,
            content_root: self.content_root,
            token: self.token,
        };
        let cfg = config::init(vault.clone(), self.posts_dir.clone(), remote.clone())
            .with_context(|| format!("failed to init config for '{}'", vault.display()))?;

        let ignored = ignored_flags(&cfg, &vault, &self.posts_dir, &remote);
        if !ignored.is_empty() {
            eprintln!(
                "{} A config already exists; ignoring {}. Edit or remove it to change them.",
                "!".yellow().bold(),
                ignored.join(", ")
            );
        }

        println!(
            "✓ Publishing '{}' to {}/{}@{} under {}",
            cfg.vault.display(),
            cfg.remote.owner,
            cfg.remote.repo,
            cfg.remote.branch,
            cfg.remote.normalized_content_root()
        );
        if let Some(home) = dirs::home_dir() {
            println!("  Saved to: {}", config::config_path_at(&home).display());
        }
        if cfg.remote.token.is_none() {
            println!("  Set ${TOKEN_ENV} before publishing.");
        }
        Ok(())
    }
}

/// Flags whose values differ from the config that was already on disk.
fn ignored_flags(
    existing: &PublishConfig,
    vault: &Path,
    posts_dir: &Path,
    remote: &RemoteConfig,
) -> Vec<&'static str> {
    let stored = &existing.remote;
    let mut ignored = Vec::new();
    if existing.vault != vault {
        ignored.push("<vault>");
    }
    if existing.posts_dir != posts_dir {
        ignored.push("--posts-dir");
    }
    if stored.owner != remote.owner {
        ignored.push("--owner");
    }
    if stored.repo != remote.repo {
        ignored.push("--repo");
    }
    if stored.branch != remote.branch {
        ignored.push("--branch");
    }
    if stored.normalized_content_root() != remote.normalized_content_root() {
        ignored.push("--content-root");
    }
    if stored.api_base != remote.api_base {
        ignored.push("--api-base");
    }
    if remote.token.is_some() && stored.token != remote.token {
        ignored.push("--token");
    }
    ignored
}
