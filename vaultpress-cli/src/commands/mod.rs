//! Subcommand implementations and the state they share.

pub mod diff;
pub mod init;
pub mod publish;
pub mod status;

use std::sync::Arc;

use anyhow::{Context, Result};

use vaultpress_core::{config, PublishConfig};
use vaultpress_extract::FsVault;
use vaultpress_remote::{GitHubStore, StoreCache};
use vaultpress_sync::PublishContext;

/// Loaded configuration, opened vault and connected store.
pub(crate) struct Session {
    pub config: PublishConfig,
    pub vault: FsVault,
    pub store: Arc<GitHubStore>,
}

impl Session {
    /// Load `~/.vaultpress/config.yaml`, apply `$VAULTPRESS_TOKEN`, and
    /// refuse to continue with an incomplete configuration.
    pub fn open() -> Result<Self> {
        let mut config =
            config::load().context("failed to load config; run `vaultpress init` first")?;
        config.remote = config.remote.clone().with_env_token();
        config.validate().context("cannot publish")?;

        let vault = FsVault::open(&config.vault)
            .with_context(|| format!("cannot open vault at '{}'", config.vault.display()))?;
        let store = StoreCache::default()
            .get_or_connect(&config.remote)
            .context("failed to set up the HTTP client")?;
        tracing::debug!(
            owner = %config.remote.owner,
            repo = %config.remote.repo,
            branch = %config.remote.branch,
            "session ready"
        );
        Ok(Self {
            config,
            vault,
            store,
        })
    }

    pub fn context(&self) -> PublishContext<'_> {
        PublishContext::new(&self.vault, self.store.as_ref(), &self.config)
    }
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}
