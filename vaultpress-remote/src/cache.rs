//! Configuration-keyed reuse of the store client.

use std::sync::Arc;

use vaultpress_core::RemoteConfig;

use crate::error::Result;
use crate::gate::RequestGate;
use crate::github::GitHubStore;
use crate::retry::RetryPolicy;
use crate::transport::{HttpTransport, ReqwestTransport, DEFAULT_TIMEOUT};

/// Holds the most recently built [`GitHubStore`] and hands it out again
/// until the remote configuration changes.
///
/// Every store built by one cache shares the cache's [`RequestGate`], so the
/// in-flight bound holds across rebuilds.
pub struct StoreCache<T = ReqwestTransport> {
    gate: RequestGate,
    retry: RetryPolicy,
    current: Option<Arc<GitHubStore<T>>>,
}

impl<T: HttpTransport> StoreCache<T> {
    pub fn new(gate: RequestGate) -> Self {
        Self {
            gate,
            retry: RetryPolicy::default(),
            current: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn gate(&self) -> &RequestGate {
        &self.gate
    }

    /// The cached store when `config` matches, otherwise a fresh one over
    /// the transport produced by `build`.
    pub fn get_or_build<F>(&mut self, config: &RemoteConfig, build: F) -> Result<Arc<GitHubStore<T>>>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(store) = &self.current {
            if store.config() == config {
                return Ok(Arc::clone(store));
            }
            tracing::debug!(owner = %config.owner, repo = %config.repo, "remote configuration changed, rebuilding store");
        }
        let store = Arc::new(
            GitHubStore::with_transport(config.clone(), build()?, self.gate.clone())
                .with_retry(self.retry.clone()),
        );
        self.current = Some(Arc::clone(&store));
        Ok(store)
    }

    /// Drop the cached store; the next request rebuilds it.
    pub fn invalidate(&mut self) {
        self.current = None;
    }
}

impl StoreCache<ReqwestTransport> {
    pub fn get_or_connect(&mut self, config: &RemoteConfig) -> Result<Arc<GitHubStore>> {
        self.get_or_build(config, || ReqwestTransport::new(DEFAULT_TIMEOUT))
    }
}

impl<T: HttpTransport> Default for StoreCache<T> {
    fn default() -> Self {
        Self::new(RequestGate::default())
    }
}
