//! Process-wide bound on in-flight remote requests.
//!
//! A fair (FIFO) semaphore: waiters are admitted in arrival order. The
//! permit covers one HTTP attempt only; retry back-off sleeps happen with
//! the permit released.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::RemoteError;

/// Default number of requests allowed in flight at once.
pub const MAX_IN_FLIGHT: usize = 5;

/// Cloneable handle; every clone shares the same permits.
#[derive(Debug, Clone)]
pub struct RequestGate {
    permits: Arc<Semaphore>,
    limit: usize,
}

/// Held for the duration of one request attempt.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl RequestGate {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Wait for a slot. Callers queue in FIFO order.
    pub async fn acquire(&self) -> Result<GatePermit, RemoteError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| RemoteError::GateClosed)?;
        Ok(GatePermit { _permit: permit })
    }

    /// A slot if one is free right now, without queueing.
    pub fn try_acquire(&self) -> Option<GatePermit> {
        Arc::clone(&self.permits)
            .try_acquire_owned()
            .ok()
            .map(|permit| GatePermit { _permit: permit })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Requests currently holding a permit.
    pub fn in_flight(&self) -> usize {
        self.limit - self.permits.available_permits()
    }

    /// Reject all pending and future acquisitions.
    pub fn close(&self) {
        self.permits.close();
    }
}

impl Default for RequestGate {
    fn default() -> Self {
        Self::new(MAX_IN_FLIGHT)
    }
}
