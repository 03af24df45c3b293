//! Retry with exponential back-off for rate-limited and transient failures.
//!
//! Every attempt counts against one budget, whatever failed. Back-off starts
//! at `initial_backoff` and doubles per attempt; a server-provided wait hint
//! replaces the computed delay. Any single wait is capped at `max_wait`, and
//! there is no sleep after the final attempt.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::RemoteError;
use crate::transport::HttpResponse;

pub const MAX_ATTEMPTS: u32 = 3;
pub const INITIAL_BACKOFF: Duration = Duration::from_millis(1000);
pub const MAX_WAIT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            initial_backoff: INITIAL_BACKOFF,
            max_wait: MAX_WAIT,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, given the current base back-off and an
    /// optional server hint.
    pub fn delay(&self, backoff: Duration, hint: Option<Duration>) -> Duration {
        hint.unwrap_or(backoff).min(self.max_wait)
    }

    /// Run `attempt` until it yields a response that is neither rate-limited
    /// nor a 5xx, a permanent error, or the budget is spent.
    ///
    /// `label` names the resource in logs and errors.
    pub async fn run<F, Fut>(&self, label: &str, mut attempt: F) -> Result<HttpResponse, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<HttpResponse, RemoteError>>,
    {
        let mut backoff = self.initial_backoff;
        let mut last_err = None;

        for n in 1..=self.max_attempts {
            let wait = match attempt().await {
                Ok(resp) if is_rate_limited(&resp) => {
                    let hint = wait_hint(&resp);
                    last_err = Some(RemoteError::RateLimited {
                        attempts: n,
                        retry_after: hint,
                    });
                    self.delay(backoff, hint)
                }
                Ok(resp) if resp.status >= 500 => {
                    last_err = Some(RemoteError::Status {
                        status: resp.status,
                        path: label.to_string(),
                        message: resp.error_message(),
                    });
                    self.delay(backoff, None)
                }
                Ok(resp) => return Ok(resp),
                Err(err) if err.is_transient() => {
                    last_err = Some(err);
                    self.delay(backoff, None)
                }
                Err(err) => return Err(err),
            };

            if n < self.max_attempts {
                tracing::warn!(
                    "{label}: attempt {n}/{} failed, retrying in {wait:?}",
                    self.max_attempts
                );
                tokio::time::sleep(wait).await;
            }
            backoff = backoff.saturating_mul(2);
        }

        Err(last_err.unwrap_or_else(|| {
            RemoteError::Transport(format!("{label}: no attempts allowed"))
        }))
    }
}

/// 429, or 403 carrying an exhausted quota or a `retry-after` hint.
pub fn is_rate_limited(resp: &HttpResponse) -> bool {
    match resp.status {
        429 => true,
        403 => {
            resp.header("x-ratelimit-remaining") == Some("0")
                || resp.header("retry-after").is_some()
        }
        _ => false,
    }
}

/// Server-suggested wait: `retry-after` seconds, else the distance to
/// `x-ratelimit-reset` when the quota is exhausted.
pub fn wait_hint(resp: &HttpResponse) -> Option<Duration> {
    if let Some(secs) = resp
        .header("retry-after")
        .and_then(|v| v.trim().parse::<u64>().ok())
    {
        return Some(Duration::from_secs(secs));
    }
    if resp.header("x-ratelimit-remaining") != Some("0") {
        return None;
    }
    let reset = resp
        .header("x-ratelimit-reset")
        .and_then(|v| v.trim().parse::<u64>().ok())?;
    let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
    Some(Duration::from_secs(reset.saturating_sub(now)))
}
