use std::future::Future;
use std::time::Duration;

use pokr_common::store::StoreError;

const RETRY_DELAYS_MS: &[u64] = &[200, 500, 1_000, 2_000, 4_000];

/// Backoff schedule for transient store failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self { delays: Vec::new() }
    }

    pub fn with_delays(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    pub fn attempts(&self) -> usize {
        self.delays.len() + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delays: RETRY_DELAYS_MS
                .iter()
                .copied()
                .map(Duration::from_millis)
                .collect(),
        }
    }
}

/// Run `op`, retrying transient errors on the policy's schedule. Non-transient
/// errors and the last transient one are returned as-is.
pub async fn with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut delays = policy.delays.iter();
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() => match delays.next() {
                Some(delay) => {
                    tracing::warn!("{} failed ({}), retrying in {:?}", what, e, delay);
                    tokio::time::sleep(*delay).await;
                }
                None => {
                    tracing::error!("{} failed after {} attempts: {}", what, policy.attempts(), e);
                    return Err(e);
                }
            },
            Err(e) => return Err(e),
        }
    }
}
