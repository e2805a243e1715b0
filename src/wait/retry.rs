//! Bounded retry with a fixed delay for transiently failing actions.

use crate::error::Result;
use std::future::Future;
use tokio::time::Duration;

/// Attempt budget and delay for one retried action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Sleep between a failure and the next attempt
    pub delay: Duration,
}

impl RetryPolicy {
    /// Create a policy; at least one attempt is always made
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Run `action` until it succeeds or the attempt budget is spent
///
/// Errors that are not [`recoverable`](crate::error::ReleaseError::is_recoverable)
/// are returned immediately without further attempts. When attempts are
/// exhausted the last failure is returned.
pub async fn retry<T, F, Fut>(operation_name: &str, policy: RetryPolicy, mut action: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        match action().await {
            Ok(result) => {
                if attempt > 1 {
                    log::info!("{} succeeded on attempt {}", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(e) => {
                if !e.is_recoverable() {
                    log::error!("{} failed with unrecoverable error: {}", operation_name, e);
                    return Err(e);
                }

                if attempt >= policy.max_attempts {
                    log::error!(
                        "{} failed after {} attempt(s): {}",
                        operation_name,
                        attempt,
                        e
                    );
                    return Err(e);
                }

                log::warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:.1}s",
                    operation_name,
                    attempt,
                    policy.max_attempts,
                    e,
                    policy.delay.as_secs_f64()
                );
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}
