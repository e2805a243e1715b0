//! Fixed-interval polling with a hard deadline.

use crate::error::{Result, WaitError};
use std::future::Future;
use tokio::time::{Duration, Instant};

/// Smallest interval accepted, so a zero interval cannot spin
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Interval and deadline for one bounded wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Delay between predicate evaluations
    pub interval: Duration,
    /// Total time after which the wait fails
    pub timeout: Duration,
}

impl WaitPolicy {
    /// Create a policy; the interval is clamped to at least 1ms
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
            timeout,
        }
    }
}

/// Evaluate `check` every `policy.interval` until it yields a value
///
/// The check returns `Ok(Some(value))` once satisfied and `Ok(None)` to keep
/// waiting; an `Err` aborts the wait immediately. Fails with
/// [`WaitError::Timeout`] once elapsed time reaches `policy.timeout`. The
/// last sleep is shortened to the remaining budget, so the call never
/// outlives `timeout + interval` and the predicate runs at least
/// `ceil(timeout / interval)` times.
pub async fn wait_until<T, F, Fut>(what: &str, policy: WaitPolicy, mut check: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let start = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        if let Some(value) = check().await? {
            log::debug!(
                "{} satisfied after {} check(s) in {:.1}s",
                what,
                attempts,
                start.elapsed().as_secs_f64()
            );
            return Ok(value);
        }

        let elapsed = start.elapsed();
        if elapsed >= policy.timeout {
            log::warn!("Gave up waiting for {} after {} check(s)", what, attempts);
            return Err(WaitError::Timeout {
                what: what.to_string(),
                attempts,
                elapsed_secs: elapsed.as_secs_f64(),
            }
            .into());
        }

        let pause = policy.interval.min(policy.timeout - elapsed);
        log::debug!(
            "Waiting for {} (check {}), next check in {:.1}s",
            what,
            attempts,
            pause.as_secs_f64()
        );
        tokio::time::sleep(pause).await;
    }
}
