//! Retry helpers for flaky operations
//!
//! Network-backed fixture builders (model hub downloads in particular) can
//! fail transiently. These helpers re-run an operation a bounded number of
//! times with exponential backoff before giving up and surfacing the last
//! error to the caller.

use std::time::Duration;

use tracing::warn;

/// Default attempt budget used by network-backed fixture builders
pub const DEFAULT_ATTEMPTS: usize = 3;

const INITIAL_DELAY: Duration = Duration::from_millis(50);
const MAX_DELAY: Duration = Duration::from_secs(1);

/// Run `operation` up to `max_attempts` times with the default backoff.
///
/// The operation's last error is returned once the attempt budget is
/// exhausted. `max_attempts` is clamped to at least one, so the operation
/// always runs.
pub fn retry<T, E, F>(operation: F, max_attempts: usize) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: std::fmt::Display,
{
    retry_with_backoff(operation, max_attempts, INITIAL_DELAY, MAX_DELAY)
}

/// Like [`retry`] but with explicit backoff bounds.
///
/// The delay starts at `initial_delay` and doubles after each failed attempt,
/// capped at `max_delay`. No sleep happens after the final attempt.
pub fn retry_with_backoff<T, E, F>(
    mut operation: F,
    max_attempts: usize,
    initial_delay: Duration,
    max_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: std::fmt::Display,
{
    let max_attempts = max_attempts.max(1);
    let mut delay = initial_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation() {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_attempts {
                    return Err(err);
                }
                warn!(
                    "Attempt {}/{} failed: {}, retrying in {:?}",
                    attempt, max_attempts, err, delay
                );
                std::thread::sleep(delay);
                delay = (delay * 2).min(max_delay);
            }
        }
    }
}

/// Async variant of [`retry_with_backoff`] for builders that await their IO.
pub async fn retry_async<T, E, F, Fut>(
    mut operation: F,
    max_attempts: usize,
    initial_delay: Duration,
    max_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = max_attempts.max(1);
    let mut delay = initial_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_attempts {
                    return Err(err);
                }
                warn!(
                    "Attempt {}/{} failed: {}, retrying in {:?}",
                    attempt, max_attempts, err, delay
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(max_delay);
            }
        }
    }
}
