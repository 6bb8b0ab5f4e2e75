use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

/// Timeout and polling interval for [`wait_until`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub interval: Duration,
}

impl WaitOptions {
    #[must_use]
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("condition not met within {0:?}")]
pub struct WaitTimeout(pub Duration);

/// Poll `check` until it returns true or the timeout elapses.
///
/// The condition is always evaluated at least once, so a zero timeout is a
/// single non-blocking check.
///
/// # Errors
///
/// Returns [`WaitTimeout`] if the condition never held.
pub async fn wait_until<F, Fut>(options: WaitOptions, mut check: F) -> Result<(), WaitTimeout>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + options.timeout;
    loop {
        if check().await {
            return Ok(());
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(WaitTimeout(options.timeout));
        }
        let remaining = deadline - now;
        tokio::time::sleep(options.interval.min(remaining)).await;
    }
}

/// Sleep for `delay`; zero delays return immediately.
pub async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
