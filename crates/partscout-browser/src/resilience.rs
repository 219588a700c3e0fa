//! Resilience layer for DOM-touching operations.
//!
//! The target site re-renders through script-driven postbacks, which
//! invalidates element references mid-interaction. Operations that read or
//! interact with a DOM reference are wrapped in a bounded retry that fires
//! only for stale references; every other failure kind propagates
//! immediately.

use crate::driver::Driver;
use crate::error::{BrowserError, Result};
use std::future::Future;
use std::time::Duration;

/// Consent overlays the layer knows how to dismiss, tried in order.
const COOKIE_BANNER_SELECTORS: &[&str] = &[
    "div.cookies a.button",
    "div.cookies input[type=\"submit\"]",
    "#cookie-accept",
    ".cookie-consent button",
];

/// Bounded retry policy for stale element references.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Create a policy with an attempt count and a fixed backoff delay.
    #[must_use]
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(250))
    }
}

/// Run a DOM operation, retrying stale-reference failures.
///
/// Non-stale errors propagate on the first occurrence. If every attempt hits
/// a stale reference the final error is returned for the caller to escalate.
pub async fn retry_dom<F, Fut, T>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 1..=policy.attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_stale() => {
                tracing::warn!(
                    "Stale element reference on attempt {}/{}: {}",
                    attempt,
                    policy.attempts,
                    e
                );
                last_error = Some(e);
                if attempt < policy.attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        BrowserError::StaleElement("retry exhausted without captured error".to_string())
    }))
}

/// Dismiss a consent overlay if one is present.
///
/// Returns whether a banner was dismissed. Absence of the overlay is not an
/// error.
pub async fn dismiss_cookie_banner<D: Driver + ?Sized>(driver: &D) -> Result<bool> {
    for selector in COOKIE_BANNER_SELECTORS {
        if let Some(handle) = driver.find_element(selector).await? {
            match driver.click(handle).await {
                Ok(()) => {
                    tracing::debug!("Dismissed cookie banner via {}", selector);
                    return Ok(true);
                }
                Err(e) => {
                    // The overlay may have vanished between find and click
                    tracing::debug!("Cookie banner click failed ({}), continuing", e);
                }
            }
        }
    }
    Ok(false)
}
