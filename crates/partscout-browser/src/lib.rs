//! Browser capability layer for the script-driven parts marketplace.
//!
//! Provides the [`Driver`] contract the navigation state machine runs
//! against, a chromiumoxide-backed [`BrowserEngine`] implementation, and the
//! resilience wrappers (stale-reference retry, cookie-banner dismissal) for
//! a UI that mutates under its own postbacks.

pub mod driver;
pub mod engine;
pub mod error;
pub mod resilience;

pub use driver::{content_fingerprint, Driver, ElementHandle, WaitCondition};
pub use engine::{BrowserEngine, EngineOptions};
pub use error::{BrowserError, Result};
pub use resilience::{dismiss_cookie_banner, retry_dom, RetryPolicy};
