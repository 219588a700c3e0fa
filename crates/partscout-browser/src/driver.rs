//! The browser capability contract the navigation layer is written against.
//!
//! The scraper never talks to chromiumoxide directly; it drives a [`Driver`],
//! which keeps the navigation state machine testable against a scripted
//! implementation.

use crate::error::Result;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

/// Opaque token for a located DOM element.
///
/// Handles are only valid until the site re-renders; interacting with a
/// replaced node yields `BrowserError::StaleElement`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(u64);

impl ElementHandle {
    /// Create a handle from a raw id.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw id of this handle.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Conditions a caller can wait on.
///
/// `ContentChangedFrom` is the postback settlement check: pagination on the
/// target site replaces DOM content without a URL change, so "element exists"
/// is not enough — the caller passes the fingerprint of the previous page and
/// waits until the rendered content differs from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitCondition {
    /// At least one element matches the selector
    SelectorPresent(String),
    /// No element matches the selector
    SelectorAbsent(String),
    /// The page content fingerprint differs from the given one
    ContentChangedFrom(u64),
}

/// Stable fingerprint of rendered page content, used for settlement checks.
#[must_use]
pub fn content_fingerprint(html: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    html.hash(&mut hasher);
    hasher.finish()
}

/// Browser capability consumed by the navigation state machine.
#[async_trait::async_trait]
pub trait Driver: Send + Sync {
    /// Navigate the interactive page to a URL.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Locate the first element matching a CSS selector, if any.
    async fn find_element(&self, selector: &str) -> Result<Option<ElementHandle>>;

    /// Locate all elements matching a CSS selector, in document order.
    async fn find_elements(&self, selector: &str) -> Result<Vec<ElementHandle>>;

    /// Click an element.
    async fn click(&self, element: ElementHandle) -> Result<()>;

    /// Fill a form field with a value.
    async fn fill(&self, element: ElementHandle, value: &str) -> Result<()>;

    /// Read the rendered text of an element.
    async fn read_text(&self, element: ElementHandle) -> Result<String>;

    /// Read an attribute of an element, if present.
    async fn read_attribute(&self, element: ElementHandle, name: &str)
        -> Result<Option<String>>;

    /// Block until a condition holds or the timeout elapses.
    async fn wait_until(&self, condition: WaitCondition, timeout: Duration) -> Result<()>;

    /// The current HTML content of the interactive page.
    async fn page_content(&self) -> Result<String>;

    /// Fetch a URL in a separate tab and return its HTML.
    ///
    /// Detail pages are read through this side channel so the interactive
    /// page keeps its postback state for pagination.
    async fn fetch_page(&self, url: &str) -> Result<String>;
}
