use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium error: {0}")]
    ChromiumError(String),

    #[error("navigation failed: {0}")]
    NavigationError(String),

    #[error("selector not found: {0}")]
    SelectorNotFound(String),

    #[error("stale element reference: {0}")]
    StaleElement(String),

    #[error("timeout: {0}")]
    Timeout(String),
}

impl BrowserError {
    /// Stale references are the only failure kind the resilience layer
    /// retries; everything else propagates immediately.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self, BrowserError::StaleElement(_))
    }
}
