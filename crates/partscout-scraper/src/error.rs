//! Error taxonomy for the scrape pipeline.

use partscout_browser::BrowserError;
use thiserror::Error;

/// Failures a scrape can end with. Extraction problems are deliberately not
/// here: a bad field becomes a record-level warning, not an error.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Fatal: the plate form or the site's vehicle lookup failed.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// Fatal but expected: the query genuinely matched nothing; reported as
    /// an empty result, never retried.
    #[error("no categories matched query '{query}'")]
    NoCategoriesFound { query: String },

    /// Browser-level failure that survived the resilience layer.
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    /// Cooperative cancellation observed at a page or category boundary.
    #[error("scrape cancelled")]
    Cancelled,
}

/// Convenience alias for scrape results.
pub type Result<T> = std::result::Result<T, ScrapeError>;
