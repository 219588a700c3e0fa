//! Scrape orchestration for the Partscout marketplace scraper.
//!
//! This crate drives a browser through the plate-search flow of the
//! marketplace, extracts product records from listing and detail pages, and
//! manages concurrent scrape sessions:
//!
//! - [`Navigator`]: the navigation state machine (plate entry, category
//!   discovery, postback pagination)
//! - [`extract`]: pure HTML-to-record extraction
//! - [`SessionManager`]: concurrent sessions with dedupe, snapshots and
//!   cooperative cancellation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod extract;
pub mod matcher;
pub mod navigator;
pub mod price;
pub mod record;
pub mod session;

pub use error::{Result, ScrapeError};
pub use extract::{parse_detail_page, parse_listing_page};
pub use matcher::{CategoryMatcher, SynonymMatcher};
pub use navigator::{NavState, Navigator, ProductSink};
pub use price::{parse_price, ParsedPrice};
pub use record::{Category, ExtractionWarning, ProductRecord, ProductStub};
pub use session::{
    DriverFactory, EngineFactory, Session, SessionManager, SessionSnapshot, SessionStatus,
};
