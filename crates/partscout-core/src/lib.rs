//! Partscout Core - Foundation crate for the Partscout scraping engine.
//!
//! This crate provides shared types, error handling and configuration
//! management that the other Partscout crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes (`SessionId`, `LicensePlate`, `Timestamp`)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, BrowserConfig, GeneralConfig, ScraperConfig, SiteConfig};
pub use error::{ConfigError, ConfigResult, CoreError, Result};
pub use types::{LicensePlate, SessionId, Timestamp};
