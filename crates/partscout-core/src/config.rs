//! Configuration management for Partscout.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main application configuration.
///
/// This is loaded from `~/.config/partscout/config.toml` (or platform
/// equivalent). If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General application settings
    pub general: GeneralConfig,
    /// Target marketplace settings
    pub site: SiteConfig,
    /// Scraper behavior settings
    pub scraper: ScraperConfig,
    /// Browser automation settings
    pub browser: BrowserConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `PARTSCOUT_HEADLESS`: Override browser headless mode (true/false)
    /// - `PARTSCOUT_MAX_PAGES`: Override the per-category page ceiling
    /// - `PARTSCOUT_WAIT_TIMEOUT_MS`: Override the render wait timeout
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;

        if let Ok(val) = std::env::var("PARTSCOUT_HEADLESS") {
            if let Ok(headless) = val.parse() {
                config.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Ok(val) = std::env::var("PARTSCOUT_MAX_PAGES") {
            if let Ok(max_pages) = val.parse() {
                config.scraper.max_pages_per_category = max_pages;
                tracing::debug!("Override max_pages_per_category from env: {}", max_pages);
            }
        }

        if let Ok(val) = std::env::var("PARTSCOUT_WAIT_TIMEOUT_MS") {
            if let Ok(timeout) = val.parse() {
                config.scraper.wait_timeout_ms = timeout;
                tracing::debug!("Override wait_timeout_ms from env: {}", timeout);
            }
        }

        Ok(config)
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/partscout/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "partscout", "partscout").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log filter directive passed to the tracing subscriber
    pub log_filter: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
        }
    }
}

/// Target marketplace settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Base URL of the marketplace
    pub base_url: String,
    /// Path of the plate search entry page, relative to the base URL
    pub search_path: String,
}

impl SiteConfig {
    /// The absolute URL of the plate search entry page.
    #[must_use]
    pub fn start_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.search_path
        )
    }

    /// Resolve a possibly-relative href against the base URL.
    #[must_use]
    pub fn absolute_url(&self, href: &str) -> String {
        if href.starts_with("http") {
            href.to_string()
        } else {
            format!("{}{}", self.base_url.trim_end_matches('/'), href)
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.onderdelenlijn.nl".to_string(),
            search_path: "/auto-onderdelen-voorraad/zoeken/".to_string(),
        }
    }
}

/// Scraper behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Hard ceiling on pages visited per category, guards against a
    /// permanently-present "next" control
    pub max_pages_per_category: u32,
    /// Bounded wait for renders and postback settlement, in milliseconds
    pub wait_timeout_ms: u64,
    /// Attempts for DOM operations that hit a stale element reference
    pub dom_retry_attempts: u32,
    /// Delay between stale-reference retries, in milliseconds
    pub dom_retry_delay_ms: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            max_pages_per_category: 50,
            wait_timeout_ms: 20_000,
            dom_retry_attempts: 3,
            dom_retry_delay_ms: 250,
        }
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run the browser without a visible window
    pub headless: bool,
    /// User agent string presented to the site
    pub user_agent: String,
    /// Viewport width in pixels
    pub window_width: u32,
    /// Viewport height in pixels
    pub window_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            window_width: 1920,
            window_height: 1080,
        }
    }
}
