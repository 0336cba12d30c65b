//! Weft: a declarative, sitemap-driven web extraction engine
//!
//! A "sitemap" of named, typed selector rules plus seed URLs drives recursive
//! scraping and field extraction, executed by a bounded worker pool, with
//! results merged into a persisted export file.

pub mod config;
pub mod output;
pub mod scrape;
pub mod sitemap;
pub mod url;

use thiserror::Error;

/// Main error type for weft operations
#[derive(Debug, Error)]
pub enum WeftError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Export error: {0}")]
    Export(#[from] output::ExportError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] scrape::FetchError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scrape task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported export format: {0:?}")]
    UnsupportedExport(String),
}

/// Result type alias for weft operations
pub type Result<T> = std::result::Result<T, WeftError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{Config, Settings};
pub use scrape::{Engine, Fetcher, HttpFetcher};
pub use sitemap::{Selector, SelectorType, SiteMap, ROOT_PARENT};
