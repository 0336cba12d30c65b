//! Configuration module
//!
//! Loads, parses and validates the single JSON configuration document that
//! carries both the process [`Settings`] and the [`SiteMap`](crate::SiteMap)
//! to scrape.
//!
//! # Example
//!
//! ```no_run
//! use weft::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sitemap.json")).unwrap();
//! println!("Export format: {}", config.settings.export);
//! ```

mod parser;
mod types;
mod validation;

pub use parser::load_config;
pub use types::{Config, Settings};
pub use validation::validate;
