use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::Path;

/// Loads, parses and validates a JSON configuration file.
///
/// All failure modes here are fatal: an unreadable file, malformed JSON, an
/// unknown selector type, or a validation error abort the run before any
/// scrape work starts.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use weft::config::load_config;
///
/// let config = load_config(Path::new("sitemap.json")).unwrap();
/// println!("Workers: {}", config.settings.workers);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}
