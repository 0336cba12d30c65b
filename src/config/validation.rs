use crate::config::types::{Config, Settings};
use crate::output::ExportFormat;
use crate::sitemap::{Selector, SelectorType};
use crate::ConfigError;

/// Validates the entire configuration. Runs before any job is enqueued; a
/// failure here is the only way a bad sitemap stops the process.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_settings(&config.settings)?;
    for selector in &config.sitemap.selectors {
        validate_selector(selector)?;
    }
    Ok(())
}

fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if settings.workers < 1 || settings.workers > 100 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 100, got {}",
            settings.workers
        )));
    }

    // Detect an unsupported export format here rather than mid-run.
    settings.export.parse::<ExportFormat>()?;

    if settings.output_file.is_empty() {
        return Err(ConfigError::Validation(
            "output_filename cannot be empty".to_string(),
        ));
    }

    if settings.log && settings.log_file.as_deref().unwrap_or("").is_empty() {
        return Err(ConfigError::Validation(
            "log_file must be set when log is enabled".to_string(),
        ));
    }

    Ok(())
}

fn validate_selector(selector: &Selector) -> Result<(), ConfigError> {
    if selector.id.is_empty() {
        return Err(ConfigError::Validation(
            "selector id cannot be empty".to_string(),
        ));
    }

    if selector.parent_selectors.is_empty() {
        return Err(ConfigError::Validation(format!(
            "selector '{}' must declare at least one parent",
            selector.id
        )));
    }

    if selector.selector.is_empty() {
        return Err(ConfigError::Validation(format!(
            "selector '{}' has an empty selector expression",
            selector.id
        )));
    }

    if selector.selector_type == SelectorType::ElementAttribute
        && selector
            .extract_attribute
            .as_deref()
            .unwrap_or("")
            .is_empty()
    {
        return Err(ConfigError::Validation(format!(
            "selector '{}' is an ElementAttribute selector and requires extractAttribute",
            selector.id
        )));
    }

    // Dangling parent ids and duplicate ids are deliberately not validated:
    // a dangling parent just never matches, and duplicates resolve to
    // last-write-wins at evaluation time.
    Ok(())
}
