//! Export sinks
//!
//! A sink persists completed root-level extraction records under the contract
//! `write(key, record)`, where `key` is the root start URL. The export file is
//! a whole-document snapshot: JSON and XML rewrite the full file per record,
//! CSV appends one row per record. Writes are serialized by the single
//! aggregator task per engine invocation, not by file locking.

mod csv_sink;
mod json;
mod xml;

pub use csv_sink::CsvSink;
pub use json::JsonSink;
pub use xml::XmlSink;

use crate::ConfigError;
use serde_json::Value;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised by export sinks. Any of these aborts the run: silently
/// losing records is worse than stopping.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to access export file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XML write error: {0}")]
    Xml(String),
}

/// Result type for export operations
pub type ExportResult<T> = Result<T, ExportError>;

/// Supported export file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Xml,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "xml" => Ok(ExportFormat::Xml),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(ConfigError::UnsupportedExport(other.to_string())),
        }
    }
}

/// Persists one completed root-level record.
pub trait ExportSink: Send {
    /// Merges `record` into the export file under `key`.
    fn write(&mut self, key: &str, record: &Value) -> ExportResult<()>;
}

/// Creates the sink for the configured format and truncates the export file.
///
/// Called before any job is enqueued, so an unsupported format (already
/// rejected by config validation) or an unwritable path halts the run before
/// the fetch backend is ever invoked.
pub fn create_sink(format: ExportFormat, path: &Path) -> ExportResult<Box<dyn ExportSink>> {
    std::fs::write(path, b"")?;
    tracing::debug!(path = %path.display(), ?format, "export file truncated");
    Ok(match format {
        ExportFormat::Json => Box::new(JsonSink::new(path)),
        ExportFormat::Xml => Box::new(XmlSink::new(path)),
        ExportFormat::Csv => Box::new(CsvSink::new(path)),
    })
}
