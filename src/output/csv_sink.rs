//! CSV export sink: one `[start URL, stringified record]` row per record.

use crate::output::{ExportResult, ExportSink};
use serde_json::Value;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Append-only CSV sink.
///
/// Records are not structurally flattened; the second column is the compact
/// JSON form of the record. Row order follows completion order, not seed
/// order.
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl ExportSink for CsvSink {
    fn write(&mut self, key: &str, record: &Value) -> ExportResult<()> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record([key, &record.to_string()])?;
        writer.flush()?;
        Ok(())
    }
}
