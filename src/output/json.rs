//! JSON export sink: pretty-printed map of start URL to extraction record.

use crate::output::{ExportResult, ExportSink};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Read-modify-write JSON sink.
///
/// Every write deserializes the current file, merges the new record and
/// rewrites the whole document. Safe only because the aggregator serializes
/// all writes within a run.
pub struct JsonSink {
    path: PathBuf,
}

impl JsonSink {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl ExportSink for JsonSink {
    fn write(&mut self, key: &str, record: &Value) -> ExportResult<()> {
        let current = std::fs::read_to_string(&self.path)?;
        let mut map: Map<String, Value> = if current.trim().is_empty() {
            Map::new()
        } else {
            match serde_json::from_str(&current) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), %e, "export file unparseable, starting over");
                    Map::new()
                }
            }
        };

        map.insert(key.to_string(), record.clone());
        let document = serde_json::to_string_pretty(&Value::Object(map))?;
        std::fs::write(&self.path, document)?;
        Ok(())
    }
}
