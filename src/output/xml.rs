//! XML export sink: the same URL-to-record map as the JSON sink, rendered as
//! elements.

use crate::output::{ExportError, ExportResult, ExportSink};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Whole-document XML sink.
///
/// The accumulated map is kept in memory and the file rewritten per record.
/// The export file is truncated at scrape start, so this is observationally
/// identical to re-reading the document, without round-tripping generic maps
/// through XML.
pub struct XmlSink {
    path: PathBuf,
    records: Map<String, Value>,
}

impl XmlSink {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            records: Map::new(),
        }
    }

    fn render(&self) -> ExportResult<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        let xml_err = |e: std::io::Error| ExportError::Xml(e.to_string());

        writer
            .write_event(Event::Start(BytesStart::new("scrape")))
            .map_err(xml_err)?;
        for (url, record) in &self.records {
            let mut page = BytesStart::new("page");
            page.push_attribute(("url", url.as_str()));
            writer.write_event(Event::Start(page)).map_err(xml_err)?;
            write_value(&mut writer, record)?;
            writer
                .write_event(Event::End(BytesEnd::new("page")))
                .map_err(xml_err)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("scrape")))
            .map_err(xml_err)?;

        Ok(writer.into_inner())
    }
}

impl ExportSink for XmlSink {
    fn write(&mut self, key: &str, record: &Value) -> ExportResult<()> {
        self.records.insert(key.to_string(), record.clone());
        let document = self.render()?;
        std::fs::write(&self.path, document)?;
        Ok(())
    }
}

fn write_value(writer: &mut Writer<Vec<u8>>, value: &Value) -> ExportResult<()> {
    let xml_err = |e: std::io::Error| ExportError::Xml(e.to_string());
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                let name = element_name(key);
                writer
                    .write_event(Event::Start(BytesStart::new(name.as_str())))
                    .map_err(xml_err)?;
                write_value(writer, inner)?;
                writer
                    .write_event(Event::End(BytesEnd::new(name.as_str())))
                    .map_err(xml_err)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                writer
                    .write_event(Event::Start(BytesStart::new("item")))
                    .map_err(xml_err)?;
                write_value(writer, item)?;
                writer
                    .write_event(Event::End(BytesEnd::new("item")))
                    .map_err(xml_err)?;
            }
        }
        Value::Null => {}
        Value::String(s) => {
            writer
                .write_event(Event::Text(BytesText::new(s)))
                .map_err(xml_err)?;
        }
        other => {
            writer
                .write_event(Event::Text(BytesText::new(&other.to_string())))
                .map_err(xml_err)?;
        }
    }
    Ok(())
}

/// Selector ids become element names, so characters XML disallows are
/// replaced and names are forced to start with a letter or underscore.
fn element_name(raw: &str) -> String {
    let mut name: String = raw
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect();
    if name.is_empty() || !name.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_') {
        name.insert(0, '_');
    }
    name
}
