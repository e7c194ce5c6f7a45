//! Parsing of `ldapdomaindump` JSON files into [`Record`]s.
//!
//! Expected shape: an array of `{"dn": "...", "attributes": {"name": [v, ...]}}`.
//! Multi-valued attributes are joined with `", "`, numbers and booleans are
//! rendered as text. Entries that are not objects are skipped.
use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::record::Record;

#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("invalid dump JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("dump must be a JSON array of entries")]
    NotAnArray,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    dn: String,
    #[serde(default)]
    attributes: serde_json::Map<String, Value>,
}

/// Parse and return records plus the number of skipped entries.
pub fn parse_dump_bytes(bytes: &[u8]) -> Result<(Vec<Record>, usize), DumpError> {
    let value: Value = serde_json::from_slice(bytes)?;
    let Value::Array(items) = value else {
        return Err(DumpError::NotAnArray);
    };
    let mut records = Vec::with_capacity(items.len());
    let mut skipped = 0;
    for item in items {
        match serde_json::from_value::<RawEntry>(item) {
            Ok(entry) => records.push(entry_to_record(entry)),
            Err(e) => {
                log::warn!("skipping malformed dump entry: {}", e);
                skipped += 1;
            }
        }
    }
    Ok((records, skipped))
}

pub fn parse_dump_contents(contents: &str) -> Result<Vec<Record>, DumpError> {
    parse_dump_bytes(contents.as_bytes()).map(|(records, _)| records)
}

fn entry_to_record(entry: RawEntry) -> Record {
    let attributes: BTreeMap<String, String> = entry
        .attributes
        .into_iter()
        .map(|(k, v)| (k, value_text(&v)))
        .collect();
    Record::new(entry.dn, attributes)
}

fn value_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(value_text)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}
