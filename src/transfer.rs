//! Study-list import and export.
//!
//! The interchange format is a JSON array of channel records. Import is
//! strict about shape (the payload must be an array, and must
//! contribute at least one valid entry) but lenient per entry: a
//! malformed entry is discarded with a warning, never failing the whole
//! file.

use thiserror::Error;

use crate::store::ChannelRecord;
use crate::util::validate_thumbnail_url;

/// Import failures, reported synchronously to the initiating UI. No
/// state is mutated when these occur.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Invalid JSON file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File must be a JSON array of channels")]
    NotAnArray,

    #[error("No valid channels found in file")]
    NoValidEntries,
}

/// Serialize the study list as a pretty-printed JSON array — the
/// export file format.
pub fn export_json(channels: &[ChannelRecord]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(channels)
}

/// Parse and validate an import payload.
///
/// Each entry needs a non-empty identifier and name plus a thumbnail
/// that parses as a public http(s) URL. Entries failing validation are
/// discarded individually; only a payload with zero surviving entries
/// errors. The caller merges the result into the store by id.
pub fn parse_import(content: &str) -> Result<Vec<ChannelRecord>, ImportError> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let serde_json::Value::Array(entries) = value else {
        return Err(ImportError::NotAnArray);
    };

    let total = entries.len();
    let valid: Vec<ChannelRecord> = entries.into_iter().filter_map(validate_entry).collect();

    if valid.is_empty() {
        return Err(ImportError::NoValidEntries);
    }
    if valid.len() < total {
        tracing::warn!(
            discarded = total - valid.len(),
            kept = valid.len(),
            "Discarded invalid entries from import payload"
        );
    }
    Ok(valid)
}

fn validate_entry(value: serde_json::Value) -> Option<ChannelRecord> {
    let record: ChannelRecord = serde_json::from_value(value).ok()?;
    if record.id.trim().is_empty() || record.name.trim().is_empty() {
        return None;
    }
    if let Err(e) = validate_thumbnail_url(&record.thumbnail) {
        tracing::debug!(channel = %record.id, error = %e, "Rejected import entry thumbnail");
        return None;
    }
    Some(record)
}
