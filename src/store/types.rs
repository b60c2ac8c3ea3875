use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Storage-layer errors with user-facing messages.
///
/// These surface only on mutation paths (the CLI has an error channel);
/// read paths degrade to empty/false instead of propagating.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another process has the state database locked.
    #[error("Another instance of studymode appears to be using the state database. Close it and try again.")]
    Locked,

    /// Schema migration failed.
    #[error("State migration failed: {0}")]
    Migration(String),

    /// A value could not be encoded as JSON for storage.
    #[error("State encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// Generic database error.
    #[error("Storage error: {0}")]
    Other(#[from] sqlx::Error),
}

impl StoreError {
    /// Classify a sqlx error, mapping SQLite lock conditions to
    /// [`StoreError::Locked`].
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let text = err.to_string().to_lowercase();
        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if text.contains("database is locked")
            || text.contains("database table is locked")
            || text.contains("sqlite_busy")
            || text.contains("sqlite_locked")
            || text.contains("unable to open database file")
        {
            return StoreError::Locked;
        }
        StoreError::Other(err)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A channel on the study list.
///
/// Identity is `id` (opaque, stable). `name` and `thumbnail` are
/// display cache — refreshable, never consulted for membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub id: String,
    pub name: String,
    pub thumbnail: String,
}

impl ChannelRecord {
    /// Deterministic stand-in used whenever display metadata cannot be
    /// resolved, so the list never shows an empty entry.
    pub fn placeholder(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: placeholder_name(id),
            thumbnail: placeholder_thumbnail(id),
        }
    }
}

pub fn placeholder_name(id: &str) -> String {
    format!("Channel {id}")
}

pub fn placeholder_thumbnail(id: &str) -> String {
    format!("https://www.gstatic.com/youtube/img/channels/channel_{id}_default.png")
}

/// On-disk representation of one study-list entry.
///
/// Early versions persisted bare identifier strings; those are upgraded
/// to full records on first read, preserving order.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum StoredChannel {
    Record(ChannelRecord),
    Legacy(String),
}

/// Change notifications from the store.
///
/// Delivered to every subscriber, including the context that made the
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    /// The mode flag changed; carries the new value.
    ModeChanged(bool),
    /// The study list changed (add, remove, clear, import, or legacy
    /// upgrade).
    ListChanged,
}
