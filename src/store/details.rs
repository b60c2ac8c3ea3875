use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::schema::{Store, KEY_CHANNEL_DETAILS};
use super::types::StoreError;

/// Default freshness window for cached channel details (24 hours).
pub const DEFAULT_DETAILS_TTL_HOURS: i64 = 24;

/// One cached metadata entry for a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedDetails {
    pub name: String,
    pub thumbnail: String,
    /// Epoch milliseconds at fetch time.
    pub fetched_at_ms: i64,
}

impl Store {
    // ========================================================================
    // Channel Details Cache
    // ========================================================================

    /// Retrieve cached details for a channel if they are still fresh.
    ///
    /// Entries older than the TTL (default 24 h, minimum 1 h) read as
    /// absent. Storage failures degrade to a cache miss.
    pub async fn cached_details(&self, id: &str, ttl_hours: Option<i64>) -> Option<CachedDetails> {
        let ttl = ttl_hours.unwrap_or(DEFAULT_DETAILS_TTL_HOURS).max(1);
        let entry = self.details_map().await.remove(id)?;

        let age_ms = Utc::now().timestamp_millis() - entry.fetched_at_ms;
        if age_ms >= ttl * 3_600_000 {
            tracing::debug!(channel = id, age_ms, "Cached channel details expired");
            return None;
        }
        Some(entry)
    }

    /// Insert or replace the cached details for a channel, stamped with
    /// the current time. The whole map is read, modified, and written
    /// back — the storage layer has no partial-update primitive.
    pub async fn store_details(
        &self,
        id: &str,
        name: &str,
        thumbnail: &str,
    ) -> Result<(), StoreError> {
        let mut map = self.details_map().await;
        map.insert(
            id.to_string(),
            CachedDetails {
                name: name.to_string(),
                thumbnail: thumbnail.to_string(),
                fetched_at_ms: Utc::now().timestamp_millis(),
            },
        );
        let raw = serde_json::to_string(&map)?;
        self.write_key(KEY_CHANNEL_DETAILS, &raw).await
    }

    async fn details_map(&self) -> BTreeMap<String, CachedDetails> {
        let Some(raw) = self.read_key(KEY_CHANNEL_DETAILS).await else {
            return BTreeMap::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Channel details cache unreadable, treating as empty");
            BTreeMap::new()
        })
    }
}
