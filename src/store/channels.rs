use super::schema::{Store, KEY_MODE_ENABLED, KEY_STUDY_CHANNELS};
use super::types::{ChannelRecord, StoreError, StoreEvent, StoredChannel};

impl Store {
    // ========================================================================
    // Mode Flag
    // ========================================================================

    /// Whether filtering is active. Unset or unreadable state reads as
    /// `false`.
    pub async fn mode_enabled(&self) -> bool {
        let Some(raw) = self.read_key(KEY_MODE_ENABLED).await else {
            return false;
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Mode flag unreadable, treating as disabled");
            false
        })
    }

    /// Persist the mode flag and notify every subscriber, including
    /// this context.
    pub async fn set_mode_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        let raw = serde_json::to_string(&enabled)?;
        self.write_key(KEY_MODE_ENABLED, &raw).await?;
        self.notify(StoreEvent::ModeChanged(enabled));
        Ok(())
    }

    // ========================================================================
    // Study List
    // ========================================================================

    /// The study list in insertion order.
    ///
    /// Missing or unreadable state reads as empty. Legacy entries (bare
    /// identifier strings) are upgraded in place on first read: names
    /// and thumbnails come from the details cache when present, else
    /// the deterministic placeholder, and the upgraded list is written
    /// back so the upgrade happens once.
    pub async fn channels(&self) -> Vec<ChannelRecord> {
        let Some(raw) = self.read_key(KEY_STUDY_CHANNELS).await else {
            return Vec::new();
        };
        let stored: Vec<StoredChannel> = match serde_json::from_str(&raw) {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(error = %e, "Study list unreadable, treating as empty");
                return Vec::new();
            }
        };

        if !stored
            .iter()
            .any(|entry| matches!(entry, StoredChannel::Legacy(_)))
        {
            return stored
                .into_iter()
                .map(|entry| match entry {
                    StoredChannel::Record(record) => record,
                    StoredChannel::Legacy(id) => ChannelRecord::placeholder(&id),
                })
                .collect();
        }

        let mut upgraded = Vec::with_capacity(stored.len());
        let mut legacy_count = 0usize;
        for entry in stored {
            match entry {
                StoredChannel::Record(record) => upgraded.push(record),
                StoredChannel::Legacy(id) => {
                    legacy_count += 1;
                    let record = match self.cached_details(&id, None).await {
                        Some(details) => ChannelRecord {
                            id,
                            name: details.name,
                            thumbnail: details.thumbnail,
                        },
                        None => ChannelRecord::placeholder(&id),
                    };
                    upgraded.push(record);
                }
            }
        }

        tracing::info!(count = legacy_count, "Upgraded legacy study list entries");
        match self.write_channels(&upgraded).await {
            Ok(()) => self.notify(StoreEvent::ListChanged),
            // Upgrade write-back is best effort; the in-memory list is
            // already usable and the next read will retry.
            Err(e) => tracing::warn!(error = %e, "Failed to persist upgraded study list"),
        }
        upgraded
    }

    async fn write_channels(&self, channels: &[ChannelRecord]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(channels)?;
        self.write_key(KEY_STUDY_CHANNELS, &raw).await
    }

    /// Membership test for one identifier.
    pub async fn is_member(&self, id: &str) -> bool {
        self.channels().await.iter().any(|c| c.id == id)
    }

    /// Append a channel if its id is not already present.
    ///
    /// Idempotent: adding an existing id is a success no-op. Returns
    /// whether the list grew.
    pub async fn add_channel(&self, record: ChannelRecord) -> Result<bool, StoreError> {
        let mut channels = self.channels().await;
        if channels.iter().any(|c| c.id == record.id) {
            return Ok(false);
        }
        channels.push(record);
        self.write_channels(&channels).await?;
        self.notify(StoreEvent::ListChanged);
        Ok(true)
    }

    /// Remove a channel by id (full-list filter-and-replace). Returns
    /// whether anything was removed.
    pub async fn remove_channel(&self, id: &str) -> Result<bool, StoreError> {
        let mut channels = self.channels().await;
        let before = channels.len();
        channels.retain(|c| c.id != id);
        if channels.len() == before {
            return Ok(false);
        }
        self.write_channels(&channels).await?;
        self.notify(StoreEvent::ListChanged);
        Ok(true)
    }

    /// Empty the study list.
    pub async fn clear_channels(&self) -> Result<(), StoreError> {
        self.write_channels(&[]).await?;
        self.notify(StoreEvent::ListChanged);
        Ok(())
    }

    /// Merge imported records into the list, skipping ids already
    /// present. Returns the number actually added.
    pub async fn import_channels(
        &self,
        incoming: Vec<ChannelRecord>,
    ) -> Result<usize, StoreError> {
        let mut channels = self.channels().await;
        let mut added = 0usize;
        for record in incoming {
            if !channels.iter().any(|c| c.id == record.id) {
                channels.push(record);
                added += 1;
            }
        }
        if added > 0 {
            self.write_channels(&channels).await?;
            self.notify(StoreEvent::ListChanged);
        }
        Ok(added)
    }
}
