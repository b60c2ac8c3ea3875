use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::broadcast;

use super::types::{StoreError, StoreEvent};

/// Storage keys for the flat key-value state blob.
pub(crate) const KEY_MODE_ENABLED: &str = "mode.enabled";
pub(crate) const KEY_STUDY_CHANNELS: &str = "study.channels";
pub(crate) const KEY_CHANNEL_DETAILS: &str = "channel.details";

/// Capacity of the change-notification channel. A subscriber that falls
/// this far behind sees a lag error and must resynchronize from storage.
const EVENT_CAPACITY: usize = 32;

// ============================================================================
// Store
// ============================================================================

/// Async key-value accessor over the persisted state, plus the change
/// feed every reconciliation engine instance subscribes to.
///
/// Values are JSON blobs; every mutation is a full read-modify-write of
/// its key. Clones share the pool and the notification channel, so all
/// handles in a process observe each other's changes.
#[derive(Clone)]
pub struct Store {
    pub(crate) pool: SqlitePool,
    events: broadcast::Sender<StoreEvent>,
}

impl Store {
    /// Open the state database, creating and migrating it as needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Locked`] when another process holds the
    /// database, [`StoreError::Migration`] when the schema cannot be
    /// brought up to date.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // busy_timeout=5000: wait up to 5s for transient lock contention
        // (a CLI invocation racing an open engine) before SQLITE_BUSY.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(StoreError::from_sqlx)?
            .pragma("busy_timeout", "5000");
        // A plain :memory: database is per-connection: a second pooled
        // connection would see a disjoint empty state.
        let max_connections = if path == ":memory:" { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(StoreError::from_sqlx)?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let store = Self { pool, events };
        store
            .migrate()
            .await
            .map_err(|e| match StoreError::from_sqlx(e) {
                StoreError::Locked => StoreError::Locked,
                other => StoreError::Migration(other.to_string()),
            })?;
        Ok(store)
    }

    /// Idempotent schema setup. The whole state is one key-value table;
    /// re-running on an existing database is a no-op.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("PRAGMA busy_timeout = 5000")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS app_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Subscribe to the change feed. Fires for every change in every
    /// context, including changes made through this same handle.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub(crate) fn notify(&self, event: StoreEvent) {
        // No subscribers is normal (CLI invocations run without engines).
        let _ = self.events.send(event);
    }

    /// Read one key's raw JSON value. Degrades to `None` on storage
    /// failure — the filtering path has no error surface.
    pub(crate) async fn read_key(&self, key: &str) -> Option<String> {
        let row: Result<Option<(String,)>, sqlx::Error> =
            sqlx::query_as("SELECT value FROM app_state WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await;
        match row {
            Ok(value) => value.map(|(v,)| v),
            Err(e) => {
                tracing::warn!(key, error = %e, "State read failed, treating key as unset");
                None
            }
        }
    }

    /// Write one key's raw JSON value (UPSERT).
    pub(crate) async fn write_key(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO app_state (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> Store {
        Store::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn missing_key_reads_as_none() {
        let store = test_store().await;
        assert_eq!(store.read_key("nonexistent.key").await, None);
    }

    #[tokio::test]
    async fn write_then_read_roundtrips() {
        let store = test_store().await;
        store.write_key("some.key", "\"value\"").await.unwrap();
        assert_eq!(
            store.read_key("some.key").await.as_deref(),
            Some("\"value\"")
        );
    }

    #[tokio::test]
    async fn write_replaces_existing_value() {
        let store = test_store().await;
        store.write_key("some.key", "1").await.unwrap();
        store.write_key("some.key", "2").await.unwrap();
        assert_eq!(store.read_key("some.key").await.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn reopening_is_idempotent() {
        // Two opens against the same in-memory handle path must both
        // succeed; migration uses IF NOT EXISTS throughout.
        let first = test_store().await;
        drop(first);
        let second = test_store().await;
        assert_eq!(second.read_key("anything").await, None);
    }

    #[tokio::test]
    async fn notifications_reach_all_subscribers() {
        let store = test_store().await;
        let mut a = store.subscribe();
        let mut b = store.subscribe();

        store.notify(StoreEvent::ListChanged);

        assert_eq!(a.recv().await.unwrap(), StoreEvent::ListChanged);
        assert_eq!(b.recv().await.unwrap(), StoreEvent::ListChanged);
    }
}
