//! Settings kept in a small SQLite file next to the library database

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SettingsStore,
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

const CREATE_SETTINGS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        value_type TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
"#;

/// Type tag stored beside each value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Text,
    Bool,
    Integer,
    Float,
}

impl ValueKind {
    fn tag(self) -> &'static str {
        match self {
            ValueKind::Text => "string",
            ValueKind::Bool => "bool",
            ValueKind::Integer => "i64",
            ValueKind::Float => "f64",
        }
    }
}

fn failed(action: &'static str) -> impl FnOnce(sqlx::Error) -> BridgeError {
    move |e| BridgeError::OperationFailed(format!("Settings {action} failed: {e}"))
}

/// Typed key-value store over SQLite.
///
/// A key read back as a different type than it was written with is an
/// error, which scan option loading turns into "use the default".
pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl SqliteSettingsStore {
    pub async fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .map_err(failed("open"))?;

        let store = Self::with_pool(pool).await?;
        debug!(path = ?db_path, "Opened settings store");
        Ok(store)
    }

    /// Settings that vanish with the store
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::new().in_memory(true))
            .await
            .map_err(failed("open"))?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(CREATE_SETTINGS_TABLE)
            .execute(&pool)
            .await
            .map_err(failed("schema setup"))?;
        Ok(Self { pool })
    }

    async fn write(&self, key: &str, value: &str, kind: ValueKind) -> Result<()> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        sqlx::query(
            r#"
            INSERT INTO settings (key, value, value_type, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                value_type = excluded.value_type,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(kind.tag())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(failed("write"))?;

        debug!(key, kind = kind.tag(), "Stored setting");
        Ok(())
    }

    async fn read(&self, key: &str, kind: ValueKind) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value, value_type FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(failed("read"))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let value: String = row.get(0);
        let stored: String = row.get(1);

        if stored != kind.tag() {
            warn!(key, expected = kind.tag(), stored = %stored, "Setting has a different type");
            return Err(BridgeError::OperationFailed(format!(
                "{key} holds a {stored}, not a {}",
                kind.tag()
            )));
        }
        Ok(Some(value))
    }

    async fn read_parsed<T>(&self, key: &str, kind: ValueKind) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.read(key, kind)
            .await?
            .map(|raw| {
                raw.parse().map_err(|e| {
                    BridgeError::OperationFailed(format!("{key} does not parse: {e}"))
                })
            })
            .transpose()
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.write(key, value, ValueKind::Text).await
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.read(key, ValueKind::Text).await
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.write(key, &value.to_string(), ValueKind::Bool).await
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.read_parsed(key, ValueKind::Bool).await
    }

    async fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.write(key, &value.to_string(), ValueKind::Integer).await
    }

    async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        self.read_parsed(key, ValueKind::Integer).await
    }

    async fn set_f64(&self, key: &str, value: f64) -> Result<()> {
        self.write(key, &value.to_string(), ValueKind::Float).await
    }

    async fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        self.read_parsed(key, ValueKind::Float).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(failed("delete"))?;
        Ok(())
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(failed("lookup"))?;
        Ok(row.is_some())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT key FROM settings ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .map_err(failed("listing"))?;
        Ok(rows.into_iter().map(|row| row.get(0)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scan_option_values_round_trip_by_type() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();

        store.set_f64("scan.minimum_duration_secs", 45.5).await.unwrap();
        store.set_bool("scan.write_back_add_date", true).await.unwrap();
        store.set_i64("scan.progress_interval", 25).await.unwrap();
        store
            .set_string("scan.audio_extensions", r#"["mp3","flac"]"#)
            .await
            .unwrap();

        assert_eq!(store.get_f64("scan.minimum_duration_secs").await.unwrap(), Some(45.5));
        assert_eq!(store.get_bool("scan.write_back_add_date").await.unwrap(), Some(true));
        assert_eq!(store.get_i64("scan.progress_interval").await.unwrap(), Some(25));
        assert_eq!(
            store.get_string("scan.audio_extensions").await.unwrap().as_deref(),
            Some(r#"["mp3","flac"]"#)
        );
        assert_eq!(store.get_i64("scan.unset").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_type_mismatch_is_error() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();

        store.set_string("scan.minimum_duration_secs", "thirty").await.unwrap();
        assert!(store.get_f64("scan.minimum_duration_secs").await.is_err());
    }

    #[tokio::test]
    async fn test_overwrite_changes_type_and_keys_are_sorted() {
        let store = SqliteSettingsStore::in_memory().await.unwrap();

        store.set_string("log.level", "debug").await.unwrap();
        store.set_i64("log.level", 3).await.unwrap();
        store.set_bool("a.flag", false).await.unwrap();

        assert_eq!(store.get_i64("log.level").await.unwrap(), Some(3));
        assert!(store.get_string("log.level").await.is_err());
        assert_eq!(store.list_keys().await.unwrap(), vec!["a.flag", "log.level"]);

        store.delete("a.flag").await.unwrap();
        assert!(!store.has_key("a.flag").await.unwrap());
    }

    #[tokio::test]
    async fn test_file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.db");

        let store = SqliteSettingsStore::new(path.clone()).await.unwrap();
        store.set_bool("scan.ignore_numeric_genres", true).await.unwrap();
        drop(store);

        let reopened = SqliteSettingsStore::new(path).await.unwrap();
        assert_eq!(
            reopened.get_bool("scan.ignore_numeric_genres").await.unwrap(),
            Some(true)
        );
    }
}
