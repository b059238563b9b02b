use async_trait::async_trait;

use super::schema::Database;
use super::types::{KeyValueStore, StorageError};

#[async_trait]
impl KeyValueStore for Database {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as("SELECT value FROM key_value WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::ReadFailed(e.to_string()))?;

        Ok(row.map(|(value,)| value))
    }

    /// Upsert `value` under `key`, refreshing its timestamp.
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        if value.len() > Self::MAX_VALUE_SIZE {
            return Err(StorageError::QuotaExceeded {
                size: value.len(),
                quota: Self::MAX_VALUE_SIZE,
            });
        }

        sqlx::query(
            r#"
            INSERT INTO key_value (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::WriteFailed(e.to_string()))?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM key_value WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        Ok(())
    }
}
