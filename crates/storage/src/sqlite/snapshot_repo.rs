use async_trait::async_trait;
use sqlx::Row;
use tracing::debug;

use crate::repository::{
    StorageError, SubmissionSnapshot, SubmissionStore, ValidationSnapshot, ValidationStore,
};

use super::SqliteRepository;

// The JSON payload column is the single serialize/deserialize boundary:
// everything above this module works with the in-memory snapshot types.

#[async_trait]
impl SubmissionStore for SqliteRepository {
    async fn load(&self) -> Result<Option<SubmissionSnapshot>, StorageError> {
        let row = sqlx::query("SELECT payload FROM submission_snapshot WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let payload: String = row
            .try_get("payload")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        serde_json::from_str(&payload)
            .map(Some)
            .map_err(|err| StorageError::Serialization(err.to_string()))
    }

    async fn save(&self, snapshot: &SubmissionSnapshot) -> Result<(), StorageError> {
        let payload = serde_json::to_string(snapshot)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        sqlx::query(
            r"
            INSERT INTO submission_snapshot (id, payload, fetched_at, record_count)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                payload = excluded.payload,
                fetched_at = excluded.fetched_at,
                record_count = excluded.record_count
            ",
        )
        .bind(1_i64)
        .bind(payload)
        .bind(snapshot.fetched_at)
        .bind(i64::try_from(snapshot.record_count).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;
        debug!(records = snapshot.record_count, "persisted submission snapshot");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM submission_snapshot WHERE id = 1")
            .execute(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        debug!("cleared submission snapshot");
        Ok(())
    }
}

#[async_trait]
impl ValidationStore for SqliteRepository {
    async fn load(&self) -> Result<Option<ValidationSnapshot>, StorageError> {
        let row = sqlx::query("SELECT payload FROM validation_snapshot WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let payload: String = row
            .try_get("payload")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        serde_json::from_str(&payload)
            .map(Some)
            .map_err(|err| StorageError::Serialization(err.to_string()))
    }

    async fn save(&self, snapshot: &ValidationSnapshot) -> Result<(), StorageError> {
        let payload = serde_json::to_string(snapshot)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        sqlx::query(
            r"
            INSERT INTO validation_snapshot (id, payload, fetched_at, record_count, version)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                payload = excluded.payload,
                fetched_at = excluded.fetched_at,
                record_count = excluded.record_count,
                version = excluded.version
            ",
        )
        .bind(1_i64)
        .bind(payload)
        .bind(snapshot.fetched_at)
        .bind(i64::try_from(snapshot.record_count).unwrap_or(i64::MAX))
        .bind(i64::from(snapshot.version))
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;
        debug!(
            records = snapshot.record_count,
            version = snapshot.version,
            "persisted validation snapshot"
        );
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM validation_snapshot WHERE id = 1")
            .execute(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        debug!("cleared validation snapshot");
        Ok(())
    }
}
