//! Per-source persisted model blob (§4.7). TTL is enforced by the caller
//! (`tsad-detector`), not here — this is a pure store.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tsad_core::task::ModelRecord;

use crate::error::StoreError;

pub struct ModelCache;

impl ModelCache {
    pub async fn put(
        pool: &PgPool,
        source_digest: &str,
        model_name: &str,
        blob: &[u8],
        trained_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO model_data (source_digest, name, data, stamp)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (source_digest) DO UPDATE SET name = $2, data = $3, stamp = $4",
        )
        .bind(source_digest)
        .bind(model_name)
        .bind(blob)
        .bind(trained_at)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn get(pool: &PgPool, source_digest: &str) -> Result<Option<ModelRecord>, StoreError> {
        let row: Option<(String, Vec<u8>, DateTime<Utc>)> =
            sqlx::query_as("SELECT name, data, stamp FROM model_data WHERE source_digest = $1")
                .bind(source_digest)
                .fetch_optional(pool)
                .await?;

        Ok(row.map(|(model_name, blob, trained_at)| ModelRecord {
            source_digest: source_digest.to_string(),
            model_name,
            blob,
            trained_at,
        }))
    }

    pub async fn delete(pool: &PgPool, source_digest: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM model_data WHERE source_digest = $1")
            .bind(source_digest)
            .execute(pool)
            .await?;

        Ok(())
    }
}
