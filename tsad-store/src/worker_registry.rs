//! Worker-side heartbeat publisher; manager-side liveness filter (§4.5).

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tsad_core::task::WorkerRecord;

use crate::error::StoreError;

pub struct WorkerRegistry;

impl WorkerRegistry {
    /// Upserts `{host, num_tasks, last_heartbeat=now}`, called every 30s by
    /// each worker.
    pub async fn heartbeat(
        pool: &PgPool,
        host: &str,
        num_tasks: u32,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO workers (host, num_tasks, heart_beat)
             VALUES ($1, $2, $3)
             ON CONFLICT (host) DO UPDATE SET num_tasks = $2, heart_beat = $3",
        )
        .bind(host)
        .bind(num_tasks as i32)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<WorkerRecord>, StoreError> {
        let rows: Vec<(String, i32, DateTime<Utc>)> =
            sqlx::query_as("SELECT host, num_tasks, heart_beat FROM workers")
                .fetch_all(pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(host, num_tasks, last_heartbeat)| WorkerRecord {
                host,
                num_tasks: num_tasks.max(0) as u32,
                last_heartbeat,
            })
            .collect())
    }

    pub async fn list_live(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<WorkerRecord>, StoreError> {
        Ok(Self::list_all(pool)
            .await?
            .into_iter()
            .filter(|w| w.is_live(now))
            .collect())
    }
}
