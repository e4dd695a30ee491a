//! DistLock over the `duty_lock` table (§4.1, §4.3). Structurally identical
//! to [`crate::task_lock::TaskLock`] but against a different table, hence a
//! parallel struct rather than one type generic over table name.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::lock::LockError;

pub struct LeaderLock;

impl LeaderLock {
    pub async fn acquire(
        pool: &PgPool,
        key: &str,
        owner: &str,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), LockError> {
        let result = sqlx::query(
            "UPDATE duty_lock
               SET locked_by = $1, lock_expiration = $2
             WHERE lock_key = $3 AND lock_expiration < $4",
        )
        .bind(owner)
        .bind(now + lease)
        .bind(key)
        .bind(now)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LockError::Held);
        }
        Ok(())
    }

    pub async fn renew(
        pool: &PgPool,
        key: &str,
        owner: &str,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), LockError> {
        let result = sqlx::query(
            "UPDATE duty_lock
               SET lock_expiration = $1
             WHERE lock_key = $2 AND locked_by = $3 AND lock_expiration > $4",
        )
        .bind(now + lease)
        .bind(key)
        .bind(owner)
        .bind(now)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LockError::Lost);
        }
        Ok(())
    }

    pub async fn release(pool: &PgPool, key: &str, owner: &str) -> Result<(), LockError> {
        sqlx::query(
            "UPDATE duty_lock
               SET lock_expiration = 'epoch'
             WHERE lock_key = $1 AND locked_by = $2",
        )
        .bind(key)
        .bind(owner)
        .execute(pool)
        .await?;

        Ok(())
    }
}
