//! DistLock over the `tasks` table: `processed_by`/`lock_expiration` double
//! as both "who is processing this task" and "who holds the lease" (§4.1,
//! §4.2).
//!
//! Identity is the configured advertised host string rather than the
//! node's literal IP (§4.1) — containerized deployments often don't expose
//! a single stable address to the process.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::lock::LockError;

pub struct TaskLock;

impl TaskLock {
    pub async fn acquire(
        pool: &PgPool,
        name: &str,
        owner: &str,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), LockError> {
        let result = sqlx::query(
            "UPDATE tasks
               SET processed_by = $1, lock_expiration = $2
             WHERE name = $3 AND lock_expiration < $4",
        )
        .bind(owner)
        .bind(now + lease)
        .bind(name)
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
        name: &str,
        owner: &str,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), LockError> {
        let result = sqlx::query(
            "UPDATE tasks
               SET lock_expiration = $1
             WHERE name = $2 AND processed_by = $3 AND lock_expiration > $4",
        )
        .bind(now + lease)
        .bind(name)
        .bind(owner)
        .bind(now)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LockError::Lost);
        }
        Ok(())
    }

    /// Never fails if the row exists, per §4.1.
    pub async fn release(pool: &PgPool, name: &str, owner: &str) -> Result<(), LockError> {
        sqlx::query(
            "UPDATE tasks
               SET lock_expiration = 'epoch'
             WHERE name = $1 AND processed_by = $2",
        )
        .bind(name)
        .bind(owner)
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsad_core::source::Source;
    use tsad_core::task::{TaskRecord, TaskState};

    async fn seed(pool: &PgPool, name: &str) {
        crate::TaskStore::insert(
            pool,
            &TaskRecord {
                name: name.to_string(),
                source: Source::new("tsdb", "sys.cpu", ""),
                config: "{}".to_string(),
                state: TaskState::Running,
                owner: String::new(),
                lease_expiry: chrono::DateTime::UNIX_EPOCH,
            },
        )
        .await
        .unwrap();
    }

    #[sqlx::test(migrations = "../tsad-migrate/migrations")]
    async fn acquire_unowned_task_succeeds(pool: PgPool) -> sqlx::Result<()> {
        seed(&pool, "t1").await;
        TaskLock::acquire(&pool, "t1", "worker-a", Duration::seconds(30), Utc::now()).await.unwrap();
        Ok(())
    }

    #[sqlx::test(migrations = "../tsad-migrate/migrations")]
    async fn acquire_held_task_rejected(pool: PgPool) -> sqlx::Result<()> {
        seed(&pool, "t2").await;
        let now = Utc::now();
        TaskLock::acquire(&pool, "t2", "worker-a", Duration::seconds(30), now).await.unwrap();

        let err = TaskLock::acquire(&pool, "t2", "worker-b", Duration::seconds(30), now).await.unwrap_err();
        assert!(matches!(err, LockError::Held));
        Ok(())
    }

    #[sqlx::test(migrations = "../tsad-migrate/migrations")]
    async fn release_then_reacquire_by_other_owner(pool: PgPool) -> sqlx::Result<()> {
        seed(&pool, "t3").await;
        let now = Utc::now();
        TaskLock::acquire(&pool, "t3", "worker-a", Duration::seconds(30), now).await.unwrap();
        TaskLock::release(&pool, "t3", "worker-a").await.unwrap();

        TaskLock::acquire(&pool, "t3", "worker-b", Duration::seconds(30), now).await.unwrap();
        Ok(())
    }
}
