//! Thin state transitions on `TaskStore`, plus the RPCs to workers that keep
//! their in-memory state in sync with those transitions (§4.9).

use chrono::Utc;
use sqlx::PgPool;
use tsad_client::WorkerClient;
use tsad_core::source::Source;
use tsad_core::task::{TaskRecord, TaskState};
use tsad_core::SUBMIT_LEASE_SENTINEL_YEARS;
use tsad_store::{StoreError, TaskStore};

#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("owning worker rejected the request: {0}")]
    Worker(#[from] tsad_client::ClientError),
    #[error("task {0:?} is not stopped")]
    NotStopped(String),
    #[error("invalid argument: {0}")]
    ArgumentInvalid(String),
}

pub struct ControlPlane {
    pool: PgPool,
    worker_port: u16,
}

impl ControlPlane {
    pub fn new(pool: PgPool, worker_port: u16) -> Self {
        Self { pool, worker_port }
    }

    fn worker_url(&self, host: &str) -> String {
        format!("http://{host}:{}", self.worker_port)
    }

    /// A freshly submitted task is given a lease far in the future so the
    /// dispatcher never mistakes it for "expired and unowned" before any
    /// worker has had a chance to process it once (§4.9, §9 Open Questions).
    pub async fn submit(&self, name: String, source: Source, config: String) -> Result<(), ControlPlaneError> {
        let record = TaskRecord {
            name,
            source,
            config,
            state: TaskState::Running,
            owner: String::new(),
            lease_expiry: Utc::now() + chrono::Duration::days(365 * SUBMIT_LEASE_SENTINEL_YEARS as i64),
        };

        TaskStore::insert(&self.pool, &record).await?;
        Ok(())
    }

    pub async fn stop(&self, name: &str) -> Result<(), ControlPlaneError> {
        let record = TaskStore::get(&self.pool, name).await?;

        if !record.owner.is_empty() {
            let client = WorkerClient::new(self.worker_url(&record.owner));
            client.cancel_task(name).await?;
        }

        TaskStore::update_state(&self.pool, name, TaskState::Stopped).await?;
        Ok(())
    }

    pub async fn start(&self, name: &str) -> Result<(), ControlPlaneError> {
        let record = TaskStore::get(&self.pool, name).await?;

        if record.state != TaskState::Stopped {
            return Err(ControlPlaneError::NotStopped(name.to_string()));
        }

        TaskStore::update_state(&self.pool, name, TaskState::Running).await?;
        Ok(())
    }

    pub async fn update(
        &self,
        old_name: &str,
        new_name: &str,
        source: Source,
        config: String,
    ) -> Result<(), ControlPlaneError> {
        let record = TaskStore::get(&self.pool, old_name).await?;

        if !record.owner.is_empty() {
            let client = WorkerClient::new(self.worker_url(&record.owner));
            client.cancel_task(old_name).await?;
        }

        TaskStore::update_row(&self.pool, old_name, new_name, &source, &config).await?;
        Ok(())
    }

    pub async fn retrain(&self, name: &str) -> Result<(), ControlPlaneError> {
        let record = TaskStore::get(&self.pool, name).await?;

        if !record.owner.is_empty() {
            let client = WorkerClient::new(self.worker_url(&record.owner));
            client.retrain_task(name).await?;
        }

        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<TaskRecord, ControlPlaneError> {
        Ok(TaskStore::get(&self.pool, name).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> Source {
        Source::new("tsdb", "sys.cpu", "{host=h1}")
    }

    #[sqlx::test(migrations = "../tsad-migrate/migrations")]
    async fn submit_creates_running_task_with_no_owner(pool: PgPool) -> sqlx::Result<()> {
        let cp = ControlPlane::new(pool, 8081);
        cp.submit("t1".to_string(), source(), "{}".to_string()).await.unwrap();

        let record = cp.get("t1").await.unwrap();
        assert_eq!(record.state, TaskState::Running);
        assert!(record.owner.is_empty());
        Ok(())
    }

    #[sqlx::test(migrations = "../tsad-migrate/migrations")]
    async fn stop_with_no_owner_just_marks_stopped(pool: PgPool) -> sqlx::Result<()> {
        let cp = ControlPlane::new(pool, 8081);
        cp.submit("t2".to_string(), source(), "{}".to_string()).await.unwrap();

        cp.stop("t2").await.unwrap();
        let record = cp.get("t2").await.unwrap();
        assert_eq!(record.state, TaskState::Stopped);
        Ok(())
    }

    #[sqlx::test(migrations = "../tsad-migrate/migrations")]
    async fn start_requires_task_to_be_stopped(pool: PgPool) -> sqlx::Result<()> {
        let cp = ControlPlane::new(pool, 8081);
        cp.submit("t3".to_string(), source(), "{}".to_string()).await.unwrap();

        let err = cp.start("t3").await.unwrap_err();
        assert!(matches!(err, ControlPlaneError::NotStopped(name) if name == "t3"));

        cp.stop("t3").await.unwrap();
        cp.start("t3").await.unwrap();
        let record = cp.get("t3").await.unwrap();
        assert_eq!(record.state, TaskState::Running);
        Ok(())
    }

    #[sqlx::test(migrations = "../tsad-migrate/migrations")]
    async fn update_with_no_owner_renames_row(pool: PgPool) -> sqlx::Result<()> {
        let cp = ControlPlane::new(pool, 8081);
        cp.submit("old".to_string(), source(), "{}".to_string()).await.unwrap();

        cp.update("old", "new", source(), "{\"window\":5}".to_string()).await.unwrap();

        let record = cp.get("new").await.unwrap();
        assert_eq!(record.config, "{\"window\":5}");
        Ok(())
    }
}
