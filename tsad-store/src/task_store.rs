//! Durable mapping from task name to task row (§4.2).

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tsad_core::source::Source;
use tsad_core::task::{TaskRecord, TaskState};

use crate::error::StoreError;

#[derive(sqlx::FromRow)]
struct TaskRow {
    name: String,
    state: String,
    data_source: serde_json::Value,
    config: String,
    processed_by: String,
    lock_expiration: DateTime<Utc>,
}

impl TryFrom<TaskRow> for TaskRecord {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let source: Source = serde_json::from_value(row.data_source)
            .map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))?;
        let state = TaskState::parse(&row.state)
            .ok_or_else(|| StoreError::Database(sqlx::Error::Decode(format!("unknown task state {:?}", row.state).into())))?;

        Ok(TaskRecord {
            name: row.name,
            source,
            config: row.config,
            state,
            owner: row.processed_by,
            lease_expiry: row.lock_expiration,
        })
    }
}

pub struct TaskStore;

impl TaskStore {
    pub async fn insert(pool: &PgPool, record: &TaskRecord) -> Result<(), StoreError> {
        let data_source = serde_json::to_value(&record.source)
            .map_err(|e| StoreError::Database(sqlx::Error::Encode(Box::new(e))))?;

        let result = sqlx::query(
            "INSERT INTO tasks (name, state, data_source, config, processed_by, lock_expiration)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&record.name)
        .bind(record.state.as_str())
        .bind(data_source)
        .bind(&record.config)
        .bind(&record.owner)
        .bind(record.lease_expiry)
        .execute(pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::TaskExists(record.name.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<TaskRecord>, StoreError> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT name, state, data_source, config, processed_by, lock_expiration FROM tasks",
        )
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(TaskRecord::try_from).collect()
    }

    pub async fn get(pool: &PgPool, name: &str) -> Result<TaskRecord, StoreError> {
        let row: Option<TaskRow> = sqlx::query_as(
            "SELECT name, state, data_source, config, processed_by, lock_expiration
             FROM tasks WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(pool)
        .await?;

        row.ok_or_else(|| StoreError::TaskNotFound(name.to_string()))
            .and_then(TaskRecord::try_from)
    }

    pub async fn update_state(pool: &PgPool, name: &str, state: TaskState) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE tasks SET state = $1 WHERE name = $2")
            .bind(state.as_str())
            .bind(name)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::TaskNotFound(name.to_string()));
        }
        Ok(())
    }

    /// Overwrites name/source/config in place, used by `ControlPlane::Update`
    /// (§4.9). `old_name` and `new_name` may be equal.
    pub async fn update_row(
        pool: &PgPool,
        old_name: &str,
        new_name: &str,
        source: &Source,
        config: &str,
    ) -> Result<(), StoreError> {
        let data_source = serde_json::to_value(source)
            .map_err(|e| StoreError::Database(sqlx::Error::Encode(Box::new(e))))?;

        let result = sqlx::query(
            "UPDATE tasks SET name = $1, data_source = $2, config = $3 WHERE name = $4",
        )
        .bind(new_name)
        .bind(data_source)
        .bind(config)
        .bind(old_name)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::TaskNotFound(old_name.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsad_core::source::Source;

    fn record(name: &str) -> TaskRecord {
        TaskRecord {
            name: name.to_string(),
            source: Source::new("tsdb", "sys.cpu", "{host=h1}"),
            config: "{}".to_string(),
            state: TaskState::Running,
            owner: String::new(),
            lease_expiry: Utc::now(),
        }
    }

    #[sqlx::test(migrations = "../tsad-migrate/migrations")]
    async fn insert_then_get_round_trips(pool: PgPool) -> sqlx::Result<()> {
        TaskStore::insert(&pool, &record("a")).await.unwrap();

        let got = TaskStore::get(&pool, "a").await.unwrap();
        assert_eq!(got.name, "a");
        assert_eq!(got.state, TaskState::Running);
        Ok(())
    }

    #[sqlx::test(migrations = "../tsad-migrate/migrations")]
    async fn insert_duplicate_name_rejected(pool: PgPool) -> sqlx::Result<()> {
        TaskStore::insert(&pool, &record("dup")).await.unwrap();

        let err = TaskStore::insert(&pool, &record("dup")).await.unwrap_err();
        assert!(matches!(err, StoreError::TaskExists(name) if name == "dup"));
        Ok(())
    }

    #[sqlx::test(migrations = "../tsad-migrate/migrations")]
    async fn get_missing_task_not_found(pool: PgPool) -> sqlx::Result<()> {
        let err = TaskStore::get(&pool, "missing").await.unwrap_err();
        assert!(matches!(err, StoreError::TaskNotFound(name) if name == "missing"));
        Ok(())
    }

    #[sqlx::test(migrations = "../tsad-migrate/migrations")]
    async fn update_state_changes_row(pool: PgPool) -> sqlx::Result<()> {
        TaskStore::insert(&pool, &record("b")).await.unwrap();
        TaskStore::update_state(&pool, "b", TaskState::Stopped).await.unwrap();

        let got = TaskStore::get(&pool, "b").await.unwrap();
        assert_eq!(got.state, TaskState::Stopped);
        Ok(())
    }

    #[sqlx::test(migrations = "../tsad-migrate/migrations")]
    async fn update_row_renames_and_replaces_config(pool: PgPool) -> sqlx::Result<()> {
        TaskStore::insert(&pool, &record("old")).await.unwrap();

        let source = Source::new("tsdb", "sys.mem", "{host=h2}");
        TaskStore::update_row(&pool, "old", "new", &source, "{\"window\":5}").await.unwrap();

        let err = TaskStore::get(&pool, "old").await.unwrap_err();
        assert!(matches!(err, StoreError::TaskNotFound(_)));

        let got = TaskStore::get(&pool, "new").await.unwrap();
        assert_eq!(got.config, "{\"window\":5}");
        Ok(())
    }

    #[sqlx::test(migrations = "../tsad-migrate/migrations")]
    async fn list_all_returns_every_row(pool: PgPool) -> sqlx::Result<()> {
        TaskStore::insert(&pool, &record("x")).await.unwrap();
        TaskStore::insert(&pool, &record("y")).await.unwrap();

        let mut names: Vec<_> = TaskStore::list_all(&pool).await.unwrap().into_iter().map(|t| t.name).collect();
        names.sort();
        assert_eq!(names, vec!["x".to_string(), "y".to_string()]);
        Ok(())
    }
}
