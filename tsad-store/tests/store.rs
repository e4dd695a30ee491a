//! Integration tests against a real Postgres instance (§2.1 ambient stack,
//! test tooling): DistLock exclusivity and renewal monotonicity, TaskStore
//! round-trips, ModelCache persistence.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use tsad_core::source::Source;
use tsad_core::task::{TaskRecord, TaskState};
use tsad_store::{LockError, ModelCache, TaskLock, TaskStore, WorkerRegistry};

fn sample_task(name: &str) -> TaskRecord {
    TaskRecord {
        name: name.to_string(),
        source: Source::new("tsdb", "sys.cpu", "{host=h1}"),
        config: String::new(),
        state: TaskState::Running,
        owner: String::new(),
        lease_expiry: Utc::now() - Duration::seconds(1),
    }
}

#[sqlx::test(migrations = "../tsad-migrate/migrations")]
async fn task_lock_is_mutually_exclusive(pool: PgPool) {
    let now = Utc::now();
    TaskStore::insert(&pool, &sample_task("t1")).await.unwrap();

    TaskLock::acquire(&pool, "t1", "worker-a", Duration::minutes(30), now)
        .await
        .unwrap();

    let err = TaskLock::acquire(&pool, "t1", "worker-b", Duration::minutes(30), now)
        .await
        .unwrap_err();
    assert!(matches!(err, LockError::Held));
}

#[sqlx::test(migrations = "../tsad-migrate/migrations")]
async fn renew_fails_once_lease_is_stolen(pool: PgPool) {
    let now = Utc::now();
    TaskStore::insert(&pool, &sample_task("t1")).await.unwrap();

    TaskLock::acquire(&pool, "t1", "worker-a", Duration::minutes(1), now)
        .await
        .unwrap();

    // Let the lease expire, then have a different worker steal it.
    let later = now + Duration::minutes(2);
    TaskLock::acquire(&pool, "t1", "worker-b", Duration::minutes(30), later)
        .await
        .unwrap();

    let err = TaskLock::renew(&pool, "t1", "worker-a", Duration::minutes(30), later)
        .await
        .unwrap_err();
    assert!(matches!(err, LockError::Lost));
}

#[sqlx::test(migrations = "../tsad-migrate/migrations")]
async fn renewal_extends_monotonically(pool: PgPool) {
    let now = Utc::now();
    TaskStore::insert(&pool, &sample_task("t1")).await.unwrap();
    TaskLock::acquire(&pool, "t1", "worker-a", Duration::minutes(30), now)
        .await
        .unwrap();

    let first = TaskStore::get(&pool, "t1").await.unwrap().lease_expiry;

    TaskLock::renew(&pool, "t1", "worker-a", Duration::minutes(30), now + Duration::minutes(5))
        .await
        .unwrap();
    let second = TaskStore::get(&pool, "t1").await.unwrap().lease_expiry;

    assert!(second > first);
}

#[sqlx::test(migrations = "../tsad-migrate/migrations")]
async fn task_store_round_trips(pool: PgPool) {
    let task = sample_task("round-trip");
    TaskStore::insert(&pool, &task).await.unwrap();

    let fetched = TaskStore::get(&pool, "round-trip").await.unwrap();
    assert_eq!(fetched.name, task.name);
    assert_eq!(fetched.source, task.source);
    assert_eq!(fetched.state, TaskState::Running);

    TaskStore::update_state(&pool, "round-trip", TaskState::Stopped)
        .await
        .unwrap();
    let fetched = TaskStore::get(&pool, "round-trip").await.unwrap();
    assert_eq!(fetched.state, TaskState::Stopped);

    let all = TaskStore::list_all(&pool).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[sqlx::test(migrations = "../tsad-migrate/migrations")]
async fn inserting_a_duplicate_name_fails(pool: PgPool) {
    TaskStore::insert(&pool, &sample_task("dup")).await.unwrap();
    let err = TaskStore::insert(&pool, &sample_task("dup")).await.unwrap_err();
    assert!(matches!(err, tsad_store::StoreError::TaskExists(_)));
}

#[sqlx::test(migrations = "../tsad-migrate/migrations")]
async fn model_cache_put_get_delete(pool: PgPool) {
    let now = Utc::now();
    ModelCache::put(&pool, "digest-1", "seasonal_naive", b"blob", now)
        .await
        .unwrap();

    let record = ModelCache::get(&pool, "digest-1").await.unwrap().unwrap();
    assert_eq!(record.model_name, "seasonal_naive");
    assert_eq!(record.blob, b"blob");

    ModelCache::delete(&pool, "digest-1").await.unwrap();
    assert!(ModelCache::get(&pool, "digest-1").await.unwrap().is_none());
}

#[sqlx::test(migrations = "../tsad-migrate/migrations")]
async fn worker_registry_heartbeat_upserts(pool: PgPool) {
    let now = Utc::now();
    WorkerRegistry::heartbeat(&pool, "worker-a", 3, now).await.unwrap();
    WorkerRegistry::heartbeat(&pool, "worker-a", 5, now).await.unwrap();

    let workers = WorkerRegistry::list_all(&pool).await.unwrap();
    assert_eq!(workers.len(), 1);
    assert_eq!(workers[0].num_tasks, 5);
}
