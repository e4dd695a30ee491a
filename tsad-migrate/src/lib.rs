//! Database schema management for the TSAD execution plane.
//!
//! `durable-migrate` implements a bespoke version-tracked migration applier
//! with revert support, because `durable` is a library other people embed at
//! arbitrary versions across codebases they don't control. This schema has a
//! single linear history owned by one deployment, so the standard `sqlx`
//! embedded migration runner is the idiomatic fit instead.

#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    #[error("failed to run database migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Applies every migration under `migrations/` that hasn't already been
/// recorded against `pool`. Safe to call on every process start: already
/// applied migrations are skipped.
pub async fn run(pool: &sqlx::PgPool) -> Result<(), MigrateError> {
    tracing::info!("applying database migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
