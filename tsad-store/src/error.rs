//! The store boundary's error type. `sqlx::Error` is wrapped, never leaked
//! raw across the crate boundary (§2.1 ambient stack, error handling).

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("task {0:?} not found")]
    TaskNotFound(String),
    #[error("task {0:?} already exists")]
    TaskExists(String),
}
