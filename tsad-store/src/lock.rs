//! The result vocabulary shared by `TaskLock` and `LeaderLock` (§4.1).
//! `Held`/`Lost` are expected, non-fatal outcomes callers branch on; only
//! `Store` indicates something actually went wrong talking to the database.

use crate::error::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("lock is held by another owner")]
    Held,
    #[error("lock was lost: expired or stolen by another owner")]
    Lost,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<sqlx::Error> for LockError {
    fn from(error: sqlx::Error) -> Self {
        LockError::Store(StoreError::from(error))
    }
}
