//! The single well-known leader lease (§4.3): `LeaderLock` fixed at the key
//! `"lock"`.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::leader_lock::LeaderLock;
use crate::lock::LockError;

const LEASE_KEY: &str = "lock";

pub struct LeaderLease;

impl LeaderLease {
    pub async fn acquire(pool: &PgPool, owner: &str, lease: Duration, now: DateTime<Utc>) -> Result<(), LockError> {
        LeaderLock::acquire(pool, LEASE_KEY, owner, lease, now).await
    }

    pub async fn renew(pool: &PgPool, owner: &str, lease: Duration, now: DateTime<Utc>) -> Result<(), LockError> {
        LeaderLock::renew(pool, LEASE_KEY, owner, lease, now).await
    }

    pub async fn release(pool: &PgPool, owner: &str) -> Result<(), LockError> {
        LeaderLock::release(pool, LEASE_KEY, owner).await
    }
}
