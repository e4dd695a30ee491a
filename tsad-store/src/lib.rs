//! `sqlx::PgPool`-backed persistence for the TSAD execution plane.
//!
//! Written with runtime-checked `sqlx::query`/`query_as` rather than the
//! compile-time-checked `query!`/`query_as!` macros, since those require
//! either a live `DATABASE_URL` or a committed `.sqlx` offline cache at
//! build time — neither is available here. See DESIGN.md.

pub mod error;
pub mod leader_lease;
pub mod leader_lock;
pub mod lock;
pub mod model_cache;
pub mod task_lock;
pub mod task_store;
pub mod worker_registry;

pub use error::StoreError;
pub use leader_lease::LeaderLease;
pub use leader_lock::LeaderLock;
pub use lock::LockError;
pub use model_cache::ModelCache;
pub use task_lock::TaskLock;
pub use task_store::TaskStore;
pub use worker_registry::WorkerRegistry;
