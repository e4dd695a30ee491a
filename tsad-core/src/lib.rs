//! Domain types and pure logic shared by the TSAD manager and worker.
//!
//! Nothing in this crate talks to a database or the network directly (the
//! `collab` adapters are the one exception, since a buildable system needs at
//! least one real implementation of each external collaborator). Anything
//! that needs `sqlx` lives in `tsad-store`; anything that drives the
//! fetch/train/monitor loop lives in `tsad-detector`.

pub mod admission;
pub mod balance;
pub mod clock;
pub mod collab;
pub mod config;
pub mod model;
pub mod monitor;
pub mod source;
pub mod task;

pub use admission::AdmissionFilter;
pub use clock::{Clock, SystemClock};
pub use config::TaskConfig;
pub use model::Model;
pub use source::Source;
pub use task::{SeriesRuntimeState, TaskRuntimeState, TaskState};

/// The sentinel lease expiry written by `ControlPlane::submit` so that a
/// freshly submitted task is never mistaken for "expired" before any worker
/// has processed it once. See DESIGN.md, Open Questions.
pub const SUBMIT_LEASE_SENTINEL_YEARS: i32 = 30;
