//! Error kinds surfaced at the detector boundary (§7).

use tsad_core::collab::{DeriveError as CoreDeriveError, FetchError, PreprocessError, TrainError};

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    /// Retryable; logged and re-ticked by the monitor loop, counted but not
    /// fatal on its own.
    #[error("transient fetch error: {0}")]
    TransientFetch(#[from] FetchError),

    #[error("preprocessing error: {0}")]
    Preprocess(#[from] PreprocessError),

    /// Causes series abnormal-exit; backoff applies.
    #[error("training error: {0}")]
    Train(#[from] TrainError),

    #[error("model (de)serialization error: {0}")]
    Model(#[from] tsad_core::model::ModelError),

    /// Aborts task setup entirely.
    #[error("failed to acquire task lease: {0}")]
    LeaseAcquireFailed(#[source] tsad_store::LockError),

    /// After 5 consecutive failures, cancels the task.
    #[error("lost task lease: {0}")]
    LeaseRenewFailed(#[source] tsad_store::LockError),

    /// Terminal for the task attempt; Cancel.
    #[error("source derivation produced no series")]
    DeriveEmpty,

    #[error("source derivation failed: {0}")]
    DeriveError(#[from] CoreDeriveError),

    /// Task is accepted at HTTP level but rejected at submit.
    #[error("{}", tsad_core::admission::AdmissionFilter::DENIED_MESSAGE)]
    AdmissionDenied,

    #[error("invalid argument: {0}")]
    ArgumentInvalid(String),

    #[error("task {0:?} not found")]
    TaskNotFound(String),

    #[error("task {0:?} has no model installed yet, try later")]
    NoModelYet(String),

    #[error(transparent)]
    Store(#[from] tsad_store::StoreError),
}
