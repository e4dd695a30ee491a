//! Expansion of a task's (possibly wildcarded) source into one or more
//! concrete series (§4.6 step 4). Out of scope as business logic alongside
//! the other collaborators in §4.10: a real metrics backend would expand a
//! wildcarded tag query into the set of matching series names.

use crate::source::Source;

#[derive(Debug, thiserror::Error)]
pub enum DeriveError {
    #[error("source derivation failed: {0}")]
    Other(String),
}

#[async_trait::async_trait]
pub trait SourceDeriver: Send + Sync {
    /// Returns `(series_name, concrete_source)` pairs. An empty result is
    /// treated by the task runtime as `DeriveEmpty`, not an error.
    async fn derive(&self, source: &Source) -> Result<Vec<(String, Source)>, DeriveError>;
}

/// Treats the source as already concrete: one series, keyed by `source.key`.
/// A real TSDB-backed deriver would instead query for matching tag sets when
/// `key`/`extra` carry wildcards.
pub struct IdentitySourceDeriver;

#[async_trait::async_trait]
impl SourceDeriver for IdentitySourceDeriver {
    async fn derive(&self, source: &Source) -> Result<Vec<(String, Source)>, DeriveError> {
        Ok(vec![(source.key.clone(), source.clone())])
    }
}
