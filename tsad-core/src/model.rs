//! The forecasting model capability (§3 "Model (runtime)").

/// A trained predictor: given a timestamp, produces an expected value and a
/// ± interval. Implementations must be `Send` so the series runtime that
/// owns one can move it across the `tokio` task boundary when cancellation
/// tears it down.
pub trait Model: Send + Sync {
    /// A human-readable name identifying the model kind/version, persisted
    /// alongside the blob so `ModelCache` readers know how to `deserialize`.
    fn name(&self) -> &str;

    /// The expected value at `stamp`.
    fn forecast(&self, stamp: chrono::DateTime<chrono::Utc>) -> f64;

    /// The `(lower, upper)` interval expected to contain observations at
    /// `stamp`.
    fn forecast_interval(&self, stamp: chrono::DateTime<chrono::Utc>) -> (f64, f64);

    /// Serialize to an opaque blob for persistence via `ModelCache`.
    fn serialize(&self) -> Result<Vec<u8>, ModelError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("failed to serialize model: {0}")]
    Serialize(String),
    #[error("failed to deserialize model: {0}")]
    Deserialize(String),
}

/// Deserialization is a free function keyed by model name rather than a
/// trait method, since it has to produce a concrete type (`Box<dyn Model>`)
/// without already having an instance to call it on.
pub trait ModelCodec: Send + Sync {
    /// The `name()` this codec handles; `ModelCache::get` dispatches on this.
    fn model_name(&self) -> &'static str;

    fn deserialize(&self, blob: &[u8]) -> Result<Box<dyn Model>, ModelError>;
}
