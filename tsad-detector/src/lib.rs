//! The worker-side detector engine (§4.6): task and series lifecycles,
//! lease acquisition/renewal, and the fetch/preprocess/train/monitor loop
//! that runs under each derived series.

pub mod cancellation;
pub mod context;
pub mod detector;
pub mod error;
pub mod forecast;
pub mod series;
pub mod task_runtime;
#[cfg(test)]
mod test_support;

pub use cancellation::{CancellationGuard, CancellationHandle};
pub use context::DetectorContext;
pub use detector::{Detector, SeriesDetail, Summary, TaskDetail};
pub use error::DetectorError;
pub use forecast::{canonicalize_stamps, forecast_task, SeriesForecast};
pub use series::TimeSeries;
pub use task_runtime::Task;
