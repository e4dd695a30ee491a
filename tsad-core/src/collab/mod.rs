//! Default, real implementations of the external collaborator traits (§4.10):
//! `TSFetcher`, `Preprocessor`, `ModelTrainer`, `AlertSink`, and
//! `SourceDeriver`. These are production wiring, not test doubles — a
//! scriptable fetcher for deterministic tests lives in `tsad-detector` under
//! `#[cfg(test)]`.

pub mod alert;
pub mod deriver;
pub mod fetcher;
pub mod preprocess;
pub mod trainer;

pub use alert::{AlertSink, LoggingAlertSink};
pub use deriver::{DeriveError, IdentitySourceDeriver, SourceDeriver};
pub use fetcher::{DataPoint, FetchContext, FetchError, HttpTsFetcher, TSFetcher};
pub use preprocess::{IdentityPreprocessor, PreprocessError, Preprocessor};
pub use trainer::{ModelAdapter, ModelTrainer, SeasonalNaiveCodec, SeasonalNaiveTrainer, TrainError};
