//! Shared, injectable dependencies threaded through every task/series loop
//! hosted by a worker (§4.10, §5). One `DetectorContext` is built per worker
//! process and `Arc`-shared across every task and series it hosts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tsad_core::admission::AdmissionFilter;
use tsad_core::collab::{
    AlertSink, DataPoint, FetchContext, FetchError, ModelTrainer, Preprocessor, SourceDeriver, TSFetcher,
};
use tsad_core::model::ModelCodec;
use tsad_core::source::Source;
use tsad_core::Clock;

pub struct DetectorContext {
    pub host: String,
    pub pool: sqlx::PgPool,
    pub clock: Arc<dyn Clock>,
    pub deriver: Arc<dyn SourceDeriver>,
    pub fetcher: Arc<dyn TSFetcher>,
    pub preprocessor: Arc<dyn Preprocessor>,
    pub trainer: Arc<dyn ModelTrainer>,
    pub alert_sink: Arc<dyn AlertSink>,
    pub admission: Arc<AdmissionFilter>,
    pub codecs: Vec<Arc<dyn ModelCodec>>,
    /// Bounded-capacity concurrency limiter on fetches (default 5 in-flight,
    /// §5); `noblock` requests bypass it entirely rather than busy-waiting.
    pub fetch_semaphore: Arc<Semaphore>,
}

impl DetectorContext {
    pub fn find_codec(&self, model_name: &str) -> Option<&Arc<dyn ModelCodec>> {
        self.codecs.iter().find(|c| c.model_name() == model_name)
    }

    pub async fn fetch(
        &self,
        source: &Source,
        ctx: &FetchContext,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DataPoint>, FetchError> {
        if ctx.noblock {
            self.fetcher.fetch(ctx, source, begin, end).await
        } else {
            let _permit = self
                .fetch_semaphore
                .acquire()
                .await
                .expect("fetch semaphore is never closed");
            self.fetcher.fetch(ctx, source, begin, end).await
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
