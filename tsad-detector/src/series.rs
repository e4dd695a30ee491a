//! A derived concrete series under a task: `processOnce`, the monitor loop,
//! and the outer retry/backoff wrapper around both (§3 "TimeSeries
//! (runtime)", §4.6).

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::Rng;
use tsad_core::collab::trainer::default_adapter;
use tsad_core::collab::FetchContext;
use tsad_core::model::Model;
use tsad_core::monitor::is_bad_point;
use tsad_core::source::Source;
use tsad_core::task::SeriesRuntimeState;
use tsad_core::TaskConfig;

use crate::cancellation::CancellationHandle;
use crate::context::DetectorContext;
use crate::error::DetectorError;

const BACKOFF_START: Duration = Duration::from_secs(600);
const BACKOFF_CAP: Duration = Duration::from_secs(6 * 3600);
const BACKOFF_MULTIPLIER: f64 = 1.5;
const RETRAIN_DEADLINE_MIN_HOURS: f64 = 24.0;
const RETRAIN_DEADLINE_MAX_HOURS: f64 = 36.0;
const STALE_ALERT_MINUTES: i64 = 15;

/// How `processOnce`/the monitor loop ended, distinct from `DetectorError`
/// since a normal retrain and a cancellation both need to short-circuit the
/// outer retry loop without looking like a failure.
enum Exit {
    /// Model expired or retrain wanted: loop immediately, no backoff.
    Retrain,
    Cancelled,
    Abnormal(DetectorError),
}

pub struct TimeSeries {
    pub task_name: String,
    pub name: String,
    pub source: Source,
    state: RwLock<SeriesRuntimeState>,
    model: RwLock<Option<Box<dyn Model>>>,
    last_error: RwLock<Option<(String, DateTime<Utc>)>>,
}

impl TimeSeries {
    pub fn new(task_name: impl Into<String>, name: impl Into<String>, source: Source) -> Self {
        Self {
            task_name: task_name.into(),
            name: name.into(),
            source,
            state: RwLock::new(SeriesRuntimeState::Init),
            model: RwLock::new(None),
            last_error: RwLock::new(None),
        }
    }

    pub fn state(&self) -> SeriesRuntimeState {
        *self.state.read()
    }

    pub fn last_error(&self) -> Option<(String, DateTime<Utc>)> {
        self.last_error.read().clone()
    }

    pub fn has_model(&self) -> bool {
        self.model.read().is_some()
    }

    pub fn forecast_interval(&self, stamp: DateTime<Utc>) -> Option<(f64, f64)> {
        self.model.read().as_ref().map(|m| m.forecast_interval(stamp))
    }

    fn set_state(&self, state: SeriesRuntimeState) {
        *self.state.write() = state;
    }

    fn install_model(&self, model: Box<dyn Model>) {
        *self.model.write() = Some(model);
    }

    fn record_error(&self, message: String, now: DateTime<Utc>) {
        *self.last_error.write() = Some((message, now));
    }

    /// Resets the series to Init with no model, retaining its identity
    /// (§3 "Reset()").
    pub fn reset(&self) {
        self.set_state(SeriesRuntimeState::Init);
        *self.model.write() = None;
    }

    /// The outer retry loop: runs `process_once` repeatedly until the task
    /// is cancelled, applying multiplicative backoff after abnormal exits.
    pub async fn run(&self, ctx: &DetectorContext, config: &TaskConfig, cancellation: &CancellationHandle) {
        let mut backoff = BACKOFF_START;

        loop {
            match self.process_once(ctx, config, cancellation).await {
                Exit::Retrain => continue,
                Exit::Cancelled => {
                    self.set_state(SeriesRuntimeState::Cancel);
                    return;
                }
                Exit::Abnormal(error) => {
                    tracing::warn!(series = %self.name, task = %self.task_name, %error, "series processing failed");
                    self.record_error(error.to_string(), ctx.now());
                    self.set_state(SeriesRuntimeState::Error);

                    if cancellation.is_cancelled() {
                        self.set_state(SeriesRuntimeState::Cancel);
                        return;
                    }

                    tokio::select! {
                        _ = cancellation.wait() => {
                            self.set_state(SeriesRuntimeState::Cancel);
                            return;
                        }
                        _ = ctx.clock.sleep(backoff) => {}
                    }

                    backoff = backoff
                        .mul_f64(BACKOFF_MULTIPLIER)
                        .min(BACKOFF_CAP);
                }
            }
        }
    }

    async fn process_once(
        &self,
        ctx: &DetectorContext,
        config: &TaskConfig,
        cancellation: &CancellationHandle,
    ) -> Exit {
        if cancellation.is_cancelled() {
            return Exit::Cancelled;
        }

        let now = ctx.now();
        let recovered = match tsad_store::ModelCache::get(&ctx.pool, &self.source.digest()).await {
            Ok(Some(record)) if record.is_usable(now) => ctx
                .find_codec(&record.model_name)
                .and_then(|codec| codec.deserialize(&record.blob).ok()),
            Ok(_) => None,
            Err(error) => {
                tracing::warn!(%error, "model cache lookup failed, retraining from scratch");
                None
            }
        };

        if let Some(model) = recovered {
            self.set_state(SeriesRuntimeState::RecoverSucc);
            self.install_model(model);
        } else {
            self.set_state(SeriesRuntimeState::RecoverErr);

            if cancellation.is_cancelled() {
                return Exit::Cancelled;
            }

            let begin = now - chrono::Duration::days(config.training_data_length_days);
            let points = match ctx.fetch(&self.source, &FetchContext::default(), begin, now).await {
                Ok(points) => points,
                Err(error) => return Exit::Abnormal(error.into()),
            };
            self.set_state(SeriesRuntimeState::Fetch);

            if cancellation.is_cancelled() {
                return Exit::Cancelled;
            }

            let points = match ctx.preprocessor.process(points).await {
                Ok(points) => points,
                Err(error) => return Exit::Abnormal(error.into()),
            };
            self.set_state(SeriesRuntimeState::Preprocess);

            if cancellation.is_cancelled() {
                return Exit::Cancelled;
            }

            let model = match ctx.trainer.train(&points, &*default_adapter()).await {
                Ok(model) => model,
                Err(error) => return Exit::Abnormal(error.into()),
            };
            self.set_state(SeriesRuntimeState::Train);

            if let Err(error) = persist(ctx, &self.source, model.as_ref(), now).await {
                tracing::warn!(%error, series = %self.name, "failed to persist trained model");
            }
            self.install_model(model);
        }

        self.set_state(SeriesRuntimeState::Monitor);
        self.monitor_loop(ctx, config, cancellation).await
    }

    async fn monitor_loop(&self, ctx: &DetectorContext, config: &TaskConfig, cancellation: &CancellationHandle) -> Exit {
        let deadline_hours = rand::thread_rng().gen_range(RETRAIN_DEADLINE_MIN_HOURS..RETRAIN_DEADLINE_MAX_HOURS);
        let deadline = ctx.now() + chrono::Duration::milliseconds((deadline_hours * 3_600_000.0) as i64);

        let check_freq_min = config.check_freq_min.max(1);
        let check_freq = Duration::from_secs((check_freq_min as u64) * 60);
        let check_window = chrono::Duration::minutes(config.check_data_min);
        let sensitivity = config.alert_sensitive;
        let mut consecutive_alert_minutes: i64 = 0;

        loop {
            tokio::select! {
                _ = cancellation.wait() => return Exit::Cancelled,
                _ = ctx.clock.sleep(check_freq) => {}
            }

            if cancellation.is_cancelled() {
                return Exit::Cancelled;
            }

            let now = ctx.now();
            if now > deadline {
                return Exit::Retrain;
            }

            let begin = now - check_window;
            let points = match ctx.fetch(&self.source, &FetchContext::default(), begin, now).await {
                Ok(points) => points,
                Err(error) => {
                    tracing::warn!(%error, series = %self.name, "monitor fetch failed");
                    continue;
                }
            };

            if points.is_empty() {
                continue;
            }

            let alert = {
                let guard = self.model.read();
                let Some(model) = guard.as_ref() else {
                    continue;
                };

                let mut all_bad = true;
                for point in &points {
                    let (lower, upper) = model.forecast_interval(point.stamp);
                    if !is_bad_point(point.value, lower, upper, sensitivity) {
                        all_bad = false;
                        break;
                    }
                }

                if all_bad {
                    let last = *points.last().expect("checked non-empty above");
                    let (lower, upper) = model.forecast_interval(last.stamp);
                    Some((lower, upper, last))
                } else {
                    None
                }
            };

            match alert {
                Some((lower, upper, last)) => {
                    ctx.alert_sink.alert(&self.task_name, &self.name, lower, upper, last).await;
                    consecutive_alert_minutes += check_freq_min;
                }
                None => consecutive_alert_minutes = 0,
            }

            if consecutive_alert_minutes > STALE_ALERT_MINUTES {
                return Exit::Retrain;
            }
        }
    }
}

async fn persist(
    ctx: &DetectorContext,
    source: &Source,
    model: &dyn Model,
    trained_at: DateTime<Utc>,
) -> Result<(), DetectorError> {
    let blob = model.serialize()?;
    tsad_store::ModelCache::put(&ctx.pool, &source.digest(), model.name(), &blob, trained_at).await?;
    Ok(())
}
