//! The per-task processing flow, its renewal task, and the task's series
//! map (§3 "Task (runtime, in a Detector)", §4.6).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tokio::task::JoinSet;
use tsad_core::source::Source;
use tsad_core::task::TaskRuntimeState;
use tsad_core::TaskConfig;

use crate::cancellation::{CancellationGuard, CancellationHandle};
use crate::context::DetectorContext;
use crate::error::DetectorError;
use crate::series::TimeSeries;

const TASK_LEASE: Duration = Duration::minutes(30);
const RENEWAL_TICK: Duration = Duration::minutes(5);
const RENEWAL_FAILURE_LIMIT: u32 = 5;

pub struct Task {
    pub name: String,
    config: TaskConfig,
    state: RwLock<TaskRuntimeState>,
    series: RwLock<HashMap<String, Arc<TimeSeries>>>,
    last_error: RwLock<Option<(String, DateTime<Utc>)>>,
    cancellation: CancellationHandle,
}

impl Task {
    pub fn new(name: impl Into<String>, config: TaskConfig) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            config,
            state: RwLock::new(TaskRuntimeState::Init),
            series: RwLock::new(HashMap::new()),
            last_error: RwLock::new(None),
            cancellation: CancellationHandle::new(),
        })
    }

    pub fn state(&self) -> TaskRuntimeState {
        *self.state.read()
    }

    pub fn last_error(&self) -> Option<(String, DateTime<Utc>)> {
        self.last_error.read().clone()
    }

    pub fn cancellation(&self) -> CancellationHandle {
        self.cancellation.clone()
    }

    pub fn is_active(&self) -> bool {
        self.state() != TaskRuntimeState::Cancel
    }

    pub fn series_snapshot(&self) -> Vec<Arc<TimeSeries>> {
        self.series.read().values().cloned().collect()
    }

    pub fn series_named(&self, name: &str) -> Option<Arc<TimeSeries>> {
        self.series.read().get(name).cloned()
    }

    fn set_state(&self, state: TaskRuntimeState) {
        let mut guard = self.state.write();
        debug_assert!(guard.can_advance_to(state), "invalid task state transition {:?} -> {:?}", *guard, state);
        *guard = state;
    }

    fn record_error(&self, message: String, now: DateTime<Utc>) {
        *self.last_error.write() = Some((message, now));
    }

    /// Closes the task's cancellation handle. All series loops observe it at
    /// their next check and wind down.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// The per-task processing flow: runs until the task is cancelled
    /// (externally, by lease loss, or by a fatal setup error), then
    /// releases its lease and returns.
    pub async fn run(self: Arc<Self>, ctx: Arc<DetectorContext>, source: Source) {
        let _guard = CancellationGuard::new(&self.cancellation);
        self.set_state(TaskRuntimeState::Init);

        let now = ctx.now();
        if let Err(error) = tsad_store::TaskLock::acquire(&ctx.pool, &self.name, &ctx.host, TASK_LEASE, now).await {
            self.record_error(DetectorError::LeaseAcquireFailed(error).to_string(), now);
            self.cancellation.cancel();
            self.set_state(TaskRuntimeState::Cancel);
            return;
        }

        let renewal = tokio::spawn(Self::renewal_loop(self.clone(), ctx.clone()));

        let derived = match ctx.deriver.derive(&source).await {
            Ok(derived) => derived,
            Err(error) => {
                self.record_error(DetectorError::DeriveError(error).to_string(), ctx.now());
                self.cancellation.cancel();
                self.set_state(TaskRuntimeState::Cancel);
                let _ = renewal.await;
                let _ = tsad_store::TaskLock::release(&ctx.pool, &self.name, &ctx.host).await;
                return;
            }
        };

        if derived.is_empty() {
            self.record_error(DetectorError::DeriveEmpty.to_string(), ctx.now());
            self.cancellation.cancel();
            self.set_state(TaskRuntimeState::Cancel);
            let _ = renewal.await;
            let _ = tsad_store::TaskLock::release(&ctx.pool, &self.name, &ctx.host).await;
            return;
        }

        self.set_state(TaskRuntimeState::Derive);

        let mut series_tasks = JoinSet::new();
        {
            let mut series_map = self.series.write();
            for (series_name, concrete_source) in derived {
                let series = Arc::new(TimeSeries::new(self.name.clone(), series_name.clone(), concrete_source));
                series_map.insert(series_name, series.clone());

                let ctx = ctx.clone();
                let config = self.config;
                let cancellation = self.cancellation.clone();
                series_tasks.spawn(async move { series.run(&ctx, &config, &cancellation).await });
            }
        }

        self.set_state(TaskRuntimeState::Process);
        self.cancellation.wait().await;

        while series_tasks.join_next().await.is_some() {}
        let _ = renewal.await;
        let _ = tsad_store::TaskLock::release(&ctx.pool, &self.name, &ctx.host).await;
        self.set_state(TaskRuntimeState::Cancel);
    }

    /// Ticks at `lease / 6` (§4.6); five consecutive renewal failures cancel
    /// the task. Never reads or writes series state, only the task's error
    /// field and the shared cancellation handle (§5 "Ordering").
    async fn renewal_loop(self: Arc<Self>, ctx: Arc<DetectorContext>) {
        let tick = RENEWAL_TICK.to_std().expect("RENEWAL_TICK is positive");
        let mut consecutive_failures: u32 = 0;

        loop {
            tokio::select! {
                _ = self.cancellation.wait() => return,
                _ = ctx.clock.sleep(tick) => {}
            }

            if self.cancellation.is_cancelled() {
                return;
            }

            match tsad_store::TaskLock::renew(&ctx.pool, &self.name, &ctx.host, TASK_LEASE, ctx.now()).await {
                Ok(()) => consecutive_failures = 0,
                Err(error) => {
                    consecutive_failures += 1;
                    tracing::warn!(task = %self.name, %error, attempt = consecutive_failures, "task lease renewal failed");

                    if consecutive_failures >= RENEWAL_FAILURE_LIMIT {
                        self.record_error(DetectorError::LeaseRenewFailed(error).to_string(), ctx.now());
                        self.cancellation.cancel();
                        return;
                    }
                }
            }
        }
    }
}
