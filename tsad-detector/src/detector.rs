//! The in-worker engine owning every task hosted on this process (§4.6):
//! the `name -> Task` map, submit/cancel/retrain, and the detail/summary
//! views backing the worker's HTTP surface.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tsad_core::source::Source;
use tsad_core::TaskConfig;

use crate::context::DetectorContext;
use crate::error::DetectorError;
use crate::task_runtime::Task;

/// Per-series view returned by `all_ts_detail` and embedded in `TaskDetail`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SeriesDetail {
    pub task_name: String,
    pub series_name: String,
    pub source: Source,
    pub state: String,
    pub has_model: bool,
    pub error: Option<String>,
}

/// Per-task view returned by `query_task_detail` / `all_task_detail`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TaskDetail {
    pub name: String,
    pub state: String,
    pub error: Option<String>,
    pub series: Vec<SeriesDetail>,
}

/// Counts keyed `task_<state>` and `ts_<state>`, matching the manager's
/// fan-out aggregation (§6 `GET summary`).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Summary {
    pub counts: HashMap<String, u64>,
}

pub struct Detector {
    ctx: Arc<DetectorContext>,
    tasks: RwLock<HashMap<String, Arc<Task>>>,
}

impl Detector {
    pub fn new(ctx: Arc<DetectorContext>) -> Self {
        Self { ctx, tasks: RwLock::new(HashMap::new()) }
    }

    /// In-memory tasks whose runtime state isn't Cancel, used to populate
    /// this worker's heartbeat row (§4.5).
    pub fn num_active_tasks(&self) -> u32 {
        self.tasks.read().values().filter(|t| t.is_active()).count() as u32
    }

    pub(crate) fn task_named(&self, name: &str) -> Result<Arc<Task>, DetectorError> {
        self.tasks
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DetectorError::TaskNotFound(name.to_string()))
    }

    /// Admission-filters, then spawns the task's processing flow in the
    /// background (§4.6 step 1). Returns as soon as the task is registered,
    /// not once it reaches Process.
    pub async fn submit_task(&self, name: String, source: Source, config: TaskConfig) -> Result<(), DetectorError> {
        if !self.ctx.admission.allows(&source) {
            return Err(DetectorError::AdmissionDenied);
        }

        let task = Task::new(name.clone(), config);
        self.tasks.write().insert(name, task.clone());

        let ctx = self.ctx.clone();
        tokio::spawn(task.run(ctx, source));

        Ok(())
    }

    /// `{name, source, config}` triples, returning one result per item in
    /// order (§6 `POST submit_batch_tasks`).
    pub async fn submit_batch(&self, batch: Vec<(String, Source, TaskConfig)>) -> Vec<Result<(), String>> {
        let mut results = Vec::with_capacity(batch.len());
        for (name, source, config) in batch {
            results.push(self.submit_task(name, source, config).await.map_err(|e| e.to_string()));
        }
        results
    }

    pub fn cancel_task(&self, name: &str) -> Result<(), DetectorError> {
        self.task_named(name)?.cancel();
        Ok(())
    }

    /// Deletes the cached model for every series under the task, then
    /// cancels it so the dispatcher reassigns it and the detector that picks
    /// it back up trains from scratch (§4.9 Retrain).
    pub async fn retrain_task(&self, name: &str) -> Result<(), DetectorError> {
        let task = self.task_named(name)?;

        for series in task.series_snapshot() {
            tsad_store::ModelCache::delete(&self.ctx.pool, &series.source.digest()).await?;
        }

        task.cancel();
        Ok(())
    }

    pub fn query_task_detail(&self, name: &str) -> Result<TaskDetail, DetectorError> {
        Ok(detail_of(&self.task_named(name)?))
    }

    pub fn all_task_detail(&self) -> Vec<TaskDetail> {
        self.tasks.read().values().map(detail_of).collect()
    }

    pub fn all_ts_detail(&self) -> Vec<SeriesDetail> {
        self.tasks
            .read()
            .values()
            .flat_map(|task| task.series_snapshot())
            .map(|series| SeriesDetail {
                task_name: series.task_name.clone(),
                series_name: series.name.clone(),
                source: series.source.clone(),
                state: series.state().as_str().to_string(),
                has_model: series.has_model(),
                error: series.last_error().map(|(m, _)| m),
            })
            .collect()
    }

    pub fn summary(&self) -> Summary {
        let mut counts = HashMap::new();

        for task in self.tasks.read().values() {
            *counts.entry(format!("task_{}", task.state().as_str())).or_insert(0) += 1;

            for series in task.series_snapshot() {
                *counts.entry(format!("ts_{}", series.state().as_str())).or_insert(0) += 1;
            }
        }

        Summary { counts }
    }

    /// Drops tasks that have fully wound down to Cancel from the map. The
    /// heartbeat loop calls this periodically so long-lived workers don't
    /// accumulate dead entries.
    pub fn prune_cancelled(&self) {
        self.tasks.write().retain(|_, task| task.is_active());
    }
}

fn detail_of(task: &Arc<Task>) -> TaskDetail {
    TaskDetail {
        name: task.name.clone(),
        state: task.state().as_str().to_string(),
        error: task.last_error().map(|(m, _)| m),
        series: task
            .series_snapshot()
            .into_iter()
            .map(|series| SeriesDetail {
                task_name: series.task_name.clone(),
                series_name: series.name.clone(),
                source: series.source.clone(),
                state: series.state().as_str().to_string(),
                has_model: series.has_model(),
                error: series.last_error().map(|(m, _)| m),
            })
            .collect(),
    }
}
