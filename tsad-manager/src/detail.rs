//! Fan-out aggregation: merges `TaskStore` rows with runtime state queried
//! from the live worker currently owning each task (§4.9 "Query / list",
//! §6 `GET query_task_detail` / `all_task_detail` / `summary`).

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sqlx::PgPool;
use tsad_client::WorkerClient;
use tsad_core::source::Source;
use tsad_core::task::TaskState;
use tsad_detector::TaskDetail as WorkerTaskDetail;
use tsad_store::{StoreError, WorkerRegistry};

#[derive(Debug, Clone, serde::Serialize)]
pub struct TaskDetail {
    pub name: String,
    pub source: Source,
    pub config: String,
    pub state: &'static str,
    pub owner: String,
    pub runtime: Option<WorkerTaskDetail>,
    /// Set when the owning worker couldn't be reached, or the task has no
    /// live owner yet.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Summary {
    pub counts: HashMap<String, u64>,
}

fn worker_url(host: &str, port: u16) -> String {
    format!("http://{host}:{port}")
}

pub async fn query_task_detail(pool: &PgPool, worker_port: u16, name: &str) -> Result<TaskDetail, StoreError> {
    let record = tsad_store::TaskStore::get(pool, name).await?;
    let live_hosts: HashSet<String> = WorkerRegistry::list_live(pool, Utc::now())
        .await?
        .into_iter()
        .map(|w| w.host)
        .collect();

    Ok(merge(record, worker_port, &live_hosts).await)
}

pub async fn all_task_detail(pool: &PgPool, worker_port: u16) -> Result<Vec<TaskDetail>, StoreError> {
    let records = tsad_store::TaskStore::list_all(pool).await?;
    let live_hosts: HashSet<String> = WorkerRegistry::list_live(pool, Utc::now())
        .await?
        .into_iter()
        .map(|w| w.host)
        .collect();

    let mut details = Vec::with_capacity(records.len());
    for record in records {
        details.push(merge(record, worker_port, &live_hosts).await);
    }
    Ok(details)
}

pub async fn summary(pool: &PgPool, worker_port: u16) -> Result<Summary, StoreError> {
    let details = all_task_detail(pool, worker_port).await?;
    let mut counts = HashMap::new();

    for detail in &details {
        *counts.entry(format!("task_{}", detail.state)).or_insert(0) += 1;

        if let Some(runtime) = &detail.runtime {
            for series in &runtime.series {
                *counts.entry(format!("ts_{}", series.state)).or_insert(0) += 1;
            }
        }
    }

    Ok(Summary { counts })
}

async fn merge(record: tsad_core::task::TaskRecord, worker_port: u16, live_hosts: &HashSet<String>) -> TaskDetail {
    let state_str = match record.state {
        TaskState::Running => "running",
        TaskState::Stopped => "stopped",
    };

    let (runtime, error) = if record.owner.is_empty() {
        (None, Some("task has no owner yet".to_string()))
    } else if !live_hosts.contains(&record.owner) {
        (None, Some(format!("owning worker {:?} is not live", record.owner)))
    } else {
        let client = WorkerClient::new(worker_url(&record.owner, worker_port));
        match client.query_task_detail(&record.name).await {
            Ok(detail) => (Some(detail), None),
            Err(error) => (None, Some(error.to_string())),
        }
    };

    TaskDetail {
        name: record.name,
        source: record.source,
        config: record.config,
        state: state_str,
        owner: record.owner,
        runtime,
        error,
    }
}
