//! The persisted `Task` row and the in-process runtime state machines that
//! drive it (§3).

use chrono::{DateTime, Utc};

use crate::source::Source;

/// The user-visible lifecycle of a task, persisted in `TaskStore`. Distinct
/// from [`TaskRuntimeState`], which only exists in the worker that currently
/// owns the task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Running,
    Stopped,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Running => "running",
            TaskState::Stopped => "stopped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(TaskState::Running),
            "stopped" => Some(TaskState::Stopped),
            _ => None,
        }
    }
}

/// A durable task row, as read from `TaskStore` (§3 "Task").
#[derive(Clone, Debug, PartialEq)]
pub struct TaskRecord {
    pub name: String,
    pub source: Source,
    pub config: String,
    pub state: TaskState,
    /// The worker host currently processing this task, or empty.
    pub owner: String,
    /// "Unowned" iff this is `<= now`.
    pub lease_expiry: DateTime<Utc>,
}

impl TaskRecord {
    pub fn is_unowned(&self, now: DateTime<Utc>) -> bool {
        self.lease_expiry <= now
    }
}

/// The worker-local lifecycle of a task (§3 "Task (runtime, in a
/// Detector)", §4.6). Transitions only move forward until `Cancel`, which is
/// terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskRuntimeState {
    Init,
    Derive,
    Process,
    Cancel,
}

impl TaskRuntimeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskRuntimeState::Init => "init",
            TaskRuntimeState::Derive => "derive",
            TaskRuntimeState::Process => "process",
            TaskRuntimeState::Cancel => "cancel",
        }
    }

    /// Rejects any attempt to move the state machine backwards, per the
    /// invariant in §3: "taskState transitions only forward until Cancel".
    /// Re-asserting the current state is always allowed, since that isn't a
    /// move in either direction.
    pub fn can_advance_to(&self, next: TaskRuntimeState) -> bool {
        use TaskRuntimeState::*;

        if next == *self {
            return true;
        }

        if *self == Cancel {
            return false;
        }

        matches!(
            (self, next),
            (Init, Derive) | (Init, Cancel) | (Derive, Process) | (Derive, Cancel) | (Process, Cancel)
        )
    }
}

/// The worker-local lifecycle of one derived series under a task (§3
/// "TimeSeries (runtime)", §4.6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeriesRuntimeState {
    Init,
    RecoverSucc,
    RecoverErr,
    Fetch,
    Preprocess,
    Train,
    Monitor,
    Error,
    Cancel,
}

impl SeriesRuntimeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesRuntimeState::Init => "init",
            SeriesRuntimeState::RecoverSucc => "recover_succ",
            SeriesRuntimeState::RecoverErr => "recover_err",
            SeriesRuntimeState::Fetch => "fetch",
            SeriesRuntimeState::Preprocess => "preprocess",
            SeriesRuntimeState::Train => "train",
            SeriesRuntimeState::Monitor => "monitor",
            SeriesRuntimeState::Error => "error",
            SeriesRuntimeState::Cancel => "cancel",
        }
    }
}

/// A worker registration row (§3 "Worker", §4.5).
#[derive(Clone, Debug, PartialEq)]
pub struct WorkerRecord {
    pub host: String,
    pub num_tasks: u32,
    pub last_heartbeat: DateTime<Utc>,
}

/// Liveness window used for both balance decisions and aggregation
/// endpoints (§4.5).
pub const WORKER_LIVENESS: chrono::Duration = chrono::Duration::seconds(120);

impl WorkerRecord {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now - self.last_heartbeat <= WORKER_LIVENESS
    }
}

/// A persisted model artifact (§3 "ModelRecord", §4.7).
#[derive(Clone, Debug, PartialEq)]
pub struct ModelRecord {
    pub source_digest: String,
    pub model_name: String,
    pub blob: Vec<u8>,
    pub trained_at: DateTime<Utc>,
}

/// TTL window for model reuse (§4.6 step 1, §8-8).
pub const MODEL_TTL: chrono::Duration = chrono::Duration::hours(24);

impl ModelRecord {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        now - self.trained_at < MODEL_TTL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_runtime_state_only_moves_forward() {
        assert!(TaskRuntimeState::Init.can_advance_to(TaskRuntimeState::Derive));
        assert!(TaskRuntimeState::Derive.can_advance_to(TaskRuntimeState::Process));
        assert!(!TaskRuntimeState::Process.can_advance_to(TaskRuntimeState::Init));
        assert!(!TaskRuntimeState::Cancel.can_advance_to(TaskRuntimeState::Process));
    }

    #[test]
    fn model_ttl_boundary_matches_spec_example() {
        let now = Utc::now();
        let usable = ModelRecord {
            source_digest: "d".into(),
            model_name: "m".into(),
            blob: vec![],
            trained_at: now - chrono::Duration::hours(23) - chrono::Duration::minutes(59),
        };
        let stale = ModelRecord {
            trained_at: now - chrono::Duration::hours(24) - chrono::Duration::minutes(1),
            ..usable.clone()
        };

        assert!(usable.is_usable(now));
        assert!(!stale.is_usable(now));
    }

    #[test]
    fn worker_liveness_boundary() {
        let now = Utc::now();
        let live = WorkerRecord {
            host: "h".into(),
            num_tasks: 0,
            last_heartbeat: now - chrono::Duration::seconds(120),
        };
        let dead = WorkerRecord {
            last_heartbeat: now - chrono::Duration::seconds(121),
            ..live.clone()
        };

        assert!(live.is_live(now));
        assert!(!dead.is_live(now));
    }
}
