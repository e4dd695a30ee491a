//! The leader-election and dispatch state machine (§4.4). Runs only inside
//! whichever manager process currently holds the leader lease; every other
//! manager keeps retrying acquisition in the background.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tsad_client::{BatchItem, WorkerClient};
use tsad_core::balance::{find_balance_number, plan_handoff};
use tsad_core::task::TaskState;
use tsad_store::{LeaderLease, LockError, TaskStore, WorkerRegistry};

const LEASE: chrono::Duration = chrono::Duration::seconds(60);
const ACQUIRE_RENEW_TICK: Duration = Duration::from_secs(20);
const DISPATCH_TICK: Duration = Duration::from_secs(120);

pub struct Dispatcher {
    pool: PgPool,
    host: String,
    worker_port: u16,
}

enum DutyState {
    NotOnDuty,
    OnDuty { shutdown: watch::Sender<bool>, dispatch: JoinHandle<()> },
}

impl Dispatcher {
    pub fn new(pool: PgPool, host: String, worker_port: u16) -> Arc<Self> {
        Arc::new(Self { pool, host, worker_port })
    }

    /// Never surfaces errors to its caller (§7): the leader loop retries
    /// acquisition indefinitely for as long as the process is alive.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        let mut duty = DutyState::NotOnDuty;

        loop {
            if *shutdown_rx.borrow() {
                if let DutyState::OnDuty { shutdown, dispatch } = duty {
                    let _ = shutdown.send(true);
                    let _ = dispatch.await;
                }
                return;
            }

            duty = match duty {
                DutyState::NotOnDuty => {
                    match LeaderLease::acquire(&self.pool, &self.host, LEASE, Utc::now()).await {
                        Ok(()) => {
                            tracing::info!(host = %self.host, "acquired leader lease");
                            let (tx, rx) = watch::channel(false);
                            let dispatch = tokio::spawn(self.clone().dispatch_loop(rx));
                            DutyState::OnDuty { shutdown: tx, dispatch }
                        }
                        Err(LockError::Held) => DutyState::NotOnDuty,
                        Err(error) => {
                            tracing::warn!(%error, "leader lease acquire failed");
                            DutyState::NotOnDuty
                        }
                    }
                }
                DutyState::OnDuty { shutdown, dispatch } => {
                    match LeaderLease::renew(&self.pool, &self.host, LEASE, Utc::now()).await {
                        Ok(()) => DutyState::OnDuty { shutdown, dispatch },
                        Err(error) => {
                            tracing::warn!(%error, "leader lease renewal failed, stepping down");
                            let _ = shutdown.send(true);
                            let _ = dispatch.await;
                            DutyState::NotOnDuty
                        }
                    }
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(ACQUIRE_RENEW_TICK) => {}
                _ = shutdown_rx.changed() => {}
            }
        }
    }

    /// Runs immediately on start, then every `DISPATCH_TICK` (§4.4).
    async fn dispatch_loop(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            if *shutdown_rx.borrow() {
                return;
            }

            if let Err(error) = self.dispatch_once().await {
                tracing::warn!(%error, "dispatch cycle failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(DISPATCH_TICK) => {}
                _ = shutdown_rx.changed() => {}
            }
        }
    }

    async fn dispatch_once(&self) -> Result<(), tsad_store::StoreError> {
        let now = Utc::now();

        let tasks: Vec<_> = TaskStore::list_all(&self.pool)
            .await?
            .into_iter()
            .filter(|t| t.state == TaskState::Running)
            .collect();

        let workers = WorkerRegistry::list_live(&self.pool, now).await?;
        if workers.is_empty() {
            return Ok(());
        }

        let expired: Vec<_> = tasks.into_iter().filter(|t| t.is_unowned(now)).collect();
        if expired.is_empty() {
            return Ok(());
        }

        let num_tasks: Vec<u32> = workers.iter().map(|w| w.num_tasks).collect();
        let balance = find_balance_number(&num_tasks, expired.len() as u64);
        let plan = plan_handoff(&num_tasks, balance, expired);

        for (worker, assigned) in workers.iter().zip(plan.into_iter()) {
            if assigned.is_empty() {
                continue;
            }

            let batch: Vec<BatchItem> = assigned
                .into_iter()
                .map(|t| BatchItem { name: t.name, source: t.source, config: t.config })
                .collect();

            let client = WorkerClient::new(format!("http://{}:{}", worker.host, self.worker_port));
            if let Err(error) = client.submit_batch_tasks(&batch).await {
                tracing::warn!(host = %worker.host, %error, "failed to hand off expired tasks");
            }
        }

        Ok(())
    }
}
