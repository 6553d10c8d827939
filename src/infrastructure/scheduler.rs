//! Background retrain scheduler
//!
//! Requests are pushed onto a bounded queue drained by a single worker task,
//! so at most one retrain runs at a time and submitting never waits for one.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

use crate::domain::error::DomainError;
use crate::domain::retrain::{RetrainQueue, Retrainer, RunHistory, RunId};
use crate::infrastructure::observability::{record_run_aborted, set_queue_depth};

/// Handle for submitting runs to the retrain worker
#[derive(Clone)]
pub struct RetrainScheduler {
    sender: mpsc::Sender<RunId>,
    history: Arc<dyn RunHistory>,
}

impl std::fmt::Debug for RetrainScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrainScheduler")
            .field("capacity", &self.sender.max_capacity())
            .finish_non_exhaustive()
    }
}

impl RetrainScheduler {
    /// Spawn the worker and return the submission handle
    ///
    /// The worker exits once every handle has been dropped and the queue is
    /// drained.
    pub fn start(
        retrainer: Arc<dyn Retrainer>,
        history: Arc<dyn RunHistory>,
        queue_depth: usize,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(queue_depth.max(1));
        let worker = tokio::spawn(run_worker(receiver, retrainer, Arc::clone(&history)));

        (Self { sender, history }, worker)
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<RunId>,
    retrainer: Arc<dyn Retrainer>,
    history: Arc<dyn RunHistory>,
) {
    info!("Retrain worker started");

    while let Some(run_id) = receiver.recv().await {
        set_queue_depth(receiver.len());

        if let Err(e) = history.mark_running(&run_id).await {
            warn!(run_id = %run_id, error = %e, "Failed to mark run as running");
        }

        // a panicking run must not take the worker down with it
        let task_retrainer = Arc::clone(&retrainer);
        let task_run_id = run_id.clone();
        let handle =
            tokio::spawn(async move { task_retrainer.retrain(&task_run_id).await });

        match handle.await {
            Ok(outcome) => {
                if let Err(e) = history.record_outcome(&outcome).await {
                    warn!(run_id = %run_id, error = %e, "Failed to record run outcome");
                }
            }
            Err(e) => {
                let reason = abort_reason(e);
                error!(run_id = %run_id, error = %reason, "Retrain task aborted");
                record_run_aborted();
                if let Err(e) = history.record_aborted(&run_id, &reason).await {
                    warn!(run_id = %run_id, error = %e, "Failed to record aborted run");
                }
            }
        }
    }

    info!("Retrain worker stopped");
}

fn abort_reason(err: JoinError) -> String {
    if !err.is_panic() {
        return format!("retrain task cancelled: {}", err);
    }

    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("retrain task panicked: {}", message)
}

#[async_trait]
impl RetrainQueue for RetrainScheduler {
    async fn submit(&self) -> Result<RunId, DomainError> {
        let run_id = RunId::generate();
        self.history.record_queued(&run_id).await?;

        match self.sender.try_send(run_id.clone()) {
            Ok(()) => {
                let depth = self.depth();
                set_queue_depth(depth);
                info!(run_id = %run_id, queue_depth = depth, "Retrain run queued");
                Ok(run_id)
            }
            Err(TrySendError::Full(_)) => {
                self.history.discard(&run_id).await?;
                warn!(run_id = %run_id, "Retrain queue is full, rejecting run");
                Err(DomainError::unavailable(
                    "Retrain queue is full, try again later",
                ))
            }
            Err(TrySendError::Closed(_)) => {
                self.history.discard(&run_id).await?;
                error!(run_id = %run_id, "Retrain worker is not running");
                Err(DomainError::internal("Retrain worker is not running"))
            }
        }
    }

    fn depth(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::domain::retrain::{
        MockRetrainer, RetrainOutcome, RetrainStage, RetrainState, RunStatus,
    };
    use crate::infrastructure::history::InMemoryRunHistory;

    fn done(run_id: &RunId) -> RetrainOutcome {
        RetrainOutcome {
            run_id: run_id.clone(),
            state: RetrainState::Done,
            completed_stages: RetrainStage::ALL.to_vec(),
            artifact: None,
            error: None,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    /// Blocks each run until a permit is released
    struct GatedRetrainer {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl Retrainer for GatedRetrainer {
        async fn retrain(&self, run_id: &RunId) -> RetrainOutcome {
            let permit = self.gate.acquire().await.unwrap();
            permit.forget();
            done(run_id)
        }
    }

    struct PanickingRetrainer;

    #[async_trait]
    impl Retrainer for PanickingRetrainer {
        async fn retrain(&self, _run_id: &RunId) -> RetrainOutcome {
            panic!("trainer exploded");
        }
    }

    async fn wait_for(history: &InMemoryRunHistory, run_id: &RunId, status: RunStatus) {
        for _ in 0..500 {
            if let Some(record) = history.get(run_id).await.unwrap() {
                if record.status == status {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run {} never reached {}", run_id, status);
    }

    #[tokio::test]
    async fn test_submitted_run_completes_in_background() {
        let mut retrainer = MockRetrainer::new();
        retrainer.expect_retrain().times(1).returning(done);

        let history = Arc::new(InMemoryRunHistory::new(10));
        let (scheduler, _worker) = RetrainScheduler::start(Arc::new(retrainer), history.clone(), 4);

        let run_id = scheduler.submit().await.unwrap();
        wait_for(&history, &run_id, RunStatus::Succeeded).await;
    }

    #[tokio::test]
    async fn test_panicking_run_is_recorded_as_failed() {
        let history = Arc::new(InMemoryRunHistory::new(10));
        let (scheduler, _worker) =
            RetrainScheduler::start(Arc::new(PanickingRetrainer), history.clone(), 4);

        let run_id = scheduler.submit().await.unwrap();
        wait_for(&history, &run_id, RunStatus::Failed).await;

        let record = history.get(&run_id).await.unwrap().unwrap();
        assert!(record.finished_at.is_some());
        assert!(record.error.unwrap().contains("trainer exploded"));

        // the worker keeps serving after a panic
        let next = scheduler.submit().await.unwrap();
        wait_for(&history, &next, RunStatus::Failed).await;
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_recording() {
        let gate = Arc::new(Semaphore::new(0));
        let history = Arc::new(InMemoryRunHistory::new(10));
        let (scheduler, _worker) = RetrainScheduler::start(
            Arc::new(GatedRetrainer { gate: gate.clone() }),
            history.clone(),
            1,
        );

        let running = scheduler.submit().await.unwrap();
        wait_for(&history, &running, RunStatus::Running).await;

        let queued = scheduler.submit().await.unwrap();
        assert_eq!(scheduler.depth(), 1);

        let err = scheduler.submit().await.unwrap_err();
        assert!(matches!(err, DomainError::Unavailable { .. }));
        assert_eq!(history.list_recent(10).await.unwrap().len(), 2);

        gate.add_permits(2);
        wait_for(&history, &running, RunStatus::Succeeded).await;
        wait_for(&history, &queued, RunStatus::Succeeded).await;
    }

    #[tokio::test]
    async fn test_runs_execute_one_at_a_time() {
        let gate = Arc::new(Semaphore::new(0));
        let history = Arc::new(InMemoryRunHistory::new(10));
        let (scheduler, _worker) = RetrainScheduler::start(
            Arc::new(GatedRetrainer { gate: gate.clone() }),
            history.clone(),
            4,
        );

        let first = scheduler.submit().await.unwrap();
        let second = scheduler.submit().await.unwrap();
        wait_for(&history, &first, RunStatus::Running).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            history.get(&second).await.unwrap().unwrap().status,
            RunStatus::Queued
        );

        gate.add_permits(2);
        wait_for(&history, &second, RunStatus::Succeeded).await;
    }
}
