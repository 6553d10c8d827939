//! In-memory run history

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::error::DomainError;
use crate::domain::retrain::{RetrainOutcome, RunHistory, RunId, RunRecord};

/// Bounded run history; the oldest finished records are evicted first
#[derive(Debug, Clone)]
pub struct InMemoryRunHistory {
    records: Arc<RwLock<VecDeque<RunRecord>>>,
    capacity: usize,
}

impl InMemoryRunHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }
}

impl Default for InMemoryRunHistory {
    fn default() -> Self {
        Self::new(100)
    }
}

fn find_mut<'a>(
    records: &'a mut VecDeque<RunRecord>,
    run_id: &RunId,
) -> Result<&'a mut RunRecord, DomainError> {
    records
        .iter_mut()
        .find(|r| &r.run_id == run_id)
        .ok_or_else(|| DomainError::not_found(format!("Run '{}'", run_id)))
}

#[async_trait]
impl RunHistory for InMemoryRunHistory {
    async fn record_queued(&self, run_id: &RunId) -> Result<(), DomainError> {
        let mut records = self.records.write().await;

        // runs still queued or running are never evicted
        if records.len() >= self.capacity {
            if let Some(oldest) = records.iter().position(|r| r.status.is_terminal()) {
                records.remove(oldest);
            }
        }
        records.push_back(RunRecord::queued(run_id.clone()));
        Ok(())
    }

    async fn mark_running(&self, run_id: &RunId) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        find_mut(&mut records, run_id)?.mark_running();
        Ok(())
    }

    async fn record_outcome(&self, outcome: &RetrainOutcome) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        find_mut(&mut records, &outcome.run_id)?.apply_outcome(outcome);
        Ok(())
    }

    async fn record_aborted(&self, run_id: &RunId, error: &str) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        find_mut(&mut records, run_id)?.mark_aborted(error);
        Ok(())
    }

        async fn discard(&self, run_id: &RunId) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        records.retain(|r| &r.run_id != run_id);
        Ok(())
    }

    async fn get(&self, run_id: &RunId) -> Result<Option<RunRecord>, DomainError> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| &r.run_id == run_id).cloned())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<RunRecord>, DomainError> {
        let records = self.records.read().await;
        Ok(records.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::retrain::{RetrainStage, RetrainState, RunStatus};

    #[tokio::test]
    async fn test_lifecycle() {
        let history = InMemoryRunHistory::new(10);
        let run_id = RunId::generate();

        history.record_queued(&run_id).await.unwrap();
        assert_eq!(
            history.get(&run_id).await.unwrap().unwrap().status,
            RunStatus::Queued
        );

        history.mark_running(&run_id).await.unwrap();
        history
            .record_outcome(&RetrainOutcome {
                run_id: run_id.clone(),
                state: RetrainState::Failed(RetrainStage::Extracting),
                completed_stages: vec![],
                artifact: None,
                error: Some("Extraction failed: refused".to_string()),
                started_at: Utc::now(),
                finished_at: Utc::now(),
            })
            .await
            .unwrap();

        let record = history.get(&run_id).await.unwrap().unwrap();
        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.failed_stage, Some(RetrainStage::Extracting));
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest_finished_and_lists_newest_first() {
        let history = InMemoryRunHistory::new(2);
        let ids: Vec<RunId> = (0..3).map(|_| RunId::generate()).collect();
        for id in &ids {
            history.record_queued(id).await.unwrap();
            history.record_aborted(id, "stopped").await.unwrap();
        }

        assert!(history.get(&ids[0]).await.unwrap().is_none());

        let recent = history.list_recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].run_id, ids[2]);
        assert_eq!(recent[1].run_id, ids[1]);
    }

    #[tokio::test]
    async fn test_active_runs_survive_a_full_history() {
        let history = InMemoryRunHistory::new(1);
        let running = RunId::generate();
        let queued = RunId::generate();

        history.record_queued(&running).await.unwrap();
        history.mark_running(&running).await.unwrap();
        history.record_queued(&queued).await.unwrap();

        history.record_aborted(&running, "stopped").await.unwrap();
        history.mark_running(&queued).await.unwrap();
        assert_eq!(history.list_recent(10).await.unwrap().len(), 2);

        // the next submission reclaims the finished slot
        let next = RunId::generate();
        history.record_queued(&next).await.unwrap();
        assert!(history.get(&running).await.unwrap().is_none());
        assert_eq!(
            history.get(&queued).await.unwrap().unwrap().status,
            RunStatus::Running
        );
    }

    #[tokio::test]
    async fn test_aborted_run_is_failed() {
        let history = InMemoryRunHistory::default();
        let run_id = RunId::generate();
        history.record_queued(&run_id).await.unwrap();
        history.mark_running(&run_id).await.unwrap();

        history.record_aborted(&run_id, "retrain task panicked").await.unwrap();

        let record = history.get(&run_id).await.unwrap().unwrap();
        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("retrain task panicked"));
    }

    #[tokio::test]
    async fn test_unknown_run_is_not_found() {
        let history = InMemoryRunHistory::default();
        let err = history.mark_running(&RunId::generate()).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_discard_removes_record() {
        let history = InMemoryRunHistory::default();
        let run_id = RunId::generate();
        history.record_queued(&run_id).await.unwrap();
        history.discard(&run_id).await.unwrap();
        assert!(history.get(&run_id).await.unwrap().is_none());
    }
}
