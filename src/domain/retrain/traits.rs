//! Stage and service traits of the retrain pipeline
//!
//! Each pipeline stage sits behind its own trait so the orchestrator can be
//! driven by real infrastructure in production and by doubles in tests.

use std::fmt::Debug;
use std::io;
use std::path::Path;

use async_trait::async_trait;

use super::dataset::{Example, FormattedDataset, RawRecordSet};
use super::error::{RetrainError, SearchError, TrainingError};
use super::hyperparameter::{Hyperparameters, HyperparameterSpace, Objective};
use super::model::{BestModel, ModelMetricsEntry, PersistResult, TrainedTrial};
use super::run::{RetrainOutcome, RunId, RunRecord};
use crate::domain::error::DomainError;

#[cfg(test)]
use mockall::automock;

/// Iterator over the examples of a training pipeline
pub type ExampleIter<'a> = Box<dyn Iterator<Item = io::Result<Example>> + Send + 'a>;

/// Pulls the raw training rows from the relational store
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DataExtractor: Send + Sync {
    async fn query(&self) -> Result<RawRecordSet, RetrainError>;
}

/// Turns raw rows into feature/label examples
#[cfg_attr(test, automock)]
pub trait DataFormatter: Send + Sync {
    fn format(&self, raw: RawRecordSet) -> Result<FormattedDataset, RetrainError>;
}

/// Serializes a formatted dataset to the on-disk record file
#[cfg_attr(test, automock)]
pub trait RecordWriter: Send + Sync {
    fn write(&self, dataset: &FormattedDataset, path: &Path) -> Result<(), RetrainError>;
}

/// A finite, re-iterable stream of training examples
pub trait TrainingPipeline: Send + Sync + Debug {
    /// Number of examples the pipeline yields
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Features per example
    fn feature_width(&self) -> usize;

    /// Start a fresh pass over the examples
    fn examples(&self) -> io::Result<ExampleIter<'_>>;
}

/// Opens a training pipeline over a record file
#[cfg_attr(test, automock)]
pub trait PipelineBuilder: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn TrainingPipeline>, RetrainError>;
}

/// Trains and evaluates one candidate model
pub trait ModelTrainer: Send + Sync {
    /// Metric and direction the trainer's score is reported in
    fn objective(&self) -> Objective;

    fn train(
        &self,
        hyperparameters: &Hyperparameters,
        pipeline: &dyn TrainingPipeline,
    ) -> Result<TrainedTrial, TrainingError>;
}

/// Selects the best model over a number of sampled trials
pub trait HyperparameterSearch: Send + Sync {
    fn search(
        &self,
        space: &HyperparameterSpace,
        num_samples: usize,
        pipeline: &dyn TrainingPipeline,
    ) -> Result<BestModel, SearchError>;
}

/// Writes the best model and its metrics under a fresh directory
#[cfg_attr(test, automock)]
pub trait ModelPersister: Send + Sync {
    fn persist(&self, best: BestModel, directory: &Path) -> Result<PersistResult, RetrainError>;
}

/// Reads the metrics of every persisted model
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MetricsAggregator: Send + Sync {
    async fn list_models(&self) -> Result<Vec<ModelMetricsEntry>, DomainError>;
}

/// Runs one full retrain pipeline
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Retrainer: Send + Sync {
    /// Never fails; stage failures are reported in the outcome
    async fn retrain(&self, run_id: &RunId) -> RetrainOutcome;
}

/// Bounded record of submitted runs
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RunHistory: Send + Sync {
    async fn record_queued(&self, run_id: &RunId) -> Result<(), DomainError>;

    async fn mark_running(&self, run_id: &RunId) -> Result<(), DomainError>;

    async fn record_outcome(&self, outcome: &RetrainOutcome) -> Result<(), DomainError>;

    /// Close a run that finished without an outcome
    async fn record_aborted(&self, run_id: &RunId, error: &str) -> Result<(), DomainError>;

    /// Forget a run that was never accepted
    async fn discard(&self, run_id: &RunId) -> Result<(), DomainError>;

    async fn get(&self, run_id: &RunId) -> Result<Option<RunRecord>, DomainError>;

    /// Most recent first
    async fn list_recent(&self, limit: usize) -> Result<Vec<RunRecord>, DomainError>;
}

/// Accepts retrain requests without waiting for them
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RetrainQueue: Send + Sync {
    async fn submit(&self) -> Result<RunId, DomainError>;

    /// Runs accepted but not yet started
    fn depth(&self) -> usize;
}
