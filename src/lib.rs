//! Model Retrain Service
//!
//! Retrains a model in the background on request:
//! - Extracts training rows from PostgreSQL and formats them into examples
//! - Serializes the examples to a checksummed record file
//! - Runs a random hyperparameter search over a streaming training pipeline
//! - Persists the best model and its metrics under a timestamped directory

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use api::state::AppState;
use domain::retrain::{MetricsAggregator, RetrainQueue, Retrainer, RunHistory};
use infrastructure::{
    extraction::PostgresExtractor,
    formatting::TabularFormatter,
    history::InMemoryRunHistory,
    metrics_store::FsMetricsAggregator,
    persistence::FsModelPersister,
    records::{RecordFilePipelineBuilder, RecordFileWriter},
    retrain::{RetrainComponents, RetrainOrchestrator, RetrainSettings},
    scheduler::RetrainScheduler,
    search::{LinearRegressionTrainer, RandomSearch},
};

/// Wire the production stage implementations into an orchestrator
pub fn build_orchestrator(config: &AppConfig) -> RetrainOrchestrator {
    let trainer = Arc::new(LinearRegressionTrainer::new(
        config.training.validation_every,
    ));

    let components = RetrainComponents {
        extractor: Arc::new(PostgresExtractor::new(
            config.database.url.clone(),
            config.database.query.clone(),
            Duration::from_secs(config.database.connect_timeout_secs),
        )),
        formatter: Arc::new(TabularFormatter::new(
            config.dataset.feature_columns.clone(),
            config.dataset.label_column.clone(),
        )),
        writer: Arc::new(RecordFileWriter::new()),
        pipeline_builder: Arc::new(RecordFilePipelineBuilder::new()),
        search: Arc::new(RandomSearch::new(trainer, config.training.seed)),
        persister: Arc::new(FsModelPersister::new()),
    };

    let settings = RetrainSettings {
        record_path: config.training.record_path.clone(),
        models_dir: config.training.models_dir.clone(),
        num_samples: config.training.num_samples,
        hyperparameter_space: config.training.hyperparameter_space.clone(),
    };

    info!(
        record_path = %settings.record_path.display(),
        models_dir = %settings.models_dir.display(),
        num_samples = settings.num_samples,
        parameters = settings.hyperparameter_space.len(),
        "Retrain orchestrator configured"
    );

    RetrainOrchestrator::new(settings, components)
}

/// Create the application state and start the retrain worker
///
/// Must be called from within a Tokio runtime. The returned handle completes
/// once every clone of the state has been dropped and queued runs finished.
pub fn create_app_state(config: &AppConfig) -> (AppState, JoinHandle<()>) {
    let retrainer: Arc<dyn Retrainer> = Arc::new(build_orchestrator(config));
    let history: Arc<dyn RunHistory> = Arc::new(InMemoryRunHistory::new(config.history.capacity));

    let (scheduler, worker) = RetrainScheduler::start(
        retrainer,
        Arc::clone(&history),
        config.scheduler.queue_depth,
    );
    info!(
        queue_depth = config.scheduler.queue_depth,
        history_capacity = config.history.capacity,
        "Retrain scheduler started"
    );

    let queue: Arc<dyn RetrainQueue> = Arc::new(scheduler);
    let aggregator: Arc<dyn MetricsAggregator> =
        Arc::new(FsMetricsAggregator::new(config.training.models_dir.clone()));

    (AppState::new(queue, aggregator, history), worker)
}
