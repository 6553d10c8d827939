//! Application state shared by the handlers

use std::sync::Arc;

use crate::domain::retrain::{MetricsAggregator, RetrainQueue, RunHistory};

/// Services behind the HTTP API, held as trait objects
#[derive(Clone)]
pub struct AppState {
    pub retrain_queue: Arc<dyn RetrainQueue>,
    pub metrics_aggregator: Arc<dyn MetricsAggregator>,
    pub run_history: Arc<dyn RunHistory>,
}

impl AppState {
    pub fn new(
        retrain_queue: Arc<dyn RetrainQueue>,
        metrics_aggregator: Arc<dyn MetricsAggregator>,
        run_history: Arc<dyn RunHistory>,
    ) -> Self {
        Self {
            retrain_queue,
            metrics_aggregator,
            run_history,
        }
    }
}
