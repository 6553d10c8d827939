//! Trained model, trial and artifact types

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::hyperparameter::{Direction, Hyperparameters, Objective};

/// Named parameter tensors of a trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelWeights {
    pub architecture: String,
    pub feature_count: usize,
    pub tensors: BTreeMap<String, Vec<f32>>,
}

/// What a trainer returns for a single hyperparameter assignment
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedTrial {
    pub weights: ModelWeights,
    /// Objective score
    pub score: f64,
    /// Per-metric breakdown, including the objective metric
    pub metrics: BTreeMap<String, f64>,
}

/// A scored candidate model from one trial
#[derive(Debug, Clone, PartialEq)]
pub struct TrialResult {
    pub trial: usize,
    pub hyperparameters: Hyperparameters,
    pub weights: ModelWeights,
    pub score: f64,
    pub metrics: BTreeMap<String, f64>,
}

/// The winning trial of a search
#[derive(Debug, Clone, PartialEq)]
pub struct BestModel {
    pub objective: Objective,
    pub result: TrialResult,
    pub trials_run: usize,
    pub trials_failed: usize,
    pub num_examples: usize,
}

impl BestModel {
    pub fn score(&self) -> f64 {
        self.result.score
    }
}

/// Metrics stored alongside a persisted model as `metrics.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsDocument {
    pub objective: String,
    pub direction: Direction,
    pub score: f64,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub hyperparameters: Hyperparameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trials_run: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_examples: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl MetricsDocument {
    pub fn from_best(best: &BestModel, weights_sha256: String, created_at: DateTime<Utc>) -> Self {
        Self {
            objective: best.objective.metric.clone(),
            direction: best.objective.direction,
            score: best.result.score,
            metrics: best.result.metrics.clone(),
            hyperparameters: best.result.hyperparameters.clone(),
            trial: Some(best.result.trial),
            trials_run: Some(best.trials_run),
            num_examples: Some(best.num_examples),
            weights_sha256: Some(weights_sha256),
            created_at: Some(created_at),
        }
    }
}

/// Where and what a successful persist wrote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistResult {
    pub model_name: String,
    pub directory: PathBuf,
    pub weights_path: PathBuf,
    pub metrics_path: PathBuf,
    pub weights_sha256: String,
    pub score: f64,
}

/// One persisted model as reported by the metrics listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetricsEntry {
    pub model_name: String,
    pub metrics: MetricsDocument,
}
