//! Seeded random hyperparameter search

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, instrument, warn};

use crate::domain::retrain::{
    BestModel, HyperparameterSearch, HyperparameterSpace, ModelTrainer, SearchError,
    TrainingPipeline, TrialResult,
};

/// Random search over a hyperparameter space
///
/// Assignments are drawn from a generator seeded with `seed` on every call,
/// so the same space, budget and data always select the same model.
pub struct RandomSearch {
    trainer: Arc<dyn ModelTrainer>,
    seed: u64,
}

impl RandomSearch {
    pub fn new(trainer: Arc<dyn ModelTrainer>, seed: u64) -> Self {
        Self { trainer, seed }
    }
}

impl std::fmt::Debug for RandomSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomSearch")
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

impl HyperparameterSearch for RandomSearch {
    #[instrument(skip_all, fields(num_samples = num_samples, seed = self.seed))]
    fn search(
        &self,
        space: &HyperparameterSpace,
        num_samples: usize,
        pipeline: &dyn TrainingPipeline,
    ) -> Result<BestModel, SearchError> {
        if num_samples == 0 {
            return Err(SearchError::InvalidSampleCount);
        }
        space.validate()?;
        if pipeline.is_empty() {
            return Err(SearchError::InsufficientData);
        }

        let objective = self.trainer.objective();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut best: Option<TrialResult> = None;
        let mut failed = 0usize;
        let mut last_error = String::new();

        for trial in 0..num_samples {
            let hyperparameters = space.sample(&mut rng);

            let trained = match self.trainer.train(&hyperparameters, pipeline) {
                Ok(trained) if trained.score.is_finite() => trained,
                Ok(trained) => {
                    warn!(trial, score = trained.score, "Trial produced a non-finite score");
                    failed += 1;
                    last_error = format!("trial {} scored {}", trial, trained.score);
                    continue;
                }
                Err(e) => {
                    warn!(trial, error = %e, "Trial failed");
                    failed += 1;
                    last_error = e.to_string();
                    continue;
                }
            };

            let improved = best
                .as_ref()
                .is_none_or(|b| objective.direction.is_better(trained.score, b.score));

            if improved {
                info!(trial, score = trained.score, metric = %objective.metric, "New best trial");
                best = Some(TrialResult {
                    trial,
                    hyperparameters,
                    weights: trained.weights,
                    score: trained.score,
                    metrics: trained.metrics,
                });
            }
        }

        let result = best.ok_or(SearchError::AllTrialsFailed {
            attempted: num_samples,
            last_error,
        })?;

        info!(
            best_trial = result.trial,
            score = result.score,
            trials_failed = failed,
            "Search complete"
        );

        Ok(BestModel {
            objective,
            result,
            trials_run: num_samples,
            trials_failed: failed,
            num_examples: pipeline.len(),
        })
    }
}
