//! Linear regression trainer using mini-batch SGD

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::retrain::{
    Hyperparameters, ModelTrainer, ModelWeights, Objective, ParameterValue, TrainedTrial,
    TrainingError, TrainingPipeline,
};

pub const ARCHITECTURE: &str = "linear_regression";
pub const OBJECTIVE_METRIC: &str = "val_mse";

const DEFAULT_LEARNING_RATE: f64 = 0.01;
const DEFAULT_EPOCHS: usize = 10;
const DEFAULT_BATCH_SIZE: usize = 32;
const DEFAULT_L2: f64 = 0.0;

/// Resolved training settings for one trial
#[derive(Debug, Clone, Copy, PartialEq)]
struct TrialSettings {
    learning_rate: f64,
    epochs: usize,
    batch_size: usize,
    l2: f64,
}

impl TrialSettings {
    fn from_hyperparameters(hp: &Hyperparameters) -> Result<Self, TrainingError> {
        let learning_rate = float_param(hp, "learning_rate", DEFAULT_LEARNING_RATE)?;
        if learning_rate <= 0.0 {
            return Err(TrainingError::invalid_hyperparameter(
                "learning_rate",
                "must be positive",
            ));
        }

        let epochs = count_param(hp, "epochs", DEFAULT_EPOCHS)?;
        let batch_size = count_param(hp, "batch_size", DEFAULT_BATCH_SIZE)?;

        let l2 = float_param(hp, "l2", DEFAULT_L2)?;
        if l2 < 0.0 {
            return Err(TrainingError::invalid_hyperparameter("l2", "must not be negative"));
        }

        Ok(Self {
            learning_rate,
            epochs,
            batch_size,
            l2,
        })
    }
}

fn float_param(hp: &Hyperparameters, name: &str, default: f64) -> Result<f64, TrainingError> {
    match hp.get(name) {
        None => Ok(default),
        Some(value) => value
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                TrainingError::invalid_hyperparameter(name, format!("'{}' is not a number", value))
            }),
    }
}

fn count_param(hp: &Hyperparameters, name: &str, default: usize) -> Result<usize, TrainingError> {
    match hp.get(name) {
        None => Ok(default),
        Some(value) => value.as_usize().filter(|v| *v > 0).ok_or_else(|| {
            TrainingError::invalid_hyperparameter(
                name,
                format!("'{}' is not a positive integer", value),
            )
        }),
    }
}

/// Trains `y = w.x + b` and scores it on a hold-out split
///
/// Every `validation_every`-th example (1-based) is held out for validation.
/// Weights start at zero, so a trial is fully determined by its
/// hyperparameters and the example order.
#[derive(Debug, Clone)]
pub struct LinearRegressionTrainer {
    validation_every: usize,
}

impl LinearRegressionTrainer {
    pub fn new(validation_every: usize) -> Self {
        Self {
            validation_every: validation_every.max(2),
        }
    }

    fn is_validation(&self, index: usize) -> bool {
        (index + 1) % self.validation_every == 0
    }
}

impl Default for LinearRegressionTrainer {
    fn default() -> Self {
        Self::new(5)
    }
}

struct Model {
    weights: Vec<f64>,
    bias: f64,
}

impl Model {
    fn predict(&self, features: &[f32]) -> f64 {
        self.weights
            .iter()
            .zip(features)
            .map(|(w, x)| w * *x as f64)
            .sum::<f64>()
            + self.bias
    }

    fn is_finite(&self) -> bool {
        self.bias.is_finite() && self.weights.iter().all(|w| w.is_finite())
    }
}

impl ModelTrainer for LinearRegressionTrainer {
    fn objective(&self) -> Objective {
        Objective::minimize(OBJECTIVE_METRIC)
    }

    fn train(
        &self,
        hyperparameters: &Hyperparameters,
        pipeline: &dyn TrainingPipeline,
    ) -> Result<TrainedTrial, TrainingError> {
        let settings = TrialSettings::from_hyperparameters(hyperparameters)?;
        let width = pipeline.feature_width();

        let mut model = Model {
            weights: vec![0.0; width],
            bias: 0.0,
        };
        let mut grad_w = vec![0.0; width];
        let mut grad_b = 0.0;

        for epoch in 0..settings.epochs {
            let mut in_batch = 0usize;

            for (index, example) in pipeline
                .examples()
                .map_err(|e| TrainingError::data(e.to_string()))?
                .enumerate()
            {
                let example = example.map_err(|e| TrainingError::data(e.to_string()))?;
                if self.is_validation(index) {
                    continue;
                }
                if example.features.len() != width {
                    return Err(TrainingError::data(format!(
                        "example {} has {} features, expected {}",
                        index,
                        example.features.len(),
                        width
                    )));
                }

                let error = model.predict(&example.features) - example.label as f64;
                for (g, x) in grad_w.iter_mut().zip(&example.features) {
                    *g += error * *x as f64;
                }
                grad_b += error;
                in_batch += 1;

                if in_batch == settings.batch_size {
                    apply_step(&mut model, &mut grad_w, &mut grad_b, in_batch, &settings);
                    in_batch = 0;
                }
            }

            if in_batch > 0 {
                apply_step(&mut model, &mut grad_w, &mut grad_b, in_batch, &settings);
            }

            if !model.is_finite() {
                return Err(TrainingError::diverged(format!(
                    "weights became non-finite in epoch {}",
                    epoch + 1
                )));
            }
        }

        let metrics = self.evaluate(&model, pipeline)?;
        let score = metrics[OBJECTIVE_METRIC];

        debug!(
            learning_rate = settings.learning_rate,
            epochs = settings.epochs,
            batch_size = settings.batch_size,
            score,
            "Trial trained"
        );

        let mut tensors = BTreeMap::new();
        tensors.insert(
            "weights".to_string(),
            model.weights.iter().map(|w| *w as f32).collect(),
        );
        tensors.insert("bias".to_string(), vec![model.bias as f32]);

        Ok(TrainedTrial {
            weights: ModelWeights {
                architecture: ARCHITECTURE.to_string(),
                feature_count: width,
                tensors,
            },
            score,
            metrics,
        })
    }
}

fn apply_step(
    model: &mut Model,
    grad_w: &mut [f64],
    grad_b: &mut f64,
    batch: usize,
    settings: &TrialSettings,
) {
    let scale = settings.learning_rate / batch as f64;

    for (w, g) in model.weights.iter_mut().zip(grad_w.iter_mut()) {
        *w -= scale * *g + settings.learning_rate * settings.l2 * *w;
        *g = 0.0;
    }
    model.bias -= scale * *grad_b;
    *grad_b = 0.0;
}

impl LinearRegressionTrainer {
    fn evaluate(
        &self,
        model: &Model,
        pipeline: &dyn TrainingPipeline,
    ) -> Result<BTreeMap<String, f64>, TrainingError> {
        let (mut val_sq, mut val_abs, mut val_n) = (0.0, 0.0, 0usize);
        let (mut train_sq, mut train_abs, mut train_n) = (0.0, 0.0, 0usize);

        for (index, example) in pipeline
            .examples()
            .map_err(|e| TrainingError::data(e.to_string()))?
            .enumerate()
        {
            let example = example.map_err(|e| TrainingError::data(e.to_string()))?;
            let error = model.predict(&example.features) - example.label as f64;

            if self.is_validation(index) {
                val_sq += error * error;
                val_abs += error.abs();
                val_n += 1;
            } else {
                train_sq += error * error;
                train_abs += error.abs();
                train_n += 1;
            }
        }

        if train_n == 0 {
            return Err(TrainingError::data("no training examples after the hold-out split"));
        }

        let train_mse = train_sq / train_n as f64;
        // Too few rows for a hold-out: fall back to the training fit.
        let (val_mse, val_mae) = if val_n == 0 {
            (train_mse, train_abs / train_n as f64)
        } else {
            (val_sq / val_n as f64, val_abs / val_n as f64)
        };

        let mut metrics = BTreeMap::new();
        metrics.insert("val_mse".to_string(), val_mse);
        metrics.insert("val_rmse".to_string(), val_mse.sqrt());
        metrics.insert("val_mae".to_string(), val_mae);
        metrics.insert("train_mse".to_string(), train_mse);
        Ok(metrics)
    }
}

/// Hyperparameters with every trainer setting filled in
pub fn default_hyperparameters() -> Hyperparameters {
    Hyperparameters::new()
        .with("learning_rate", ParameterValue::Float(DEFAULT_LEARNING_RATE))
        .with("epochs", ParameterValue::Int(DEFAULT_EPOCHS as i64))
        .with("batch_size", ParameterValue::Int(DEFAULT_BATCH_SIZE as i64))
        .with("l2", ParameterValue::Float(DEFAULT_L2))
}
