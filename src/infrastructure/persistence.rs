//! Filesystem model persister

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, instrument};

use crate::domain::retrain::{
    BestModel, MetricsDocument, ModelPersister, PersistResult, RetrainError,
};

pub const WEIGHTS_FILE: &str = "model.json";
pub const METRICS_FILE: &str = "metrics.json";

/// Writes `model.json` and `metrics.json` into a directory it creates itself
///
/// An existing directory is never reused. A failure after the directory was
/// created leaves whatever was written in place.
#[derive(Debug, Default, Clone)]
pub struct FsModelPersister;

impl FsModelPersister {
    pub fn new() -> Self {
        Self
    }
}

fn write_new_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(contents)?;
    file.flush()?;
    file.sync_all()
}

fn persistence_error(action: &str, path: &Path, e: impl std::fmt::Display) -> RetrainError {
    RetrainError::persistence(format!("Failed to {} {}: {}", action, path.display(), e))
}

impl ModelPersister for FsModelPersister {
    #[instrument(skip_all, fields(directory = %directory.display(), score = best.score()))]
    fn persist(&self, best: BestModel, directory: &Path) -> Result<PersistResult, RetrainError> {
        if let Some(parent) = directory.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| persistence_error("create models root", parent, e))?;
        }

        fs::create_dir(directory).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => RetrainError::persistence(format!(
                "model directory {} already exists",
                directory.display()
            )),
            _ => persistence_error("create model directory", directory, e),
        })?;

        let weights = serde_json::to_vec_pretty(&best.result.weights)
            .map_err(|e| RetrainError::persistence(format!("Failed to encode weights: {}", e)))?;
        let weights_sha256 = hex::encode(Sha256::digest(&weights));

        let weights_path = directory.join(WEIGHTS_FILE);
        write_new_file(&weights_path, &weights)
            .map_err(|e| persistence_error("write", &weights_path, e))?;

        let document = MetricsDocument::from_best(&best, weights_sha256.clone(), Utc::now());
        let metrics = serde_json::to_vec_pretty(&document)
            .map_err(|e| RetrainError::persistence(format!("Failed to encode metrics: {}", e)))?;

        let metrics_path = directory.join(METRICS_FILE);
        write_new_file(&metrics_path, &metrics)
            .map_err(|e| persistence_error("write", &metrics_path, e))?;

        let model_name = directory
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        info!(model_name = %model_name, sha256 = %weights_sha256, "Model persisted");

        Ok(PersistResult {
            model_name,
            directory: directory.to_path_buf(),
            weights_path,
            metrics_path,
            weights_sha256,
            score: best.result.score,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::retrain::{
        Hyperparameters, ModelWeights, Objective, ParameterValue, TrialResult,
    };

    pub(crate) fn best_model(score: f64) -> BestModel {
        BestModel {
            objective: Objective::minimize("val_mse"),
            result: TrialResult {
                trial: 2,
                hyperparameters: Hyperparameters::new()
                    .with("learning_rate", ParameterValue::Float(0.05)),
                weights: ModelWeights {
                    architecture: "linear_regression".to_string(),
                    feature_count: 2,
                    tensors: BTreeMap::from([
                        ("weights".to_string(), vec![0.5, -1.0]),
                        ("bias".to_string(), vec![0.25]),
                    ]),
                },
                score,
                metrics: BTreeMap::from([("val_mse".to_string(), score)]),
            },
            trials_run: 5,
            trials_failed: 1,
            num_examples: 100,
        }
    }

    #[test]
    fn test_persist_writes_weights_and_metrics() {
        let root = tempfile::tempdir().unwrap();
        let directory = root.path().join("models").join("1700000000");

        let result = FsModelPersister::new()
            .persist(best_model(0.125), &directory)
            .unwrap();

        assert_eq!(result.model_name, "1700000000");
        assert_eq!(result.score, 0.125);

        let weights = fs::read(&result.weights_path).unwrap();
        assert_eq!(result.weights_sha256, hex::encode(Sha256::digest(&weights)));

        let doc: MetricsDocument =
            serde_json::from_slice(&fs::read(&result.metrics_path).unwrap()).unwrap();
        assert_eq!(doc.score, 0.125);
        assert_eq!(doc.objective, "val_mse");
        assert_eq!(doc.trial, Some(2));
        assert_eq!(doc.num_examples, Some(100));
        assert_eq!(doc.weights_sha256.as_deref(), Some(result.weights_sha256.as_str()));
    }

    #[test]
    fn test_persist_never_overwrites() {
        let root = tempfile::tempdir().unwrap();
        let directory = root.path().join("1700000000");
        let persister = FsModelPersister::new();

        let first = persister.persist(best_model(0.5), &directory).unwrap();
        let before = fs::read(&first.metrics_path).unwrap();

        let err = persister.persist(best_model(0.1), &directory).unwrap_err();
        assert!(matches!(err, RetrainError::Persistence(_)));
        assert!(err.to_string().contains("already exists"));

        assert_eq!(fs::read(&first.metrics_path).unwrap(), before);
        assert_eq!(fs::read_dir(&directory).unwrap().count(), 2);
    }
}
