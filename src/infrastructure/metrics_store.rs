//! Filesystem metrics aggregator

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, error, instrument};

use super::persistence::METRICS_FILE;
use crate::domain::error::DomainError;
use crate::domain::retrain::{MetricsAggregator, MetricsDocument, ModelMetricsEntry};

/// Result of one scan over the models root
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub entries: Vec<ModelMetricsEntry>,
    /// Directories whose metrics could not be read, each logged once at error level
    pub skipped: Vec<SkippedModel>,
}

/// A model directory left out of a scan
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedModel {
    pub model_name: String,
    pub error: String,
}

/// Lists `metrics.json` of every model directory under a root
#[derive(Debug, Clone)]
pub struct FsMetricsAggregator {
    root: PathBuf,
}

impl FsMetricsAggregator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Blocking scan; a missing root yields an empty report
    pub fn scan(&self) -> Result<ScanReport, DomainError> {
        scan_root(&self.root)
    }
}

fn read_metrics(dir: &Path) -> Result<MetricsDocument, String> {
    let path = dir.join(METRICS_FILE);
    let bytes = fs::read(&path).map_err(|e| format!("{}: {}", path.display(), e))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("{}: {}", path.display(), e))
}

fn scan_root(root: &Path) -> Result<ScanReport, DomainError> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(root = %root.display(), "Models root does not exist");
            return Ok(ScanReport::default());
        }
        Err(e) => {
            return Err(DomainError::storage(format!(
                "Failed to read models root {}: {}",
                root.display(),
                e
            )));
        }
    };

    let mut dirs: Vec<(String, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|entry| (entry.file_name().to_string_lossy().into_owned(), entry.path()))
        .collect();
    dirs.sort_by(|a, b| a.0.cmp(&b.0));

    let report = dirs
        .into_iter()
        .fold(ScanReport::default(), |mut report, (model_name, path)| {
            match read_metrics(&path) {
                Ok(metrics) => report.entries.push(ModelMetricsEntry {
                    model_name,
                    metrics,
                }),
                Err(error) => {
                    let skipped = SkippedModel { model_name, error };
                    error!(
                        model_name = %skipped.model_name,
                        error = %skipped.error,
                        "Skipping model with unreadable metrics"
                    );
                    report.skipped.push(skipped);
                }
            }
            report
        });

    Ok(report)
}

#[async_trait]
impl MetricsAggregator for FsMetricsAggregator {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn list_models(&self) -> Result<Vec<ModelMetricsEntry>, DomainError> {
        let root = self.root.clone();
        let report = tokio::task::spawn_blocking(move || scan_root(&root))
            .await
            .map_err(|e| DomainError::internal(format!("Metrics scan task failed: {}", e)))??;

        debug!(
            models = report.entries.len(),
            skipped = report.skipped.len(),
            "Metrics scan complete"
        );
        Ok(report.entries)
    }
}
