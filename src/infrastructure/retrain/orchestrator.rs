//! Retrain orchestrator - drives one run through every pipeline stage

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info, instrument};

use crate::domain::retrain::{
    DataExtractor, DataFormatter, HyperparameterSearch, HyperparameterSpace, ModelPersister,
    PersistResult, PipelineBuilder, RecordWriter, RetrainError, RetrainMachine, RetrainOutcome,
    RetrainStage, RetrainState, Retrainer, RunId,
};
use crate::infrastructure::observability::{record_run_outcome, record_stage_duration};

/// Paths and search budget for every run
#[derive(Debug, Clone)]
pub struct RetrainSettings {
    /// Record file, overwritten by each run
    pub record_path: PathBuf,
    /// Root under which one directory per successful run is created
    pub models_dir: PathBuf,
    pub num_samples: usize,
    pub hyperparameter_space: HyperparameterSpace,
}

/// Stage implementations the orchestrator sequences
#[derive(Clone)]
pub struct RetrainComponents {
    pub extractor: Arc<dyn DataExtractor>,
    pub formatter: Arc<dyn DataFormatter>,
    pub writer: Arc<dyn RecordWriter>,
    pub pipeline_builder: Arc<dyn PipelineBuilder>,
    pub search: Arc<dyn HyperparameterSearch>,
    pub persister: Arc<dyn ModelPersister>,
}

/// Sequences extract, format, serialize, pipeline, search and persist
///
/// A failing stage halts the run; nothing after it executes and no model
/// directory is published. CPU and file-bound stages run on the blocking pool.
#[derive(Clone)]
pub struct RetrainOrchestrator {
    settings: Arc<RetrainSettings>,
    components: RetrainComponents,
}

impl std::fmt::Debug for RetrainOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrainOrchestrator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Run a synchronous stage body on the blocking pool
async fn blocking<T, F>(stage: RetrainStage, f: F) -> Result<T, RetrainError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, RetrainError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RetrainError::for_stage(stage, format!("stage task aborted: {}", e)))?
}

impl RetrainOrchestrator {
    pub fn new(settings: RetrainSettings, components: RetrainComponents) -> Self {
        Self {
            settings: Arc::new(settings),
            components,
        }
    }

    pub fn settings(&self) -> &RetrainSettings {
        &self.settings
    }

    fn begin(
        machine: &mut RetrainMachine,
        run_id: &RunId,
        stage: RetrainStage,
    ) -> Result<Instant, RetrainError> {
        machine
            .enter(stage)
            .map_err(|e| RetrainError::for_stage(stage, e.to_string()))?;
        info!(run_id = %run_id, stage = %stage, "Stage started");
        Ok(Instant::now())
    }

    fn end<T>(
        run_id: &RunId,
        stage: RetrainStage,
        started: Instant,
        result: Result<T, RetrainError>,
    ) -> Result<T, RetrainError> {
        let elapsed = started.elapsed();
        record_stage_duration(stage, result.is_ok(), elapsed);

        if result.is_ok() {
            info!(
                run_id = %run_id,
                stage = %stage,
                duration_ms = elapsed.as_millis() as u64,
                "Stage completed"
            );
        }
        result
    }

    async fn run_stages(
        &self,
        run_id: &RunId,
        machine: &mut RetrainMachine,
        started_at: DateTime<Utc>,
    ) -> Result<PersistResult, RetrainError> {
        let c = &self.components;
        let settings = &self.settings;

        let stage = RetrainStage::Extracting;
        let t = Self::begin(machine, run_id, stage)?;
        let raw = Self::end(run_id, stage, t, c.extractor.query().await)?;
        info!(run_id = %run_id, rows = raw.len(), "Rows extracted");

        let stage = RetrainStage::Formatting;
        let t = Self::begin(machine, run_id, stage)?;
        let formatter = Arc::clone(&c.formatter);
        // the raw rows move into the task and are dropped there
        let formatted = blocking(stage, move || formatter.format(raw)).await;
        let dataset = Self::end(run_id, stage, t, formatted)?;
        info!(
            run_id = %run_id,
            examples = dataset.len(),
            features = dataset.feature_width(),
            "Rows formatted"
        );

        let stage = RetrainStage::Serializing;
        let t = Self::begin(machine, run_id, stage)?;
        let writer = Arc::clone(&c.writer);
        let record_path = settings.record_path.clone();
        let written = blocking(stage, move || writer.write(&dataset, &record_path)).await;
        Self::end(run_id, stage, t, written)?;

        let stage = RetrainStage::BuildingPipeline;
        let t = Self::begin(machine, run_id, stage)?;
        let builder = Arc::clone(&c.pipeline_builder);
        let record_path = settings.record_path.clone();
        let pipeline = Self::end(
            run_id,
            stage,
            t,
            blocking(stage, move || builder.open(&record_path)).await,
        )?;
        info!(run_id = %run_id, examples = pipeline.len(), "Training pipeline ready");

        let stage = RetrainStage::Searching;
        let t = Self::begin(machine, run_id, stage)?;
        let search = Arc::clone(&c.search);
        let search_settings = Arc::clone(settings);
        let searched = blocking(stage, move || {
            search
                .search(
                    &search_settings.hyperparameter_space,
                    search_settings.num_samples,
                    pipeline.as_ref(),
                )
                .map_err(RetrainError::from)
        })
        .await;
        let best = Self::end(run_id, stage, t, searched)?;

        let stage = RetrainStage::Persisting;
        let t = Self::begin(machine, run_id, stage)?;
        let persister = Arc::clone(&c.persister);
        let directory = settings.models_dir.join(started_at.timestamp().to_string());
        let artifact = Self::end(
            run_id,
            stage,
            t,
            blocking(stage, move || persister.persist(best, &directory)).await,
        )?;

        machine
            .finish()
            .map_err(|e| RetrainError::for_stage(stage, e.to_string()))?;
        Ok(artifact)
    }
}

#[async_trait]
impl Retrainer for RetrainOrchestrator {
    #[instrument(skip_all, fields(run_id = %run_id))]
    async fn retrain(&self, run_id: &RunId) -> RetrainOutcome {
        let started_at = Utc::now();
        let mut machine = RetrainMachine::new();

        info!(run_id = %run_id, "Retrain run started");
        let result = self.run_stages(run_id, &mut machine, started_at).await;

        let (state, artifact, error_message) = match result {
            Ok(artifact) => {
                info!(
                    run_id = %run_id,
                    model_name = %artifact.model_name,
                    score = artifact.score,
                    "Retrain run succeeded"
                );
                (RetrainState::Done, Some(artifact), None)
            }
            Err(e) => {
                let stage = machine.fail().unwrap_or_else(|_| e.stage());
                error!(run_id = %run_id, stage = %stage, error = %e, "Retrain run failed");
                (RetrainState::Failed(stage), None, Some(e.to_string()))
            }
        };

        let outcome = RetrainOutcome {
            run_id: run_id.clone(),
            state,
            completed_stages: machine.completed().to_vec(),
            artifact,
            error: error_message,
            started_at,
            finished_at: Utc::now(),
        };

        record_run_outcome(&outcome);
        outcome
    }
}
