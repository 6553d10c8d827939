//! Retrain domain - pipeline stages, hyperparameter search and run tracking

mod dataset;
mod error;
mod hyperparameter;
mod model;
mod run;
mod stage;
mod traits;

pub use dataset::{Example, FormattedDataset, RawRecordSet, RawValue};
pub use error::{RetrainError, SearchError, TrainingError};
pub use hyperparameter::{
    Direction, HyperparameterSpace, Hyperparameters, Objective, ParameterDomain, ParameterValue,
};
pub use model::{
    BestModel, MetricsDocument, ModelMetricsEntry, ModelWeights, PersistResult, TrainedTrial,
    TrialResult,
};
pub use run::{RetrainOutcome, RunId, RunRecord, RunStatus};
pub use stage::{InvalidTransition, RetrainMachine, RetrainStage, RetrainState};
pub use traits::{
    DataExtractor, DataFormatter, ExampleIter, HyperparameterSearch, MetricsAggregator,
    ModelPersister, ModelTrainer, PipelineBuilder, RecordWriter, RetrainQueue, Retrainer,
    RunHistory, TrainingPipeline,
};

#[cfg(test)]
pub use traits::{
    MockDataExtractor, MockDataFormatter, MockMetricsAggregator, MockModelPersister,
    MockPipelineBuilder, MockRecordWriter, MockRetrainQueue, MockRetrainer, MockRunHistory,
};
