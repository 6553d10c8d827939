//! Retrain error types, one per pipeline stage

use thiserror::Error;

use super::stage::RetrainStage;

/// Errors raised by the retrain pipeline stages
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RetrainError {
    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Formatting failed: {0}")]
    Formatting(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Pipeline initialization failed: {0}")]
    PipelineInit(String),

    #[error("Search failed: {0}")]
    Search(#[from] SearchError),

    #[error("Persistence failed: {0}")]
    Persistence(String),
}

impl RetrainError {
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction(message.into())
    }

    pub fn formatting(message: impl Into<String>) -> Self {
        Self::Formatting(message.into())
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    pub fn pipeline_init(message: impl Into<String>) -> Self {
        Self::PipelineInit(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Build the error kind that belongs to `stage`
    pub fn for_stage(stage: RetrainStage, message: impl Into<String>) -> Self {
        let message = message.into();

        match stage {
            RetrainStage::Extracting => Self::Extraction(message),
            RetrainStage::Formatting => Self::Formatting(message),
            RetrainStage::Serializing => Self::Serialization(message),
            RetrainStage::BuildingPipeline => Self::PipelineInit(message),
            RetrainStage::Searching => Self::Search(SearchError::Aborted(message)),
            RetrainStage::Persisting => Self::Persistence(message),
        }
    }

    /// The stage this error kind belongs to
    pub fn stage(&self) -> RetrainStage {
        match self {
            Self::Extraction(_) => RetrainStage::Extracting,
            Self::Formatting(_) => RetrainStage::Formatting,
            Self::Serialization(_) => RetrainStage::Serializing,
            Self::PipelineInit(_) => RetrainStage::BuildingPipeline,
            Self::Search(_) => RetrainStage::Searching,
            Self::Persistence(_) => RetrainStage::Persisting,
        }
    }
}

/// Reasons a hyperparameter search produces no best model
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SearchError {
    #[error("num_samples must be at least 1")]
    InvalidSampleCount,

    #[error("hyperparameter space is empty")]
    EmptySpace,

    #[error("invalid hyperparameter '{name}': {message}")]
    InvalidParameter { name: String, message: String },

    #[error("insufficient data: the training pipeline yielded no examples")]
    InsufficientData,

    #[error("all {attempted} trials failed, last error: {last_error}")]
    AllTrialsFailed { attempted: usize, last_error: String },

    #[error("search aborted: {0}")]
    Aborted(String),
}

impl SearchError {
    pub fn invalid_parameter(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Failure of a single trial; tolerated by the search unless every trial fails
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TrainingError {
    #[error("invalid hyperparameter '{name}': {message}")]
    InvalidHyperparameter { name: String, message: String },

    #[error("training data error: {0}")]
    Data(String),

    #[error("training diverged: {0}")]
    Diverged(String),
}

impl TrainingError {
    pub fn invalid_hyperparameter(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidHyperparameter {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn data(message: impl Into<String>) -> Self {
        Self::Data(message.into())
    }

    pub fn diverged(message: impl Into<String>) -> Self {
        Self::Diverged(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RetrainError::extraction("connection refused");
        assert_eq!(err.to_string(), "Extraction failed: connection refused");

        let err = RetrainError::from(SearchError::InsufficientData);
        assert_eq!(
            err.to_string(),
            "Search failed: insufficient data: the training pipeline yielded no examples"
        );
    }

    #[test]
    fn test_for_stage_round_trips_stage() {
        for stage in RetrainStage::ALL {
            let err = RetrainError::for_stage(stage, "boom");
            assert_eq!(err.stage(), stage);
        }
    }

    #[test]
    fn test_all_trials_failed_display() {
        let err = SearchError::AllTrialsFailed {
            attempted: 3,
            last_error: "training diverged: loss is NaN".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "all 3 trials failed, last error: training diverged: loss is NaN"
        );
    }
}
