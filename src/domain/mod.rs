//! Domain layer - Core business logic and entities

pub mod error;
pub mod retrain;

pub use error::DomainError;
pub use retrain::{
    RetrainError, RetrainOutcome, RetrainQueue, RetrainStage, RetrainState, Retrainer, RunHistory,
    RunId, RunRecord, RunStatus,
};
