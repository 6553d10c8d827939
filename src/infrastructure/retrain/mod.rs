//! Retrain pipeline orchestration

mod orchestrator;

pub use orchestrator::{RetrainComponents, RetrainOrchestrator, RetrainSettings};
