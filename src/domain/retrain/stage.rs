//! Retrain stages and the run state machine

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single stage of a retrain run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrainStage {
    Extracting,
    Formatting,
    Serializing,
    BuildingPipeline,
    Searching,
    Persisting,
}

impl RetrainStage {
    /// All stages in the order a run visits them
    pub const ALL: [RetrainStage; 6] = [
        Self::Extracting,
        Self::Formatting,
        Self::Serializing,
        Self::BuildingPipeline,
        Self::Searching,
        Self::Persisting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extracting => "extracting",
            Self::Formatting => "formatting",
            Self::Serializing => "serializing",
            Self::BuildingPipeline => "building_pipeline",
            Self::Searching => "searching",
            Self::Persisting => "persisting",
        }
    }
}

impl fmt::Display for RetrainStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a retrain run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetrainState {
    #[default]
    Idle,
    Extracting,
    Formatting,
    Serializing,
    BuildingPipeline,
    Searching,
    Persisting,
    Done,
    /// Halted while executing the given stage
    Failed(RetrainStage),
}

impl RetrainState {
    /// The state a run is in while executing `stage`
    pub fn running(stage: RetrainStage) -> Self {
        match stage {
            RetrainStage::Extracting => Self::Extracting,
            RetrainStage::Formatting => Self::Formatting,
            RetrainStage::Serializing => Self::Serializing,
            RetrainStage::BuildingPipeline => Self::BuildingPipeline,
            RetrainStage::Searching => Self::Searching,
            RetrainStage::Persisting => Self::Persisting,
        }
    }

    /// The stage being executed, if the run is mid-pipeline
    pub fn stage(&self) -> Option<RetrainStage> {
        match self {
            Self::Extracting => Some(RetrainStage::Extracting),
            Self::Formatting => Some(RetrainStage::Formatting),
            Self::Serializing => Some(RetrainStage::Serializing),
            Self::BuildingPipeline => Some(RetrainStage::BuildingPipeline),
            Self::Searching => Some(RetrainStage::Searching),
            Self::Persisting => Some(RetrainStage::Persisting),
            Self::Idle | Self::Done | Self::Failed(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }

    /// Check if this state can transition to another state
    pub fn can_transition_to(&self, target: RetrainState) -> bool {
        match (self, target) {
            (Self::Idle, Self::Extracting) => true,
            (Self::Extracting, Self::Formatting) => true,
            (Self::Formatting, Self::Serializing) => true,
            (Self::Serializing, Self::BuildingPipeline) => true,
            (Self::BuildingPipeline, Self::Searching) => true,
            (Self::Searching, Self::Persisting) => true,
            (Self::Persisting, Self::Done) => true,

            // A run can only fail in the stage it is executing
            (current, Self::Failed(stage)) => current.stage() == Some(stage),

            _ => false,
        }
    }
}

impl fmt::Display for RetrainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Done => write!(f, "done"),
            Self::Failed(stage) => write!(f, "failed({})", stage),
            other => match other.stage() {
                Some(stage) => write!(f, "{}", stage),
                None => write!(f, "unknown"),
            },
        }
    }
}

/// Rejected state transition
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Invalid retrain state transition from '{from}' to '{to}'")]
pub struct InvalidTransition {
    pub from: RetrainState,
    pub to: RetrainState,
}

/// Tracks the state of one retrain run and the stages it has completed
#[derive(Debug, Clone, Default)]
pub struct RetrainMachine {
    state: RetrainState,
    completed: Vec<RetrainStage>,
}

impl RetrainMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RetrainState {
        self.state
    }

    /// Stages that finished successfully, in order
    pub fn completed(&self) -> &[RetrainStage] {
        &self.completed
    }

    /// Enter `stage`; the previous stage (if any) is recorded as completed
    pub fn enter(&mut self, stage: RetrainStage) -> Result<(), InvalidTransition> {
        self.transition(RetrainState::running(stage))
    }

    /// Halt the run in the stage currently executing
    pub fn fail(&mut self) -> Result<RetrainStage, InvalidTransition> {
        // Idle and terminal states have no stage to fail in
        let stage = self.state.stage().ok_or(InvalidTransition {
            from: self.state,
            to: self.state,
        })?;

        self.transition(RetrainState::Failed(stage))?;
        Ok(stage)
    }

    /// Mark the final stage completed
    pub fn finish(&mut self) -> Result<(), InvalidTransition> {
        self.transition(RetrainState::Done)
    }

    fn transition(&mut self, target: RetrainState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(target) {
            return Err(InvalidTransition {
                from: self.state,
                to: target,
            });
        }

        if !matches!(target, RetrainState::Failed(_)) {
            if let Some(stage) = self.state.stage() {
                self.completed.push(stage);
            }
        }

        self.state = target;
        Ok(())
    }
}
