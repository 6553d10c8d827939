//! Run identifiers, run status and run outcomes

use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::model::PersistResult;
use super::stage::{RetrainStage, RetrainState};
use crate::domain::error::DomainError;

/// Regex pattern for valid run IDs: run-{uuid}
static ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^run-[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}$")
        .expect("run id pattern is valid")
});

/// Validated retrain run identifier, used to correlate logs and history
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();

        if !ID_PATTERN.is_match(&id) {
            return Err(DomainError::invalid_id(format!(
                "Invalid run ID '{}': must be in format run-{{uuid}}",
                id
            )));
        }

        Ok(Self(id))
    }

    pub fn generate() -> Self {
        Self(format!("run-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RunId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RunId> for String {
    fn from(id: RunId) -> Self {
        id.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Final result of one retrain run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainOutcome {
    pub run_id: RunId,
    /// `Done` or `Failed(stage)`
    pub state: RetrainState,
    pub completed_stages: Vec<RetrainStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PersistResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RetrainOutcome {
    pub fn succeeded(&self) -> bool {
        self.state == RetrainState::Done
    }

    pub fn failed_stage(&self) -> Option<RetrainStage> {
        match self.state {
            RetrainState::Failed(stage) => Some(stage),
            _ => None,
        }
    }
}

/// Lifecycle of a submitted run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// History entry for a submitted run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub status: RunStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<RetrainStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl RunRecord {
    pub fn queued(run_id: RunId) -> Self {
        Self {
            run_id,
            status: RunStatus::Queued,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
            failed_stage: None,
            error: None,
            model_name: None,
            score: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn apply_outcome(&mut self, outcome: &RetrainOutcome) {
        self.status = if outcome.succeeded() {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };
        self.started_at = Some(outcome.started_at);
        self.finished_at = Some(outcome.finished_at);
        self.failed_stage = outcome.failed_stage();
        self.error = outcome.error.clone();
        self.model_name = outcome.artifact.as_ref().map(|a| a.model_name.clone());
        self.score = outcome.artifact.as_ref().map(|a| a.score);
    }

    /// The run ended without producing an outcome, e.g. its task panicked
    pub fn mark_aborted(&mut self, error: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error.into());
    }
}
