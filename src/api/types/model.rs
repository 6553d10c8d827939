//! Request and response bodies of the model endpoints

use serde::{Deserialize, Serialize};

use crate::domain::retrain::RunId;

/// Runs returned by `GET /model/runs` when no limit is given
pub const DEFAULT_RUNS_LIMIT: usize = 20;

/// Response of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub health: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            health: "True".to_string(),
        }
    }
}

/// Response of `PUT /model`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainResponse {
    pub train: String,
    pub run_id: RunId,
}

impl TrainResponse {
    pub fn accepted(run_id: RunId) -> Self {
        Self {
            train: "True".to_string(),
            run_id,
        }
    }
}

/// Query parameters of `GET /model/runs`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunsQueryParams {
    pub limit: Option<usize>,
}

impl RunsQueryParams {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_RUNS_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_response_shape() {
        let run_id = RunId::generate();
        let json = serde_json::to_value(TrainResponse::accepted(run_id.clone())).unwrap();

        assert_eq!(json["train"], "True");
        assert_eq!(json["run_id"], run_id.as_str());
    }

    #[test]
    fn test_runs_limit_defaults() {
        assert_eq!(RunsQueryParams::default().limit(), DEFAULT_RUNS_LIMIT);
        assert_eq!(RunsQueryParams { limit: Some(3) }.limit(), 3);
    }
}
