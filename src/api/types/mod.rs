//! HTTP request, response and error types

pub mod error;
pub mod model;

pub use error::{ApiError, ApiErrorResponse, ApiErrorType};
pub use model::{HealthResponse, RunsQueryParams, TrainResponse, DEFAULT_RUNS_LIMIT};
