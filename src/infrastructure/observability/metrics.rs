//! Prometheus metrics infrastructure

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::MetricsConfig;
use crate::domain::retrain::{RetrainOutcome, RetrainStage};

static RUN_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"run-[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
        .expect("run id pattern is valid")
});

static NUMERIC_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\d+(/|$)").expect("numeric segment pattern is valid"));

/// Prometheus metrics handle for serving metrics endpoint
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
    path: String,
}

impl PrometheusMetrics {
    /// Get the metrics as a string for the metrics endpoint
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Install the global Prometheus recorder
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("retrain_service_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
            tracing::info!("Prometheus metrics initialized at {}", config.path);

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
                path: config.path.clone(),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

/// Create the metrics router
pub fn create_metrics_router(metrics: PrometheusMetrics) -> Router {
    let path = metrics.path.clone();
    Router::new()
        .route(&path, get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

/// Record an HTTP request metric
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());

    if status >= 500 {
        counter!("http_server_errors_total", &labels).increment(1);
    }
}

/// Record how long a retrain stage took and whether it succeeded
pub fn record_stage_duration(stage: RetrainStage, success: bool, duration: Duration) {
    let labels = [
        ("stage", stage.as_str().to_string()),
        ("status", if success { "success" } else { "error" }.to_string()),
    ];

    histogram!("retrain_stage_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Count a finished retrain run
pub fn record_run_outcome(outcome: &RetrainOutcome) {
    if outcome.succeeded() {
        counter!("retrain_runs_total", "outcome" => "succeeded").increment(1);
        return;
    }

    let stage = outcome
        .failed_stage()
        .map(|s| s.as_str())
        .unwrap_or("unknown");
    counter!("retrain_runs_total", "outcome" => "failed").increment(1);
    counter!("retrain_stage_failures_total", "stage" => stage).increment(1);
}

/// Count a run whose task ended without an outcome
pub fn record_run_aborted() {
    counter!("retrain_runs_total", "outcome" => "aborted").increment(1);
}

/// Current number of accepted runs waiting for the worker
pub fn set_queue_depth(depth: usize) {
    gauge!("retrain_queue_depth").set(depth as f64);
}

/// Sanitize URL path for metric labels (remove IDs, limit cardinality)
fn sanitize_path(path: &str) -> String {
    let path = RUN_ID_PATTERN.replace_all(path, "{run_id}");
    let path = NUMERIC_SEGMENT.replace_all(&path, "/{id}$1");

    if path.len() > 50 {
        path[..50].to_string()
    } else {
        path.to_string()
    }
}
