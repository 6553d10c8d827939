//! Observability infrastructure - Prometheus metrics

mod metrics;

pub use metrics::{
    create_metrics_router, init_metrics, record_http_request, record_run_aborted,
    record_run_outcome, record_stage_duration, set_queue_depth, PrometheusMetrics,
};
