use axum::{
    Router, middleware,
    routing::{get, put},
};
use tower_http::trace::TraceLayer;

use super::health;
use super::middleware::metrics_middleware;
use super::model;
use super::state::AppState;
use crate::infrastructure::observability::{PrometheusMetrics, create_metrics_router};

/// Build the HTTP router; the metrics endpoint is merged when enabled
pub fn create_router(state: AppState, metrics: Option<PrometheusMetrics>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .route("/model", put(model::trigger_retrain))
        .route("/model/metrics", get(model::list_model_metrics))
        .route("/model/runs", get(model::list_runs))
        .route("/model/runs/{run_id}", get(model::get_run))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http());

    if let Some(m) = metrics {
        router = router.merge(create_metrics_router(m));
    }

    router
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::domain::DomainError;
    use crate::domain::retrain::{
        Direction, Hyperparameters, MetricsDocument, MockMetricsAggregator, MockRetrainQueue,
        MockRunHistory, ModelMetricsEntry, RunId, RunRecord,
    };

    fn state(
        queue: MockRetrainQueue,
        aggregator: MockMetricsAggregator,
        history: MockRunHistory,
    ) -> AppState {
        AppState::new(Arc::new(queue), Arc::new(aggregator), Arc::new(history))
    }

    fn idle_state() -> AppState {
        state(
            MockRetrainQueue::new(),
            MockMetricsAggregator::new(),
            MockRunHistory::new(),
        )
    }

    async fn send(app: Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, body)
    }

    fn entry(name: &str, score: f64) -> ModelMetricsEntry {
        ModelMetricsEntry {
            model_name: name.to_string(),
            metrics: MetricsDocument {
                objective: "val_mse".to_string(),
                direction: Direction::Minimize,
                score,
                metrics: BTreeMap::from([("val_mse".to_string(), score)]),
                hyperparameters: Hyperparameters::default(),
                trial: None,
                trials_run: None,
                num_examples: None,
                weights_sha256: None,
                created_at: None,
            },
        }
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(create_router(idle_state(), None), Method::GET, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"health": "True"}));
    }

    #[tokio::test]
    async fn test_put_model_queues_run() {
        let run_id = RunId::generate();
        let returned = run_id.clone();

        let mut queue = MockRetrainQueue::new();
        queue
            .expect_submit()
            .times(1)
            .returning(move || Ok(returned.clone()));

        let app = create_router(
            state(queue, MockMetricsAggregator::new(), MockRunHistory::new()),
            None,
        );
        let (status, body) = send(app, Method::PUT, "/model").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["train"], "True");
        assert_eq!(body["run_id"], run_id.as_str());
    }

    #[tokio::test]
    async fn test_put_model_full_queue_is_503() {
        let mut queue = MockRetrainQueue::new();
        queue
            .expect_submit()
            .returning(|| Err(DomainError::unavailable("Retrain queue is full")));

        let app = create_router(
            state(queue, MockMetricsAggregator::new(), MockRunHistory::new()),
            None,
        );
        let (status, body) = send(app, Method::PUT, "/model").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["type"], "service_unavailable_error");
    }

    #[tokio::test]
    async fn test_model_metrics_lists_entries() {
        let mut aggregator = MockMetricsAggregator::new();
        aggregator
            .expect_list_models()
            .returning(|| Ok(vec![entry("1700000000", 0.5), entry("1700000100", 0.25)]));

        let app = create_router(
            state(MockRetrainQueue::new(), aggregator, MockRunHistory::new()),
            None,
        );
        let (status, body) = send(app, Method::GET, "/model/metrics").await;

        assert_eq!(status, StatusCode::OK);
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["model_name"], "1700000000");
        assert_eq!(entries[1]["metrics"]["score"], 0.25);
        assert_eq!(entries[1]["metrics"]["direction"], "minimize");
    }

    #[tokio::test]
    async fn test_model_metrics_empty() {
        let mut aggregator = MockMetricsAggregator::new();
        aggregator.expect_list_models().returning(|| Ok(Vec::new()));

        let app = create_router(
            state(MockRetrainQueue::new(), aggregator, MockRunHistory::new()),
            None,
        );
        let (status, body) = send(app, Method::GET, "/model/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_list_runs_passes_limit() {
        let mut history = MockRunHistory::new();
        history
            .expect_list_recent()
            .withf(|limit| *limit == 2)
            .returning(|_| Ok(vec![RunRecord::queued(RunId::generate())]));

        let app = create_router(
            state(MockRetrainQueue::new(), MockMetricsAggregator::new(), history),
            None,
        );
        let (status, body) = send(app, Method::GET, "/model/runs?limit=2").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["status"], "queued");
    }

    #[tokio::test]
    async fn test_list_runs_rejects_bad_limit() {
        let mut history = MockRunHistory::new();
        history.expect_list_recent().never();

        let app = create_router(
            state(MockRetrainQueue::new(), MockMetricsAggregator::new(), history),
            None,
        );
        let (status, body) = send(app, Method::GET, "/model/runs?limit=many").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "invalid_request_error");
    }

    #[tokio::test]
    async fn test_get_run_found() {
        let run_id = RunId::generate();
        let record = RunRecord::queued(run_id.clone());

        let mut history = MockRunHistory::new();
        history
            .expect_get()
            .returning(move |_| Ok(Some(record.clone())));

        let app = create_router(
            state(MockRetrainQueue::new(), MockMetricsAggregator::new(), history),
            None,
        );
        let uri = format!("/model/runs/{}", run_id);
        let (status, body) = send(app, Method::GET, &uri).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["run_id"], run_id.as_str());
    }

    #[tokio::test]
    async fn test_get_run_unknown_is_404() {
        let mut history = MockRunHistory::new();
        history.expect_get().returning(|_| Ok(None));

        let app = create_router(
            state(MockRetrainQueue::new(), MockMetricsAggregator::new(), history),
            None,
        );
        let uri = format!("/model/runs/{}", RunId::generate());
        let (status, body) = send(app, Method::GET, &uri).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["type"], "not_found_error");
    }

    #[tokio::test]
    async fn test_get_run_malformed_id_is_400() {
        let mut history = MockRunHistory::new();
        history.expect_get().never();

        let app = create_router(
            state(MockRetrainQueue::new(), MockMetricsAggregator::new(), history),
            None,
        );
        let (status, body) = send(app, Method::GET, "/model/runs/not-a-run").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["param"], "run_id");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (status, _) = send(create_router(idle_state(), None), Method::GET, "/v1/models").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
