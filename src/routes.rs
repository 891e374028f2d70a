use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::Value;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    batch,
    engine::Scorer,
    error::AppError,
    types::{BatchOutcome, HealthResponse, ModelStatus},
};

#[derive(Clone)]
pub struct AppState {
    pub scorer: Arc<dyn Scorer>,
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(scorer: Arc<dyn Scorer>) -> Self {
        Self {
            scorer,
            prometheus: None,
        }
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/score", post(score))
        .route("/status", get(status))
        .route("/models/reload", post(reload))
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn score(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<BatchOutcome>, AppError> {
    let Json(payload) = payload?;
    let scorer = Arc::clone(&state.scorer);
    // scoring is CPU-bound; keep it off the async workers
    let outcome = tokio::task::spawn_blocking(move || batch::score_records(scorer.as_ref(), &payload))
        .await
        .map_err(|e| AppError::Internal(format!("scoring task failed: {}", e)))??;

    info!(
        batch_id = %outcome.metadata.batch_id,
        method = %outcome.metadata.method,
        lines = outcome.metadata.total_lines,
        flagged = outcome.metadata.flagged_lines,
        "Scored upload batch"
    );
    Ok(Json(outcome))
}

pub async fn status(State(state): State<AppState>) -> Json<ModelStatus> {
    Json(state.scorer.status())
}

pub async fn reload(State(state): State<AppState>) -> Result<Json<ModelStatus>, AppError> {
    let scorer = Arc::clone(&state.scorer);
    let status = tokio::task::spawn_blocking(move || scorer.reload())
        .await
        .map_err(|e| AppError::Internal(format!("reload task failed: {}", e)))?;
    Ok(Json(status))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn metrics_endpoint(State(state): State<AppState>) -> String {
    state
        .prometheus
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ScoringError,
        types::{
            BatchMetadata, EnginePhase, RawLineItem, ScoreResult, ScoringMethod,
            NOTE_MODEL_FALLBACK,
        },
    };
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use parking_lot::Mutex;
    use tower::ServiceExt;

    /// Records what it was asked to score and flags every line.
    #[derive(Default)]
    struct FakeScorer {
        seen: Mutex<Vec<RawLineItem>>,
    }

    impl Scorer for FakeScorer {
        fn score_batch(&self, lines: &[RawLineItem]) -> Result<BatchOutcome, ScoringError> {
            self.seen.lock().extend_from_slice(lines);
            Ok(BatchOutcome {
                results: lines
                    .iter()
                    .map(|_| ScoreResult {
                        score: 1.0,
                        flagged: true,
                        reason: "fake".to_string(),
                    })
                    .collect(),
                metadata: BatchMetadata {
                    method: ScoringMethod::DeterministicFallback,
                    note: NOTE_MODEL_FALLBACK.to_string(),
                    reason: Some("test".to_string()),
                    total_lines: lines.len(),
                    flagged_lines: lines.len(),
                    insufficient_lines: 0,
                    batch_id: uuid::Uuid::new_v4(),
                    scored_at: chrono::Utc::now(),
                },
            })
        }

        fn status(&self) -> ModelStatus {
            ModelStatus {
                models_loaded: false,
                fallback_mode: true,
                phase: EnginePhase::Fallback,
                fallback_reason: Some("test".to_string()),
                loaded_artifacts: Vec::new(),
                model_dir: "models".to_string(),
                reloads: 0,
            }
        }

        fn reload(&self) -> ModelStatus {
            let mut status = self.status();
            status.reloads = 1;
            status
        }
    }

    fn app() -> (Router, Arc<FakeScorer>) {
        let fake = Arc::new(FakeScorer::default());
        let scorer: Arc<dyn Scorer> = fake.clone();
        (router(AppState::new(scorer)), fake)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_score_route_returns_results_and_metadata() {
        let (app, fake) = app();
        let response = app
            .oneshot(post_json(
                "/score",
                r#"{"lines": [{"description": "Travel", "hours": 2, "rate": 300}, {}]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["results"].as_array().unwrap().len(), 2);
        assert_eq!(body["metadata"]["method"], "deterministic_fallback");
        assert_eq!(body["metadata"]["note"], "model_fallback");
        assert_eq!(fake.seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_score_route_reports_malformed_line() {
        let (app, _) = app();
        let response = app
            .oneshot(post_json("/score", r#"[{"hours": 1}, {"hours": [1]}]"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "malformed_field");
        assert_eq!(body["index"], 1);
    }

    #[tokio::test]
    async fn test_score_route_rejects_invalid_json_with_error_body() {
        let (app, fake) = app();
        let response = app
            .oneshot(post_json("/score", r#"{"lines": [{"hours": 1"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "invalid_body");
        assert_eq!(body["status"], 400);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
        assert!(body["timestamp"].is_string());
        assert!(fake.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_status_and_reload_routes() {
        let (app, _) = app();
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["fallback_mode"], true);
        assert_eq!(body["models_loaded"], false);
        assert_eq!(body["phase"], "fallback");

        let response = app.oneshot(post_json("/models/reload", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["reloads"], 1);
    }

    #[tokio::test]
    async fn test_health_route() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
    }
}
