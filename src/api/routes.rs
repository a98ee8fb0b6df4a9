//! API route definitions.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use super::state::AppState;
use crate::record::LogRecord;

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 500;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/analyze", post(analyze))
        .route("/anomalies", get(list_anomalies))
        .route("/model", get(model_status).delete(reset_model))
}

/// Handler failure rendered as the usual `{ "error": ... }` envelope.
struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": { "message": self.1 } }))).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
    }
}

fn meta() -> Value {
    json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    })
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "model_fitted": state.engine.model_status().fitted
        },
        "meta": meta()
    }))
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    logs: Vec<LogRecord>,
    #[serde(default = "default_true")]
    root_cause: bool,
}

fn default_true() -> bool {
    true
}

async fn analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<Value>, ApiError> {
    let records = req.logs;
    let analysis = state
        .engine
        .clone()
        .analyze_blocking(records.clone(), req.root_cause)
        .await?;

    // History is best-effort; the verdicts are returned either way.
    let store = state.store.clone();
    let to_record = analysis.clone();
    let recorded =
        tokio::task::spawn_blocking(move || store.record_batch(&records, &to_record)).await;
    let batch_id = match recorded {
        Ok(Ok(id)) => Some(id),
        Ok(Err(e)) => {
            warn!(error = %e, "failed to record analysis history");
            None
        }
        Err(e) => {
            warn!(error = %e, "history task panicked");
            None
        }
    };

    Ok(Json(json!({
        "data": analysis,
        "meta": {
            "batch_id": batch_id,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    })))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

async fn list_anomalies(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = q.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);
    let store = state.store.clone();
    let anomalies = tokio::task::spawn_blocking(move || store.list_recent(limit))
        .await
        .map_err(anyhow::Error::from)??;

    Ok(Json(json!({
        "data": anomalies,
        "meta": { "total": anomalies.len(), "limit": limit }
    })))
}

async fn model_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "data": state.engine.model_status(), "meta": meta() }))
}

async fn reset_model(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let engine = state.engine.clone();
    tokio::task::spawn_blocking(move || engine.reset_model())
        .await
        .map_err(anyhow::Error::from)?
        .map_err(anyhow::Error::from)?;
    Ok(Json(json!({ "data": state.engine.model_status(), "meta": meta() })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router;
    use crate::config::Config;
    use crate::detect::engine::AnalysisEngine;
    use crate::detect::forest::ForestParams;
    use crate::detect::outlier::OutlierModel;
    use crate::storage::history::AnalysisStore;
    use crate::storage::open_pool;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt; // for `oneshot`

    fn app(dir: &tempfile::TempDir) -> Router {
        let config = Config::default();
        let model = OutlierModel::new(ForestParams::from(&config.model), None);
        let state = AppState {
            engine: Arc::new(AnalysisEngine::with_model(&config, model).unwrap()),
            store: AnalysisStore::new(open_pool(&dir.path().join("api.db")).unwrap()),
        };
        router(state)
    }

    async fn body_json(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 1_000_000)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = tempfile::TempDir::new().unwrap();
        let request = Request::builder()
            .uri("/api/v1/health")
            .body(Body::empty())
            .unwrap();

        let response = app(&dir).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["data"]["status"], "ok");
        assert_eq!(json["data"]["model_fitted"], false);
    }

    #[tokio::test]
    async fn test_analyze_then_list_anomalies() {
        let dir = tempfile::TempDir::new().unwrap();
        let app = app(&dir);

        let payload = json!({
            "logs": [
                { "id": "1", "level": "INFO", "message": "request served", "source": "web" },
                {
                    "id": "2",
                    "level": "ERROR",
                    "message": "Database connection failed: Connection timeout after 30 seconds",
                    "source": "db-service"
                }
            ]
        });
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/analyze")
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let results = json["data"]["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1]["log_id"], "2");
        assert_eq!(results[1]["is_anomaly"], true);
        assert_eq!(results[1]["root_causes"][0], "Database connection timeout");
        assert!(json["meta"]["batch_id"].is_string());

        let request = Request::builder()
            .uri("/api/v1/anomalies?limit=10")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let ids: Vec<_> = json["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["log_id"].as_str().unwrap().to_string())
            .collect();
        assert!(ids.contains(&"2".to_string()));
    }

    #[tokio::test]
    async fn test_model_status_and_reset() {
        let dir = tempfile::TempDir::new().unwrap();
        let app = app(&dir);

        let request = Request::builder()
            .method("DELETE")
            .uri("/api/v1/model")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let request = Request::builder()
            .uri("/api/v1/model")
            .body(Body::empty())
            .unwrap();
        let json = body_json(app.oneshot(request).await.unwrap()).await;
        assert_eq!(json["data"]["fitted"], false);
        assert_eq!(json["data"]["n_estimators"], 100);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let dir = tempfile::TempDir::new().unwrap();
        let request = Request::builder()
            .uri("/api/v2/nothing")
            .body(Body::empty())
            .unwrap();
        let response = app(&dir).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
