//! HTTP surface: `POST /ask`, `GET /health` and a `GET /` service index.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use docqa_core::error::Error;
use docqa_core::types::AnswerResponse;
use docqa_rag::RagPipeline;

pub struct AppState {
    pub pipeline: RagPipeline,
}

impl AppState {
    pub fn new(pipeline: RagPipeline) -> Self {
        Self { pipeline }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Unix seconds.
    pub timestamp: f64,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

/// Pipeline failure mapped to a status code and a `{detail}` body.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

/// Malformed or incomplete request bodies are client errors.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::InvalidInput(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "ask failed");
        }
        (status, Json(ErrorBody { detail: self.0.to_string() })).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/ask", post(ask))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "docqa API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "ask": "POST /ask",
            "health": "GET /health",
        }
    }))
}

async fn health() -> Json<HealthResponse> {
    let now = chrono::Utc::now();
    Json(HealthResponse { status: "healthy".into(), timestamp: now.timestamp_millis() as f64 / 1000.0 })
}

async fn ask(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let Json(req) = body?;
    let response = state.pipeline.ask(&req.question).await?;
    Ok(Json(response))
}
