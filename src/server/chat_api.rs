//! Chat HTTP API.
//!
//! - GET /
//! - GET /health
//! - POST /api/message
//! - POST /api/message_stream
//!
//! CORS is fully open: any origin, method, and header.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::generator::engine::{GenerateError, ResponseGenerator};
use crate::server::streaming::{fragments_to_body_stream, STREAM_CONTENT_TYPE};

/// Fixed client-facing message for every generation failure.
pub const ERROR_DETAIL: &str = "Error processing message";

/// Payload of `GET /`.
pub const WELCOME_MESSAGE: &str = "Welcome to the Chat App API";

/// Application state shared across handlers.
pub struct AppState {
    pub generator: ResponseGenerator,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(generator: ResponseGenerator) -> Self {
        Self {
            generator,
            start_time: Instant::now(),
        }
    }
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/message", post(process_message))
        .route("/api/message_stream", post(process_message_stream))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─── Request/Response Types ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WelcomeResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// Generic server error. The cause is logged, never returned.
#[derive(Debug)]
pub struct ApiError;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                detail: ERROR_DETAIL.to_string(),
            }),
        )
            .into_response()
    }
}

fn processing_failed(request_id: &str, e: &GenerateError) -> ApiError {
    error!(request_id, error = %e, "Error processing message");
    ApiError
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: WELCOME_MESSAGE.to_string(),
    })
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn process_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    info!(request_id, chars = req.text.len(), "Message request");

    let fragments = state
        .generator
        .generate(&req.text)
        .await
        .map_err(|e| processing_failed(&request_id, &e))?;
    let response = fragments
        .collect_text()
        .await
        .map_err(|e| processing_failed(&request_id, &e))?;

    info!(request_id, chars = response.len(), "Message complete");
    Ok(Json(MessageResponse { response }))
}

async fn process_message_stream(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MessageRequest>,
) -> Result<Response, ApiError> {
    let request_id = Uuid::new_v4().to_string();
    info!(request_id, chars = req.text.len(), "Streaming message request");

    let fragments = state
        .generator
        .generate(&req.text)
        .await
        .map_err(|e| processing_failed(&request_id, &e))?;

    let body = Body::from_stream(fragments_to_body_stream(fragments, request_id));
    Ok(([(header::CONTENT_TYPE, STREAM_CONTENT_TYPE)], body).into_response())
}
