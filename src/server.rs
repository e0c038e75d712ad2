//! HTTP surface for the engine.
//!
//! Exposes question answering over a small JSON API. The index is built
//! before the server starts accepting requests, so handlers only ever see
//! a read-only store.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer a question (`{"question": "...", "topk": 6}`) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `routing_decode` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::answer::Engine;
use crate::config::Config;
use crate::error::EngineError;
use crate::models::AskResponse;

/// Shared application state passed to route handlers.
#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
}

/// Starts the HTTP server with a fully built engine.
///
/// Binds to the address configured in `[server].bind` and runs until the
/// process is terminated.
pub async fn run_server(config: &Config, engine: Arc<Engine>) -> anyhow::Result<()> {
    let state = AppState { engine };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ask", post(handle_ask))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("evidence engine listening on http://{}", config.server.bind);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn routing_decode_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "routing_decode".to_string(),
        message: message.into(),
    }
}

fn internal_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Maps engine failures to the most appropriate HTTP status: validation
/// errors become 400, an undecodable routing reply becomes 502 (the
/// upstream classifier misbehaved, not the client), everything else 500.
fn classify_ask_error(err: anyhow::Error) -> AppError {
    match err.downcast_ref::<EngineError>() {
        Some(EngineError::Validation(_)) => bad_request(err.to_string()),
        Some(EngineError::RoutingDecode(_)) => routing_decode_error(err.to_string()),
        _ => internal_error(err.to_string()),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /ask ============

/// JSON request body for `POST /ask`.
#[derive(Deserialize)]
struct AskRequest {
    question: String,
    /// Optional per-request override of the configured retrieval depth.
    #[serde(default)]
    topk: Option<usize>,
}

/// Handler for `POST /ask`.
///
/// Routes the question, gathers evidence, and returns the synthesized
/// answer with citations and (when applicable) the SQL outcome.
async fn handle_ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let response = state
        .engine
        .ask(&request.question, request.topk)
        .await
        .map_err(classify_ask_error)?;
    Ok(Json(response))
}
