//! Static snapshot HTTP server.
//!
//! Serves a snapshot data directory over HTTP so browser clients (and the
//! viewer itself) can read the precomputed corpus without the full content
//! service.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/static/pages` | `pages_index.json` as stored |
//! | `GET`  | `/api/static/page/{id}` | `page_bundles/{id}.json` as stored |
//! | `GET`  | `/health` | Snapshot status and crate version |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "page 42 not found" } }
//! ```
//!
//! Error codes: `not_found` (404), `unavailable` (503), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::path::Path as FsPath;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::FetchError;
use crate::fetcher::{RecordSource, SnapshotSource};

type AppState = Arc<SnapshotSource>;

/// Build the router for `data_dir`.
pub fn router(data_dir: &FsPath) -> Router {
    let state: AppState = Arc::new(SnapshotSource::new(data_dir));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/static/pages", get(handle_pages))
        .route("/api/static/page/{id}", get(handle_page))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Serve `config.source.data_dir` on `config.server.bind` until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let data_dir = config.source.data_dir.clone();
    if !data_dir.is_dir() {
        warn!(data_dir = %data_dir.display(), "snapshot directory does not exist");
    }

    let app = router(&data_dir);

    println!(
        "Snapshot server listening on http://{} (data: {})",
        bind_addr,
        data_dir.display()
    );
    info!(%bind_addr, data_dir = %data_dir.display(), "server started");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<FetchError> for AppError {
    fn from(e: FetchError) -> Self {
        let (status, code) = match &e {
            FetchError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            FetchError::Unsupported(..) => (StatusCode::NOT_IMPLEMENTED, "unsupported"),
            FetchError::Transport(_) | FetchError::Malformed(_) => {
                warn!(error = %e, "snapshot read failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        AppError {
            status,
            code,
            message: e.to_string(),
        }
    }
}

// ============ GET /api/static/pages ============

async fn handle_pages(State(source): State<AppState>) -> Result<Json<Value>, AppError> {
    Ok(Json(source.raw_index().await?))
}

// ============ GET /api/static/page/{id} ============

async fn handle_page(
    State(source): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    Ok(Json(source.raw_bundle(&id).await?))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health(State(source): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    match source.health().await {
        Ok(health) => Ok(Json(HealthResponse {
            status: health.status,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })),
        Err(e) => Err(AppError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            code: "unavailable",
            message: e.to_string(),
        }),
    }
}
