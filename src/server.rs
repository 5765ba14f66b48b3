//! HTTP API over a shared [`RagContext`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/sync` | Run a sync pass; body `{"rebuild": bool}` |
//! | `POST` | `/search` | Top-k retrieval; body `{"query": str, "k": int}` |
//! | `GET`  | `/manifest` | Indexed sources, newest first |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Codes: `bad_request` (400), `locked` (409), `no_sources` (422),
//! `internal` (500).

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use docsync_core::models::{SearchResult, SyncStatus};
use docsync_core::search::SearchOutcome;

use crate::context::RagContext;
use crate::error::SyncError;
use crate::manifest::ManifestEntry;

/// Build the router. Exposed separately from [`run_server`] for tests.
pub fn router(ctx: Arc<RagContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sync", post(handle_sync))
        .route("/search", post(handle_search))
        .route("/manifest", get(handle_manifest))
        .layer(cors)
        .with_state(ctx)
}

/// Serve on `[server].bind` until the process is terminated.
pub async fn run_server(ctx: Arc<RagContext>) -> anyhow::Result<()> {
    let bind_addr = ctx.config().server.bind.clone();
    let app = router(ctx);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening");
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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

/// Map a pipeline error to a response, recognising the typed sync errors.
fn classify_error(err: anyhow::Error) -> AppError {
    match err.downcast_ref::<SyncError>() {
        Some(SyncError::NoSources { .. }) => AppError {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            code: "no_sources",
            message: err.to_string(),
        },
        Some(SyncError::Locked { .. }) => AppError {
            status: StatusCode::CONFLICT,
            code: "locked",
            message: err.to_string(),
        },
        None => {
            tracing::error!(error = %format!("{:#}", err), "request failed");
            AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal",
                message: format!("{:#}", err),
            }
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    initialized: bool,
}

async fn handle_health(State(ctx): State<Arc<RagContext>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        initialized: ctx.is_initialized(),
    })
}

// ============ POST /sync ============

#[derive(Deserialize, Default)]
struct SyncRequest {
    #[serde(default)]
    rebuild: bool,
}

async fn handle_sync(
    State(ctx): State<Arc<RagContext>>,
    body: Bytes,
) -> Result<Json<SyncStatus>, AppError> {
    // An empty body means an incremental sync.
    let req: SyncRequest = if body.is_empty() {
        SyncRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| bad_request(format!("invalid body: {}", e)))?
    };
    let status = ctx
        .orchestrator()
        .initialize(req.rebuild)
        .await
        .map_err(classify_error)?;
    Ok(Json(status))
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    k: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    /// The formatted text block, or a sentinel.
    result: String,
    hits: Vec<SearchResult>,
}

async fn handle_search(
    State(ctx): State<Arc<RagContext>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let k = req.k.unwrap_or(ctx.config().retrieval.default_k);
    if k == 0 {
        return Err(bad_request("k must be >= 1"));
    }

    let outcome = ctx
        .retriever()
        .search_results(&req.query, k)
        .await
        .map_err(classify_error)?;
    let result = outcome.render();
    let hits = match outcome {
        SearchOutcome::Hits(hits) => hits,
        SearchOutcome::NotInitialized | SearchOutcome::NoResults => Vec::new(),
    };
    Ok(Json(SearchResponse { result, hits }))
}

// ============ GET /manifest ============

#[derive(Serialize)]
struct ManifestResponse {
    files: Vec<ManifestEntry>,
}

async fn handle_manifest(State(ctx): State<Arc<RagContext>>) -> Json<ManifestResponse> {
    Json(ManifestResponse {
        files: ctx.manifest().entries_by_recency(),
    })
}
