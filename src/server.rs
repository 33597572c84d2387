//! HTTP surface over the [`crate::orchestrator::Orchestrator`].
//!
//! This is the backing implementation an MCP/JSON-RPC transport would call
//! into (the transport framing itself is out of scope per spec §1); the
//! handlers below are the stable `search`/`route`/`ingest` surface.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|--------------|
//! | `POST` | `/tools/search` | Hybrid search over the tool catalog |
//! | `POST` | `/tools/route` | Single best-routed tool, or `null` |
//! | `POST` | `/tools/ingest` | Ingest a plaintext knowledge document |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients and cross-origin MCP tool calls.

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

use crate::config::Config;
use crate::models::{Hit, KnowledgeChunk};
use crate::orchestrator::Orchestrator;

/// Shared application state passed to all route handlers via Axum's `State`
/// extractor.
#[derive(Clone)]
struct AppState {
    orchestrator: Arc<Orchestrator>,
}

/// Starts the HTTP server. Binds to the address configured in `[server].bind`
/// and registers all route handlers. Runs until the process is terminated.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let orchestrator = Arc::new(Orchestrator::new(config).await?);
    let state = AppState { orchestrator };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/tools/search", post(handle_search))
        .route("/tools/route", post(handle_route))
        .route("/tools/ingest", post(handle_ingest))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    tracing::info!(%bind_addr, "hybrid-router HTTP server listening");

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

fn internal_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ POST /tools/search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_search_limit")]
    k: usize,
    #[serde(default)]
    category: Option<String>,
}

fn default_search_limit() -> usize {
    10
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<Hit>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let results = state
        .orchestrator
        .search(&req.query, req.k, req.category.as_deref())
        .await
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(SearchResponse { results }))
}

// ============ POST /tools/route ============

#[derive(Deserialize)]
struct RouteRequest {
    query: String,
}

#[derive(Serialize)]
struct RouteResponse {
    hit: Option<Hit>,
}

async fn handle_route(
    State(state): State<AppState>,
    Json(req): Json<RouteRequest>,
) -> Result<Json<RouteResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let hit = state
        .orchestrator
        .route(&req.query)
        .await
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(RouteResponse { hit }))
}

// ============ POST /tools/ingest ============

#[derive(Deserialize)]
struct IngestRequest {
    source: String,
    text: String,
}

#[derive(Serialize)]
struct IngestResponse {
    chunks_written: usize,
    chunks: Vec<KnowledgeChunkSummary>,
}

#[derive(Serialize)]
struct KnowledgeChunkSummary {
    id: String,
    chunk_index: i64,
}

impl From<&KnowledgeChunk> for KnowledgeChunkSummary {
    fn from(c: &KnowledgeChunk) -> Self {
        Self {
            id: c.id.clone(),
            chunk_index: c.chunk_index,
        }
    }
}

async fn handle_ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    if req.source.trim().is_empty() {
        return Err(bad_request("source must not be empty"));
    }

    let chunks = state
        .orchestrator
        .ingest(&req.source, &req.text)
        .await
        .map_err(|e| internal_error(e.to_string()))?;

    Ok(Json(IngestResponse {
        chunks_written: chunks.len(),
        chunks: chunks.iter().map(KnowledgeChunkSummary::from).collect(),
    }))
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
