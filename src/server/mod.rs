//! HTTP boundary
//!
//! JSON in, JSON out. Every response carries `ok`; failures carry `error`
//! with the status decided by the error kind. Pipeline calls run on the
//! blocking pool and are bounded by the configured request timeout.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::error::{RagError, Result};
use crate::rag::{RagPipeline, QUESTION_REQUIRED};
use crate::search::backend::IndexingStats;

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<RagPipeline>,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(pipeline: Arc<RagPipeline>) -> Self {
        let request_timeout = pipeline.config().request_timeout;
        Self {
            pipeline,
            request_timeout,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    async fn run_blocking<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&RagPipeline) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        run_bounded(Arc::clone(&self.pipeline), self.request_timeout, op).await
    }
}

/// Run a pipeline operation on the blocking pool, giving up after `limit`.
pub(crate) async fn run_bounded<T, F>(pipeline: Arc<RagPipeline>, limit: Duration, op: F) -> Result<T>
where
    F: FnOnce(&RagPipeline) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::task::spawn_blocking(move || op(&pipeline));
    match tokio::time::timeout(limit, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(RagError::Internal(format!("worker task failed: {}", join))),
        Err(_) => Err(RagError::Timeout(limit.as_secs())),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct IndexRequest {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    #[serde(default)]
    pub question: Option<String>,
    pub top_k: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EvalQuery {
    #[serde(rename = "topK")]
    pub top_k: Option<String>,
}

/// Success envelope: `{"ok": true, ...body}`. Also used for MCP tool output.
#[derive(Serialize)]
pub(crate) struct ApiOk<T: Serialize> {
    ok: bool,
    #[serde(flatten)]
    body: T,
}

impl<T: Serialize> ApiOk<T> {
    pub(crate) fn new(body: T) -> Self {
        Self { ok: true, body }
    }
}

#[derive(Serialize)]
struct IndexResponse {
    force: bool,
    #[serde(flatten)]
    stats: IndexingStats,
}

fn success<T: Serialize>(body: T) -> Response {
    (StatusCode::OK, Json(ApiOk::new(body))).into_response()
}

fn status_for(err: &RagError) -> StatusCode {
    match err {
        RagError::Validation(_) => StatusCode::BAD_REQUEST,
        RagError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(err: RagError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        warn!(error = %err, "request failed");
    }
    (status, Json(json!({ "ok": false, "error": err.to_string() }))).into_response()
}

fn respond<T: Serialize>(result: Result<T>) -> Response {
    match result {
        Ok(body) => success(body),
        Err(err) => failure(err),
    }
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

pub async fn index(State(state): State<AppState>, body: Option<Json<IndexRequest>>) -> Response {
    let force = body.map(|Json(req)| req.force).unwrap_or(false);
    let result = state
        .run_blocking(move |pipeline| pipeline.build_index(force))
        .await
        .map(|stats| IndexResponse { force, stats });
    respond(result)
}

fn is_json_content_type(headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let essence = value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    essence == "application/json"
        || (essence.starts_with("application/") && essence.ends_with("+json"))
}

/// A body that is missing, empty or not declared as JSON carries no question.
fn parse_ask_request(headers: &HeaderMap, body: &[u8]) -> Result<AskRequest> {
    if !is_json_content_type(headers) || body.iter().all(u8::is_ascii_whitespace) {
        return Err(RagError::Validation(QUESTION_REQUIRED.to_string()));
    }
    Json::<AskRequest>::from_bytes(body)
        .map(|Json(request)| request)
        .map_err(|rejection| RagError::Validation(rejection.body_text()))
}

pub async fn ask(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request = match parse_ask_request(&headers, &body) {
        Ok(request) => request,
        Err(err) => return failure(err),
    };

    let question = request.question.unwrap_or_default();
    if question.trim().is_empty() {
        return failure(RagError::Validation(QUESTION_REQUIRED.to_string()));
    }
    let top_k = request.top_k;
    respond(
        state
            .run_blocking(move |pipeline| pipeline.ask(&question, top_k))
            .await,
    )
}

pub async fn eval(
    State(state): State<AppState>,
    query: std::result::Result<Query<EvalQuery>, QueryRejection>,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(rejection) => return failure(RagError::Validation(rejection.body_text())),
    };
    let top_k = match parse_top_k(query.top_k.as_deref()) {
        Ok(top_k) => top_k,
        Err(err) => return failure(err),
    };
    respond(
        state
            .run_blocking(move |pipeline| pipeline.run_evaluation(top_k))
            .await,
    )
}

fn parse_top_k(raw: Option<&str>) -> Result<Option<usize>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<usize>()
            .map(Some)
            .map_err(|_| RagError::Validation(format!("topK must be a positive integer, got {:?}", raw))),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/index", post(index))
        .route("/api/ask", post(ask))
        .route("/api/eval", get(eval))
        .with_state(state)
}

/// Serve the API on `0.0.0.0:port` until Ctrl-C.
pub async fn serve(pipeline: Arc<RagPipeline>, port: u16) -> std::io::Result<()> {
    let app = router(AppState::new(pipeline));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "RAG service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
}
