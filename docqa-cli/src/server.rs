//! HTTP surface over a shared [`DocumentQa`].

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Query, Request, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use docqa_rag::{ChatResponse, DocumentQa, RagError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::commands::reingest;

/// Largest accepted upload body.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Multipart field carrying the uploaded file.
const UPLOAD_FIELD: &str = "file";

#[derive(Clone)]
pub struct AppState {
    pub qa: Arc<DocumentQa>,
    /// Where uploaded PDFs are kept, if anywhere.
    pub upload_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(qa: Arc<DocumentQa>) -> Self {
        Self { qa, upload_dir: None, max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES }
    }

    pub fn with_upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = Some(dir.into());
        self
    }

    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("upload_dir", &self.upload_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8000 }
    }
}

#[derive(Debug, Deserialize)]
struct QueryRequest {
    question: String,
}

#[derive(Debug, Serialize)]
struct QueryResponse {
    #[serde(flatten)]
    response: ChatResponse,
    /// Seconds spent answering.
    response_time: f64,
}

#[derive(Debug, Deserialize)]
struct UploadParams {
    /// File name for raw-body uploads; multipart uploads carry their own.
    filename: Option<String>,
}

#[derive(Debug, Serialize)]
struct FailedFile {
    file: String,
    error: String,
}

/// A failure rendered as `{"error", "kind"}`.
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, kind: "bad_request", message: message.into() }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: "internal_error",
            message: message.into(),
        }
    }

    /// An extractor rejection, keeping its status.
    fn rejected(status: StatusCode, message: String) -> Self {
        let kind = if status == StatusCode::PAYLOAD_TOO_LARGE { "payload_too_large" } else { "bad_request" };
        Self { status, kind, message }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<RagError>() {
            Ok(rag) => rag.into(),
            Err(other) => Self::internal(format!("{other:#}")),
        }
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        let status = match &err {
            RagError::Extraction { .. } => StatusCode::BAD_REQUEST,
            e if e.is_upstream() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, kind: err.kind(), message: err.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({"error": self.message, "kind": self.kind}))).into_response()
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/health", get(health))
        .route("/api/query", post(query))
        .route("/api/stats", get(stats))
        .route("/api/upload", post(upload).layer(upload_limit))
        .route("/api/reingest", post(reingest_uploads))
        .route("/api/clear", post(clear))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run_server(state: AppState, config: ServerConfig) -> anyhow::Result<()> {
    let app = app_router(state);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("docqa listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok", "service": "docqa"}))
}

async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(ApiError::bad_request("question must not be empty"));
    }
    let started = Instant::now();
    let response = state.qa.query(question).await?;
    Ok(Json(QueryResponse { response, response_time: started.elapsed().as_secs_f64() }))
}

async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.qa.stats().await?))
}

/// The final path component of `name`, if it is a `.pdf` file name.
fn upload_name(name: &str) -> Option<String> {
    let file_name = Path::new(name).file_name()?.to_str()?;
    let is_pdf = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    is_pdf.then(|| file_name.to_string())
}

/// Read the uploaded file from a multipart `file` field or from the raw body.
async fn read_upload(
    state: &AppState,
    params: UploadParams,
    request: Request,
) -> Result<(String, Bytes), ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    if !is_multipart {
        let name = params
            .filename
            .ok_or_else(|| ApiError::bad_request("filename query parameter is required"))?;
        let body = Bytes::from_request(request, state)
            .await
            .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;
        return Ok((name, body));
    }

    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;
    while let Some(field) =
        multipart.next_field().await.map_err(|e| ApiError::rejected(e.status(), e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let name = field
            .file_name()
            .map(str::to_string)
            .or(params.filename)
            .ok_or_else(|| ApiError::bad_request("uploaded file has no name"))?;
        let body =
            field.bytes().await.map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;
        return Ok((name, body));
    }
    Err(ApiError::bad_request(format!("multipart body has no '{UPLOAD_FIELD}' field")))
}

async fn upload(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    request: Request,
) -> Result<impl IntoResponse, ApiError> {
    if params.filename.as_deref().is_some_and(|name| upload_name(name).is_none()) {
        return Err(ApiError::bad_request("filename must name a .pdf file"));
    }
    let (name, body) = read_upload(&state, params, request).await?;
    let filename =
        upload_name(&name).ok_or_else(|| ApiError::bad_request("filename must name a .pdf file"))?;
    if body.is_empty() {
        return Err(ApiError::bad_request("request body is empty"));
    }

    let report = state.qa.ingest(&body, &filename).await?;

    if let Some(dir) = &state.upload_dir {
        let saved = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(dir.join(&filename), &body).await
        };
        if let Err(e) = saved.await {
            warn!(filename, error = %e, "failed to keep a copy of the upload");
        }
    }
    Ok(Json(report))
}

/// Clear the index and ingest every PDF kept in the upload directory.
async fn reingest_uploads(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let dir = state
        .upload_dir
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("no upload directory is configured"))?;
    let summary = reingest(&state.qa, dir).await?;
    let failed: Vec<FailedFile> = summary
        .failed
        .iter()
        .map(|(path, error)| FailedFile { file: path.display().to_string(), error: error.clone() })
        .collect();
    Ok(Json(json!({
        "status": "reingested",
        "files_processed": summary.ingested.len(),
        "chunks_added": summary.chunks_added(),
        "failed": failed,
    })))
}

async fn clear(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.qa.clear().await?;
    Ok(Json(json!({"status": "cleared"})))
}
