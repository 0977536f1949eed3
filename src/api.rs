//! HTTP surface for the document QA pipeline.
//!
//! - `GET /api/status`: lifecycle state and whether a persisted index exists.
//! - `POST /api/index`: rebuild the index from the source directory (optionally overridden).
//! - `POST /api/query`: answer a question with cited source previews.
//! - `GET /api/documents`, `PUT /api/documents/:filename`, `DELETE /api/documents/:filename`:
//!   manage the PDFs in the source directory.
//! - `GET /metrics` and `GET /commands`: counters and a machine-readable route catalog.
//!
//! The HTTP surface shares the pipeline with the MCP server, so behavior is identical across
//! interfaces.

use crate::documents::{DocumentError, DocumentInfo};
use crate::metrics::MetricsSnapshot;
use crate::pipeline::{
    IndexError, PipelineApi, PipelineState, PipelineStatus, QueryError, QueryResult,
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Build the HTTP router exposing the pipeline.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: PipelineApi + 'static,
{
    Router::new()
        .route("/api/status", get(get_status::<S>))
        .route("/api/index", post(index_documents::<S>))
        .route("/api/query", post(query::<S>))
        .route("/api/documents", get(list_documents::<S>))
        .route(
            "/api/documents/:filename",
            put(upload_document::<S>)
                .delete(delete_document::<S>)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(service)
}

/// Response body for `GET /api/status`.
#[derive(Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    status: PipelineStatus,
    /// Human-readable summary of the state.
    message: &'static str,
}

async fn get_status<S>(State(service): State<Arc<S>>) -> Json<StatusResponse>
where
    S: PipelineApi,
{
    let status = service.status().await;
    let message = match status.state {
        PipelineState::Ready => "Ready to answer questions",
        PipelineState::Unindexed => "No documents indexed yet; upload PDFs and run indexing",
    };
    Json(StatusResponse { status, message })
}

/// Request body for `POST /api/index`.
#[derive(Deserialize, Default)]
struct IndexRequest {
    /// Directory to index instead of the configured source directory.
    #[serde(default)]
    source_dir: Option<PathBuf>,
}

/// Success response for `POST /api/index`.
#[derive(Serialize)]
struct IndexResponse {
    success: bool,
    chunk_count: usize,
    documents: usize,
    pages: usize,
    message: String,
}

/// Rebuild the index. The body is optional; an absent body indexes the configured directory.
async fn index_documents<S>(
    State(service): State<Arc<S>>,
    request: Option<Json<IndexRequest>>,
) -> Result<Json<IndexResponse>, ApiError>
where
    S: PipelineApi,
{
    let IndexRequest { source_dir } = request.map(|Json(body)| body).unwrap_or_default();
    let outcome = service.index(source_dir).await?;
    Ok(Json(IndexResponse {
        success: true,
        chunk_count: outcome.chunk_count,
        documents: outcome.documents,
        pages: outcome.pages,
        message: format!(
            "Indexed {} chunks from {} documents",
            outcome.chunk_count, outcome.documents
        ),
    }))
}

/// Request body for `POST /api/query`.
#[derive(Deserialize)]
struct QueryRequest {
    question: String,
}

async fn query<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResult>, ApiError>
where
    S: PipelineApi,
{
    Ok(Json(service.query(&request.question).await?))
}

/// Response body for `GET /api/documents`.
#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<DocumentInfo>,
    count: usize,
}

async fn list_documents<S>(
    State(service): State<Arc<S>>,
) -> Result<Json<DocumentsResponse>, ApiError>
where
    S: PipelineApi,
{
    let documents = service.list_documents().await?;
    Ok(Json(DocumentsResponse {
        count: documents.len(),
        documents,
    }))
}

/// Store the raw request body as `filename` in the source directory.
async fn upload_document<S>(
    State(service): State<Arc<S>>,
    Path(filename): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<DocumentInfo>), ApiError>
where
    S: PipelineApi,
{
    let info = service.save_document(&filename, body.to_vec()).await?;
    Ok((StatusCode::CREATED, Json(info)))
}

async fn delete_document<S>(
    State(service): State<Arc<S>>,
    Path(filename): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError>
where
    S: PipelineApi,
{
    service.delete_document(&filename).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Deleted {filename}"),
    })))
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: PipelineApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery by hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "status",
                method: "GET",
                path: "/api/status",
                description: "Report whether the pipeline is UNINDEXED or READY and whether a persisted index exists.",
                request_example: None,
            },
            CommandDescriptor {
                name: "index",
                method: "POST",
                path: "/api/index",
                description: "Load every PDF, chunk, embed, and replace the vector index. Returns { \"success\": bool, \"chunk_count\": number }.",
                request_example: Some(json!({ "source_dir": "data/pdfs" })),
            },
            CommandDescriptor {
                name: "query",
                method: "POST",
                path: "/api/query",
                description: "Answer a question from the indexed documents with cited source previews.",
                request_example: Some(json!({ "question": "What is multi-head attention?" })),
            },
            CommandDescriptor {
                name: "list_documents",
                method: "GET",
                path: "/api/documents",
                description: "List PDFs in the source directory with their sizes.",
                request_example: None,
            },
            CommandDescriptor {
                name: "upload_document",
                method: "PUT",
                path: "/api/documents/{filename}",
                description: "Store the raw request body as a PDF in the source directory. Run indexing afterwards.",
                request_example: None,
            },
            CommandDescriptor {
                name: "delete_document",
                method: "DELETE",
                path: "/api/documents/{filename}",
                description: "Remove a PDF from the source directory. The current index is kept until the next indexing run.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return indexing and query counters.",
                request_example: None,
            },
        ],
    })
}

enum ApiError {
    Index(IndexError),
    Query(QueryError),
    Document(DocumentError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Index(IndexError::NoDocumentsFound(_) | IndexError::NoChunks) => {
                StatusCode::BAD_REQUEST
            }
            Self::Index(
                IndexError::Embedding(_) | IndexError::EmbeddingCountMismatch { .. },
            ) => StatusCode::BAD_GATEWAY,
            Self::Index(IndexError::Chunking(_) | IndexError::Build(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Query(QueryError::NotReady | QueryError::EmptyQuestion) => {
                StatusCode::BAD_REQUEST
            }
            Self::Query(
                QueryError::Embedding(_)
                | QueryError::EmptyEmbedding
                | QueryError::DimensionMismatch { .. },
            ) => StatusCode::BAD_GATEWAY,
            Self::Document(DocumentError::InvalidName(_) | DocumentError::UnsupportedType(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Document(DocumentError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Document(DocumentError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Index(error) => {
                tracing::warn!(%error, "Index request failed");
                json!({ "success": false, "chunk_count": 0, "error": error.to_string() })
            }
            Self::Query(error) => {
                tracing::warn!(%error, "Query request failed");
                json!({ "error": error.to_string() })
            }
            Self::Document(error) => json!({ "error": error.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<IndexError> for ApiError {
    fn from(inner: IndexError) -> Self {
        Self::Index(inner)
    }
}

impl From<QueryError> for ApiError {
    fn from(inner: QueryError) -> Self {
        Self::Query(inner)
    }
}

impl From<DocumentError> for ApiError {
    fn from(inner: DocumentError) -> Self {
        Self::Document(inner)
    }
}
