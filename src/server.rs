//! JSON HTTP gateway.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/documents` | Insert a document, returns `{ "id": ... }` |
//! | `GET`  | `/documents/{id}` | Fetch a stored document |
//! | `GET`  | `/documents/{id}/paragraphs` | Document name and content split into lines |
//! | `POST` | `/search` | Top-k hybrid search |
//! | `POST` | `/search/page` | Interactive page (`from_` offset) |
//! | `POST` | `/chat` | Retrieve, assemble a grounding prompt, generate |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid request: query must not be empty" } }
//! ```
//!
//! | Error | Status |
//! |-------|--------|
//! | `bad_request`, `ingestion_format` | 400 |
//! | `not_found` | 404 |
//! | `generation_unavailable` | 500 |
//! | `embedding_unavailable`, `search_engine_unavailable` | 503 |

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::GatewayError;
use crate::get::{get_document, paragraphs};
use crate::models::{
    ChatAnswer, ChatQuestion, Document, DocumentId, PageQuery, RankedHit, SearchPage, SearchQuery,
    StoredDocument,
};
use crate::services::Services;

/// Build the router over shared services. Exposed for in-process tests.
pub fn router(state: Services) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/documents", post(handle_add_document))
        .route("/documents/{id}", get(handle_get_document))
        .route("/documents/{id}/paragraphs", get(handle_paragraphs))
        .route("/search", post(handle_search))
        .route("/search/page", post(handle_search_page))
        .route("/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP gateway on `[server].bind`. Runs until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let services = Services::from_config(config).await?;
    let app = router(services);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "gateway listening");
    println!("docsearch listening on http://{}", config.server.bind);
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

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        let status = match err {
            GatewayError::Validation(_) | GatewayError::IngestionFormat(_) => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::GenerationUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::EmbeddingUnavailable(_) | GatewayError::SearchEngineUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        if status.is_server_error() {
            warn!(code = err.code(), error = %err, "request failed");
        }
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

type ApiResult<T> = Result<Json<T>, AppError>;

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

// ============ Documents ============

async fn handle_add_document(
    State(state): State<Services>,
    body: Result<Json<Document>, JsonRejection>,
) -> ApiResult<DocumentId> {
    let Json(document) = body?;
    let id = state.ingestor.insert_document(document).await?;
    Ok(Json(id))
}

async fn handle_get_document(
    State(state): State<Services>,
    Path(id): Path<String>,
) -> ApiResult<StoredDocument> {
    Ok(Json(get_document(state.engine.as_ref(), &id).await?))
}

#[derive(Serialize)]
struct ParagraphsResponse {
    id: String,
    name: Option<String>,
    paragraphs: Vec<String>,
}

async fn handle_paragraphs(
    State(state): State<Services>,
    Path(id): Path<String>,
) -> ApiResult<ParagraphsResponse> {
    let stored = get_document(state.engine.as_ref(), &id).await?;
    let paragraphs = paragraphs(&stored.document.content)
        .into_iter()
        .map(str::to_string)
        .collect();
    Ok(Json(ParagraphsResponse {
        id: stored.id,
        name: stored.document.name,
        paragraphs,
    }))
}

// ============ Search ============

async fn handle_search(
    State(state): State<Services>,
    body: Result<Json<SearchQuery>, JsonRejection>,
) -> ApiResult<Vec<RankedHit>> {
    let Json(query) = body?;
    let top_k = state.pipeline.resolve_top_k(query.top_k);
    Ok(Json(state.pipeline.retrieve(&query.query, top_k).await?))
}

async fn handle_search_page(
    State(state): State<Services>,
    body: Result<Json<PageQuery>, JsonRejection>,
) -> ApiResult<SearchPage> {
    let Json(query) = body?;
    Ok(Json(state.pipeline.search_page(&query.query, query.from).await?))
}

// ============ Chat ============

async fn handle_chat(
    State(state): State<Services>,
    body: Result<Json<ChatQuestion>, JsonRejection>,
) -> ApiResult<ChatAnswer> {
    let Json(question) = body?;
    Ok(Json(state.chat.ask(&question.question).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (GatewayError::Validation("x".into()), 400),
            (GatewayError::IngestionFormat("x".into()), 400),
            (GatewayError::NotFound("x".into()), 404),
            (GatewayError::EmbeddingUnavailable("x".into()), 503),
            (GatewayError::SearchEngineUnavailable("x".into()), 503),
            (GatewayError::GenerationUnavailable("x".into()), 500),
        ];
        for (err, status) in cases {
            let code = err.code();
            let app: AppError = err.into();
            assert_eq!(app.status.as_u16(), status);
            assert_eq!(app.code, code);
        }
    }
}
