//! HTTP API.
//!
//! Every route is served both at the root and under `/api`.
//!
//! # Endpoints
//!
//! | Method   | Path                      | Description |
//! |----------|---------------------------|-------------|
//! | `GET`    | `/health`                 | Version and dependency status |
//! | `POST`   | `/upload`                 | Multipart upload of one or more PDFs |
//! | `POST`   | `/ask`                    | Ask a question about a stored document |
//! | `GET`    | `/history`                | All documents, newest first |
//! | `GET`    | `/history/{document_id}`  | Chat sessions for one document |
//! | `GET`    | `/messages/{document_id}` | Latest saved chat transcript |
//! | `POST`   | `/messages/{document_id}` | Save a chat transcript as a new session |
//! | `DELETE` | `/admin/clear-all`        | Delete everything (`?secret=` required) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "document 42 not found" } }
//! ```
//!
//! Error codes: `bad_request` (400), `forbidden` (403), `not_found` (404),
//! `payload_too_large` (413), `extraction_failed`, `index_build_failed`, `answer_failed`,
//! `storage_error` (all 500).

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        multipart::MultipartError,
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Deserializer, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::app::{App, Health};
use crate::ask::{self, AskOutcome};
use crate::config::ServerConfig;
use crate::error::AppError;
use crate::history::{self, ClearReport, DocumentSummary, SavedTranscript, TranscriptMessage};
use crate::ingest::{self, UploadFile, UploadOutcome};
use crate::models::{Message, SessionWithMessages};

type AppState = Arc<App>;

/// Bind `config.server.bind` and serve until Ctrl-C.
pub async fn serve(app: Arc<App>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&app.config().server.bind).await?;
    serve_listener(listener, app).await
}

/// Serve on an already-bound listener.
pub async fn serve_listener(
    listener: tokio::net::TcpListener,
    app: Arc<App>,
) -> anyhow::Result<()> {
    let router = router(app)?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}

pub fn router(app: Arc<App>) -> anyhow::Result<Router> {
    let cors = cors_layer(&app.config().server)?;
    let body_limit = DefaultBodyLimit::max(app.config().server.max_upload_bytes);

    let routes: Router<AppState> = Router::new()
        .route("/health", get(handle_health))
        .route("/upload", post(handle_upload))
        .route("/ask", post(handle_ask))
        .route("/history", get(handle_history))
        .route("/history/{document_id}", get(handle_document_history))
        .route(
            "/messages/{document_id}",
            get(handle_get_messages).post(handle_save_messages),
        )
        .route("/admin/clear-all", delete(handle_clear_all));

    Ok(Router::new()
        .merge(routes.clone())
        .nest("/api", routes)
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app))
}

fn cors_layer(config: &ServerConfig) -> anyhow::Result<CorsLayer> {
    let origin = if config.allowed_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins = config
            .allowed_origins
            .iter()
            .map(|o| {
                HeaderValue::from_str(o)
                    .map_err(|_| anyhow::anyhow!("invalid CORS origin in server.allowed_origins: {}", o))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::Validation(message.into())
}

/// Body-limit failures surface while reading multipart fields; keep their 413.
fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        bad_request(e.body_text())
    }
}

// ============ GET /health ============

async fn handle_health(State(app): State<AppState>) -> Json<Health> {
    Json(app.health().await)
}

// ============ POST /upload ============

async fn handle_upload(
    State(app): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Vec<UploadOutcome>>, AppError> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| match multipart_error(e) {
            AppError::Validation(message) => bad_request(format!("'{}': {}", filename, message)),
            other => other,
        })?;
        uploads.push(UploadFile {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    if uploads.is_empty() {
        return Err(bad_request("no file provided"));
    }

    let outcomes = ingest::ingest_files(&app, uploads).await;
    if outcomes.iter().all(UploadOutcome::is_invalid) {
        let message = outcomes
            .iter()
            .filter_map(|o| match o {
                UploadOutcome::Failed { error, .. } => Some(error.as_str()),
                UploadOutcome::Stored { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("; ");
        return Err(bad_request(message));
    }

    Ok(Json(outcomes))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    #[serde(deserialize_with = "number_or_numeric_string")]
    document_id: i64,
    question: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Int(i64),
    Text(String),
}

/// Browser clients send ids taken from URLs or form fields as strings.
fn number_or_numeric_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match IdRepr::deserialize(deserializer)? {
        IdRepr::Int(id) => Ok(id),
        IdRepr::Text(raw) => raw.trim().parse().map_err(|_| {
            serde::de::Error::custom(format!("expected an integer document id, got '{}'", raw))
        }),
    }
}

async fn handle_ask(
    State(app): State<AppState>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskOutcome>, AppError> {
    let Json(req) = body.map_err(|e| bad_request(e.body_text()))?;
    Ok(Json(ask::ask(&app, req.document_id, &req.question).await?))
}

// ============ GET /history ============

async fn handle_history(
    State(app): State<AppState>,
) -> Result<Json<Vec<DocumentSummary>>, AppError> {
    Ok(Json(history::list_documents(&app).await?))
}

async fn handle_document_history(
    State(app): State<AppState>,
    document_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<SessionWithMessages>>, AppError> {
    let Path(document_id) = document_id.map_err(|e| bad_request(e.body_text()))?;
    Ok(Json(history::document_history(&app, document_id).await?))
}

// ============ /messages/{document_id} ============

#[derive(Deserialize)]
struct SaveMessagesRequest {
    messages: Vec<TranscriptMessage>,
}

async fn handle_get_messages(
    State(app): State<AppState>,
    document_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<Message>>, AppError> {
    let Path(document_id) = document_id.map_err(|e| bad_request(e.body_text()))?;
    Ok(Json(history::transcript(&app, document_id).await?))
}

async fn handle_save_messages(
    State(app): State<AppState>,
    document_id: Result<Path<i64>, PathRejection>,
    body: Result<Json<SaveMessagesRequest>, JsonRejection>,
) -> Result<Json<SavedTranscript>, AppError> {
    let Path(document_id) = document_id.map_err(|e| bad_request(e.body_text()))?;
    let Json(req) = body.map_err(|e| bad_request(e.body_text()))?;
    Ok(Json(
        history::save_transcript(&app, document_id, &req.messages).await?,
    ))
}

// ============ DELETE /admin/clear-all ============

#[derive(Deserialize)]
struct ClearParams {
    secret: Option<String>,
}

async fn handle_clear_all(
    State(app): State<AppState>,
    Query(params): Query<ClearParams>,
) -> Result<(StatusCode, Json<ClearReport>), AppError> {
    history::authorize_admin(&app.config().admin, params.secret.as_deref())?;
    Ok((StatusCode::OK, Json(history::clear_all(&app).await?)))
}
