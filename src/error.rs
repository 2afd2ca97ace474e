//! Error taxonomy shared by every component.
//!
//! Components return these as values; the HTTP layer maps each kind to a
//! status code and a machine-readable error code (see [`AppError::status`]).

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Bad input shape or type (non-PDF upload, empty question).
    #[error("{0}")]
    Validation(String),

    /// Unknown document or session.
    #[error("{0}")]
    NotFound(String),

    /// Admin operation with a missing or wrong secret.
    #[error("{0}")]
    Forbidden(String),

    /// Request body over `server.max_upload_bytes`.
    #[error("{0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    IndexBuild(#[from] IndexBuildError),

    #[error(transparent)]
    AnswerGeneration(#[from] AnswerGenerationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Extraction(_)
            | AppError::IndexBuild(_)
            | AppError::AnswerGeneration(_)
            | AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::Forbidden(_) => "forbidden",
            AppError::PayloadTooLarge(_) => "payload_too_large",
            AppError::Extraction(_) => "extraction_failed",
            AppError::IndexBuild(_) => "index_build_failed",
            AppError::AnswerGeneration(_) => "answer_failed",
            AppError::Storage(_) => "storage_error",
        }
    }
}

/// The PDF could not be parsed.
#[derive(Debug, Error)]
#[error("could not extract text from '{filename}': {message}")]
pub struct ExtractionError {
    pub filename: String,
    pub message: String,
}

/// Chunk embedding failed; no index was built.
#[derive(Debug, Error)]
pub enum IndexBuildError {
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("embedding provider returned {got} vectors for {expected} chunks")]
    CountMismatch { expected: usize, got: usize },
}

#[derive(Debug, Error)]
#[error("error generating answer: {0}")]
pub struct AnswerGenerationError(pub String);

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("file error on {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Other(String),
}

impl StorageError {
    pub fn file(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        StorageError::File {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}
