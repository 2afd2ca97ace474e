//! Upload ingestion: validate, store, extract, record.
//!
//! Each uploaded file goes through the same steps:
//!
//! ```text
//! validate name/size → write PDF → extract text → write .txt → insert row
//! ```
//!
//! A failure at any step after the PDF is written removes whatever was
//! written for that file, so a failed upload leaves neither a row nor files
//! behind. Files in one batch are processed independently.

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::app::App;
use crate::error::AppError;
use crate::extract::{extract_pdf_blocking, MIME_PDF};
use crate::files::{self, StoredPaths};
use crate::models::{Document, NewDocument};

/// One file taken from an upload request.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Per-file result reported back to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum UploadOutcome {
    Stored {
        document_id: i64,
        filename: String,
        text_path: String,
        message: String,
    },
    Failed {
        filename: String,
        error: String,
        #[serde(skip)]
        invalid: bool,
    },
}

impl UploadOutcome {
    /// True when the file was rejected before anything was written.
    pub fn is_invalid(&self) -> bool {
        matches!(self, UploadOutcome::Failed { invalid: true, .. })
    }
}

fn validate(file: &UploadFile) -> Result<(), AppError> {
    if !file.filename.to_ascii_lowercase().ends_with(".pdf") {
        return Err(AppError::Validation(format!(
            "'{}': only PDF files are allowed",
            file.filename
        )));
    }
    if file.bytes.is_empty() {
        return Err(AppError::Validation(format!(
            "'{}': file is empty",
            file.filename
        )));
    }
    Ok(())
}

/// Store one PDF and create its document row.
pub async fn ingest_file(app: &App, file: UploadFile) -> Result<Document, AppError> {
    validate(&file)?;

    let storage = &app.config().storage;
    let paths = StoredPaths::for_upload(storage, &file.filename);
    let size_bytes = file.bytes.len();
    let sha256 = hex::encode(Sha256::digest(&file.bytes));

    files::write_file(&paths.pdf, &file.bytes).await?;

    let extracted = match extract_pdf_blocking(file.bytes, file.filename.clone()).await {
        Ok(extracted) => extracted,
        Err(e) => {
            files::remove_quietly(&paths.pdf).await;
            return Err(e.into());
        }
    };

    if let Err(e) = files::write_file(&paths.text, extracted.text.as_bytes()).await {
        files::remove_quietly(&paths.pdf).await;
        files::remove_quietly(&paths.text).await;
        return Err(e.into());
    }

    let new_doc = NewDocument {
        filename: file.filename.clone(),
        file_path: paths.pdf.display().to_string(),
        text_path: paths.text.display().to_string(),
        upload_date: Utc::now(),
        metadata: serde_json::json!({
            "original_filename": file.filename,
            "content_type": file.content_type.as_deref().unwrap_or(MIME_PDF),
            "size_bytes": size_bytes,
            "sha256": sha256,
            "pages": extracted.pages,
            "empty_pages": extracted.empty_pages,
            "text_chars": extracted.text.chars().count(),
        }),
    };

    match app.store().create_document(&new_doc).await {
        Ok(doc) => {
            info!(
                document_id = doc.id,
                filename = %doc.filename,
                pages = extracted.pages,
                size_bytes,
                "stored document"
            );
            Ok(doc)
        }
        Err(e) => {
            files::remove_quietly(&paths.pdf).await;
            files::remove_quietly(&paths.text).await;
            Err(e.into())
        }
    }
}

/// Ingest every file, reporting success or failure per file.
pub async fn ingest_files(app: &App, uploads: Vec<UploadFile>) -> Vec<UploadOutcome> {
    let mut outcomes = Vec::with_capacity(uploads.len());
    for file in uploads {
        let filename = file.filename.clone();
        let outcome = match ingest_file(app, file).await {
            Ok(doc) => UploadOutcome::Stored {
                document_id: doc.id,
                filename: doc.filename,
                text_path: doc.text_path,
                message: "File uploaded successfully".to_string(),
            },
            Err(e) => {
                warn!(filename = %filename, error = %e, "upload failed");
                UploadOutcome::Failed {
                    filename,
                    invalid: matches!(e, AppError::Validation(_)),
                    error: e.to_string(),
                }
            }
        };
        outcomes.push(outcome);
    }
    outcomes
}
