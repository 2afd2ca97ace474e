//! Document listing, per-document chat history, and the admin clear.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::app::App;
use crate::config::AdminConfig;
use crate::error::AppError;
use crate::files;
use crate::models::{Document, Message, Role, SessionWithMessages};

#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub id: i64,
    pub filename: String,
    pub file_path: String,
    pub text_path: String,
    pub upload_date: DateTime<Utc>,
    pub metadata: serde_json::Value,
    pub question_count: i64,
    pub chunk_count: Option<i64>,
}

/// Every document, newest upload first.
pub async fn list_documents(app: &App) -> Result<Vec<DocumentSummary>, AppError> {
    let docs = app.store().list_documents().await?;
    Ok(docs
        .into_iter()
        .map(|d| DocumentSummary {
            id: d.id,
            filename: d.filename,
            file_path: d.file_path,
            text_path: d.text_path,
            upload_date: d.upload_date,
            metadata: d.metadata,
            question_count: d.question_count,
            chunk_count: d.chunk_count,
        })
        .collect())
}

/// Sessions for one document, newest first, each with its messages in order.
pub async fn document_history(
    app: &App,
    document_id: i64,
) -> Result<Vec<SessionWithMessages>, AppError> {
    let store = app.store();
    require_document(app, document_id).await?;

    let sessions = store.list_sessions(document_id).await?;
    let mut history = Vec::with_capacity(sessions.len());
    for session in sessions {
        let messages = store.list_messages(session.id).await?;
        history.push(SessionWithMessages {
            id: session.id,
            document_id: session.document_id,
            created_at: session.created_at,
            messages,
        });
    }
    Ok(history)
}

async fn require_document(app: &App, document_id: i64) -> Result<Document, AppError> {
    app.store()
        .get_document(document_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("document {} not found", document_id)))
}

/// One message of a client-kept chat transcript.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptMessage {
    #[serde(alias = "type")]
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedTranscript {
    pub status: &'static str,
    pub session_id: i64,
    pub message_count: usize,
}

/// The most recently saved transcript of a document: the messages of its
/// newest session, or an empty list when it has none.
pub async fn transcript(app: &App, document_id: i64) -> Result<Vec<Message>, AppError> {
    require_document(app, document_id).await?;
    let store = app.store();
    match store.list_sessions(document_id).await?.first() {
        Some(latest) => Ok(store.list_messages(latest.id).await?),
        None => Ok(Vec::new()),
    }
}

/// Store a transcript as a new session. Roles are checked before anything is
/// written.
pub async fn save_transcript(
    app: &App,
    document_id: i64,
    messages: &[TranscriptMessage],
) -> Result<SavedTranscript, AppError> {
    let doc = require_document(app, document_id).await?;
    let parsed = messages
        .iter()
        .enumerate()
        .map(|(i, m)| {
            Role::parse(&m.role)
                .map(|role| (role, m.content.as_str()))
                .ok_or_else(|| {
                    AppError::Validation(format!(
                        "messages[{}]: unknown role '{}', expected 'user' or 'assistant'",
                        i, m.role
                    ))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let store = app.store();
    let session = store.create_session(doc.id).await?;
    for (role, content) in &parsed {
        store.append_message(session.id, *role, content).await?;
    }

    info!(
        document_id = doc.id,
        session_id = session.id,
        messages = parsed.len(),
        "saved transcript"
    );
    Ok(SavedTranscript {
        status: "success",
        session_id: session.id,
        message_count: parsed.len(),
    })
}

/// Accept only a configured, matching secret.
pub fn authorize_admin(admin: &AdminConfig, provided: Option<&str>) -> Result<(), AppError> {
    match (admin.secret.as_deref(), provided) {
        (Some(expected), Some(given)) if !expected.is_empty() && expected == given => Ok(()),
        (None, _) => {
            warn!("admin clear requested but no admin secret is configured");
            Err(AppError::Forbidden(
                "admin operations are disabled".to_string(),
            ))
        }
        _ => Err(AppError::Forbidden("invalid admin secret".to_string())),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearReport {
    pub status: &'static str,
    pub message: String,
    pub documents_removed: u64,
    pub files_removed: usize,
}

/// Delete every record and stored file and drop all cached indexes.
pub async fn clear_all(app: &App) -> Result<ClearReport, AppError> {
    let documents_removed = app.store().clear_all().await?;
    let files_removed = files::clear_dirs(&app.config().storage).await?;
    app.cache().clear();

    info!(documents_removed, files_removed, "cleared all data");
    Ok(ClearReport {
        status: "success",
        message: format!(
            "Removed {} documents and {} files",
            documents_removed, files_removed
        ),
        documents_removed,
        files_removed,
    })
}
