//! The question-answering flow for one stored document.
//!
//! ```text
//! look up document → read text → (chunks mode) cached index → top-k
//!                  → prompt → completion → record session
//! ```
//!
//! Nothing is written unless an answer was produced; the session, both
//! messages, and the question counter are committed together.

use serde::Serialize;
use tracing::{debug, info};

use crate::app::App;
use crate::config::ContextMode;
use crate::error::{AppError, IndexBuildError};
use crate::files;
use crate::models::Document;
use crate::qa::{self, QaContext};

#[derive(Debug, Clone, Serialize)]
pub struct AskOutcome {
    pub answer: String,
    pub document_id: i64,
    pub session_id: i64,
}

pub async fn ask(app: &App, document_id: i64, question: &str) -> Result<AskOutcome, AppError> {
    // The literal question is what gets stored; trimming only decides emptiness.
    if question.trim().is_empty() {
        return Err(AppError::Validation(
            "question must not be empty".to_string(),
        ));
    }

    let doc = app
        .store()
        .get_document(document_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("document {} not found", document_id)))?;

    let text = files::read_text(std::path::Path::new(&doc.text_path)).await?;

    let answer = if app.completer().is_enabled() {
        let context = build_context(app, &doc, &text, question).await?;
        qa::answer(app.completer(), &doc.filename, question, &context).await?
    } else {
        qa::DISABLED_ANSWER.to_string()
    };

    let exchange = app
        .store()
        .record_exchange(doc.id, question, &answer)
        .await?;

    info!(
        document_id = doc.id,
        session_id = exchange.session.id,
        answer_chars = answer.len(),
        "answered question"
    );

    Ok(AskOutcome {
        answer,
        document_id: doc.id,
        session_id: exchange.session.id,
    })
}

async fn build_context(
    app: &App,
    doc: &Document,
    text: &str,
    question: &str,
) -> Result<QaContext, AppError> {
    let config = app.config();
    match config.retrieval.mode {
        ContextMode::FullText => Ok(QaContext::FullText(text.to_string())),
        ContextMode::Chunks => {
            let index = app
                .cache()
                .get_or_build(
                    doc.id,
                    text,
                    app.embedder(),
                    &config.chunking,
                    config.embedding.batch_size,
                )
                .await?;

            let chunk_count = index.len() as i64;
            if doc.chunk_count != Some(chunk_count) {
                app.store().set_chunk_count(doc.id, chunk_count).await?;
            }

            if index.is_empty() {
                return Ok(QaContext::Retrieved(Vec::new()));
            }

            let query = app
                .embedder()
                .embed_query(question)
                .await
                .map_err(|e| IndexBuildError::Embedding(format!("{:#}", e)))?;
            let hits = index.search(&query, config.retrieval.top_k);
            debug!(
                document_id = doc.id,
                hits = hits.len(),
                best = hits.first().map(|h| h.score),
                "retrieved chunks"
            );

            Ok(QaContext::Retrieved(
                hits.into_iter().map(|h| h.text).collect(),
            ))
        }
    }
}
