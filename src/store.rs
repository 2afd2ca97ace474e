//! Relational persistence for documents, chat sessions, and messages.
//!
//! The [`Store`] trait is the seam between the application services and the
//! database; [`SqliteStore`] is the production implementation. Timestamps
//! are stored as fixed-width RFC 3339 strings (UTC, microseconds) so that
//! text ordering matches time ordering.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::StorageError;
use crate::models::{ChatSession, Document, Message, NewDocument, Role};

pub type StoreResult<T> = Result<T, StorageError>;

/// A completed question/answer exchange, as written by [`Store::record_exchange`].
#[derive(Debug, Clone)]
pub struct Exchange {
    pub session: ChatSession,
    pub question: Message,
    pub answer: Message,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_document(&self, doc: &NewDocument) -> StoreResult<Document>;

    async fn get_document(&self, id: i64) -> StoreResult<Option<Document>>;

    /// Newest upload first; equal timestamps fall back to id descending.
    async fn list_documents(&self) -> StoreResult<Vec<Document>>;

    async fn create_session(&self, document_id: i64) -> StoreResult<ChatSession>;

    async fn append_message(
        &self,
        session_id: i64,
        role: Role,
        content: &str,
    ) -> StoreResult<Message>;

    /// Sessions for one document, newest first.
    async fn list_sessions(&self, document_id: i64) -> StoreResult<Vec<ChatSession>>;

    /// Messages of one session in the order they were written.
    async fn list_messages(&self, session_id: i64) -> StoreResult<Vec<Message>>;

    /// Write a session with its user and assistant messages and bump the
    /// document's question count. All or nothing.
    async fn record_exchange(
        &self,
        document_id: i64,
        question: &str,
        answer: &str,
    ) -> StoreResult<Exchange>;

    async fn set_chunk_count(&self, document_id: i64, chunk_count: i64) -> StoreResult<()>;

    /// Delete every message, session, and document. Returns the number of
    /// documents removed.
    async fn clear_all(&self) -> StoreResult<u64>;

    async fn ping(&self) -> StoreResult<()>;
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::Other(format!("invalid timestamp '{}': {}", raw, e)))
}

const DOCUMENT_COLUMNS: &str =
    "id, filename, file_path, text_path, upload_date, metadata_json, question_count, chunk_count";

fn document_from_row(row: &SqliteRow) -> StoreResult<Document> {
    let upload_date: String = row.try_get("upload_date")?;
    let metadata_json: String = row.try_get("metadata_json")?;
    Ok(Document {
        id: row.try_get("id")?,
        filename: row.try_get("filename")?,
        file_path: row.try_get("file_path")?,
        text_path: row.try_get("text_path")?,
        upload_date: parse_ts(&upload_date)?,
        metadata: serde_json::from_str(&metadata_json)
            .map_err(|e| StorageError::Other(format!("invalid document metadata: {}", e)))?,
        question_count: row.try_get("question_count")?,
        chunk_count: row.try_get("chunk_count")?,
    })
}

fn session_from_row(row: &SqliteRow) -> StoreResult<ChatSession> {
    let created_at: String = row.try_get("created_at")?;
    Ok(ChatSession {
        id: row.try_get("id")?,
        document_id: row.try_get("document_id")?,
        created_at: parse_ts(&created_at)?,
    })
}

fn message_from_row(row: &SqliteRow) -> StoreResult<Message> {
    let created_at: String = row.try_get("created_at")?;
    let role: String = row.try_get("role")?;
    Ok(Message {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        role: Role::parse(&role)
            .ok_or_else(|| StorageError::Other(format!("unknown message role '{}'", role)))?,
        content: row.try_get("content")?,
        created_at: parse_ts(&created_at)?,
    })
}

async fn insert_message<'e, E>(
    executor: E,
    session_id: i64,
    role: Role,
    content: &str,
    created_at: DateTime<Utc>,
) -> StoreResult<Message>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let id = sqlx::query(
        "INSERT INTO messages (session_id, role, content, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(session_id)
    .bind(role.as_str())
    .bind(content)
    .bind(format_ts(&created_at))
    .execute(executor)
    .await?
    .last_insert_rowid();

    Ok(Message {
        id,
        session_id,
        role,
        content: content.to_string(),
        created_at,
    })
}

async fn insert_session<'e, E>(
    executor: E,
    document_id: i64,
    created_at: DateTime<Utc>,
) -> StoreResult<ChatSession>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let id = sqlx::query("INSERT INTO chat_sessions (document_id, created_at) VALUES (?, ?)")
        .bind(document_id)
        .bind(format_ts(&created_at))
        .execute(executor)
        .await?
        .last_insert_rowid();

    Ok(ChatSession {
        id,
        document_id,
        created_at,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_document(&self, doc: &NewDocument) -> StoreResult<Document> {
        let id = sqlx::query(
            "INSERT INTO documents (filename, file_path, text_path, upload_date, metadata_json) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&doc.filename)
        .bind(&doc.file_path)
        .bind(&doc.text_path)
        .bind(format_ts(&doc.upload_date))
        .bind(doc.metadata.to_string())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Document {
            id,
            filename: doc.filename.clone(),
            file_path: doc.file_path.clone(),
            text_path: doc.text_path.clone(),
            upload_date: doc.upload_date,
            metadata: doc.metadata.clone(),
            question_count: 0,
            chunk_count: None,
        })
    }

    async fn get_document(&self, id: i64) -> StoreResult<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE id = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(document_from_row).transpose()
    }

    async fn list_documents(&self) -> StoreResult<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM documents ORDER BY upload_date DESC, id DESC",
            DOCUMENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(document_from_row).collect()
    }

    async fn create_session(&self, document_id: i64) -> StoreResult<ChatSession> {
        insert_session(&self.pool, document_id, Utc::now()).await
    }

    async fn append_message(
        &self,
        session_id: i64,
        role: Role,
        content: &str,
    ) -> StoreResult<Message> {
        insert_message(&self.pool, session_id, role, content, Utc::now()).await
    }

    async fn list_sessions(&self, document_id: i64) -> StoreResult<Vec<ChatSession>> {
        let rows = sqlx::query(
            "SELECT id, document_id, created_at FROM chat_sessions \
             WHERE document_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(session_from_row).collect()
    }

    async fn list_messages(&self, session_id: i64) -> StoreResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, session_id, role, content, created_at FROM messages \
             WHERE session_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(message_from_row).collect()
    }

    async fn record_exchange(
        &self,
        document_id: i64,
        question: &str,
        answer: &str,
    ) -> StoreResult<Exchange> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let session = insert_session(&mut *tx, document_id, now).await?;
        let question = insert_message(&mut *tx, session.id, Role::User, question, now).await?;
        let answer = insert_message(&mut *tx, session.id, Role::Assistant, answer, now).await?;

        sqlx::query("UPDATE documents SET question_count = question_count + 1 WHERE id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Exchange {
            session,
            question,
            answer,
        })
    }

    async fn set_chunk_count(&self, document_id: i64, chunk_count: i64) -> StoreResult<()> {
        sqlx::query("UPDATE documents SET chunk_count = ? WHERE id = ?")
            .bind(chunk_count)
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_all(&self) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM messages").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM chat_sessions")
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM documents")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(removed)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
