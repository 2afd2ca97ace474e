//! Core data models used throughout the service.
//!
//! These types represent the stored documents, chat sessions, and messages
//! that flow between the persistence layer, the application services, and
//! the HTTP surface.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A document as it is about to be inserted (no id yet).
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub filename: String,
    pub file_path: String,
    pub text_path: String,
    pub upload_date: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

/// Stored document row.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: i64,
    pub filename: String,
    pub file_path: String,
    pub text_path: String,
    pub upload_date: DateTime<Utc>,
    pub metadata: serde_json::Value,
    pub question_count: i64,
    /// Number of chunks in the last built index; `None` until first asked.
    pub chunk_count: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatSession {
    pub id: i64,
    pub document_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: i64,
    pub session_id: i64,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A session together with its messages, oldest message first.
#[derive(Debug, Clone, Serialize)]
pub struct SessionWithMessages {
    pub id: i64,
    pub document_id: i64,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}
