//! # pdf-qa
//!
//! Upload PDF documents and ask natural-language questions about them.
//!
//! Uploaded PDFs are stored on disk, their text is extracted, and a record is
//! written to SQLite. When a question arrives, the document's text is split
//! into overlapping chunks, embedded, and kept as an in-memory index; the
//! chunks closest to the question are sent to a completion model together
//! with an instruction to answer only from them. Each answered question is
//! persisted as a chat session.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌────────────────┐
//! │  upload  │──▶│  extract  │──▶│ SQLite + files │
//! └──────────┘   └───────────┘   └───────┬────────┘
//!                                        │
//! ┌──────────┐   ┌───────────┐   ┌───────▼────────┐
//! │  answer  │◀──│    qa     │◀──│ cache → index  │
//! └──────────┘   └───────────┘   └────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pdfqa init
//! pdfqa upload report.pdf
//! pdfqa ask 1 "What was the revenue growth?"
//! pdfqa serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | Error kinds and their HTTP mapping |
//! | [`extract`] | PDF text extraction |
//! | [`chunk`] | Overlapping text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`completion`] | Completion provider abstraction |
//! | [`index`] | Per-document vector index |
//! | [`cache`] | In-memory index cache with per-document build dedup |
//! | [`qa`] | Prompt assembly and answer generation |
//! | [`store`] | Documents, sessions, and messages in SQLite |
//! | [`files`] | PDF and text file storage |
//! | [`app`] | Shared application object |
//! | [`ingest`] / [`ask`] / [`history`] | Application flows |
//! | [`server`] | HTTP API |

pub mod app;
pub mod ask;
pub mod cache;
pub mod chunk;
pub mod completion;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod files;
pub mod history;
pub mod index;
pub mod ingest;
pub mod llm_client;
pub mod migrate;
pub mod models;
pub mod qa;
pub mod server;
pub mod store;
