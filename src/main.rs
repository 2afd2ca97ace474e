//! # pdf-qa CLI (`pdfqa`)
//!
//! ## Usage
//!
//! ```bash
//! pdfqa --config ./config/pdfqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pdfqa init` | Create the database, run migrations, create storage directories |
//! | `pdfqa serve` | Start the HTTP server |
//! | `pdfqa upload <files…>` | Store and extract one or more PDFs |
//! | `pdfqa ask <id> "<question>"` | Ask a question about a stored document |
//! | `pdfqa history [id]` | List documents, or the sessions of one document |
//! | `pdfqa clear --yes` | Delete every document, session, and stored file |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pdf_qa::app::App;
use pdf_qa::ingest::{UploadFile, UploadOutcome};
use pdf_qa::{ask, config, db, files, history, ingest, migrate, server};

/// Upload PDFs and ask questions about them.
#[derive(Parser)]
#[command(name = "pdfqa", version, about = "Upload PDFs and ask questions about them")]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pdfqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema and storage directories. Idempotent.
    Init,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Store PDFs and extract their text.
    Upload {
        /// PDF files to upload.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Ask a question about a stored document.
    Ask {
        document_id: i64,
        question: String,
    },

    /// List documents, or show the chat sessions of one document.
    History { document_id: Option<i64> },

    /// Delete every document, session, and stored file.
    Clear {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pdf_qa=info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;

    // `init` must work before any provider credentials are set up.
    if let Commands::Init = cli.command {
        let pool = db::connect(&cfg).await?;
        migrate::run_migrations(&pool).await?;
        files::ensure_dirs(&cfg.storage).await?;
        pool.close().await;
        println!("Database and storage directories initialized.");
        return Ok(());
    }

    let app = App::from_config(cfg).await?;

    match cli.command {
        Commands::Init => unreachable!("handled above"),
        Commands::Serve => {
            server::serve(Arc::new(app)).await?;
        }
        Commands::Upload { files } => {
            let mut uploads = Vec::with_capacity(files.len());
            for path in &files {
                let bytes = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                uploads.push(UploadFile {
                    filename,
                    content_type: None,
                    bytes,
                });
            }

            let outcomes = ingest::ingest_files(&app, uploads).await;
            for outcome in &outcomes {
                match outcome {
                    UploadOutcome::Stored {
                        document_id,
                        filename,
                        ..
                    } => println!("{}\t{}", document_id, filename),
                    UploadOutcome::Failed {
                        filename, error, ..
                    } => eprintln!("failed\t{}\t{}", filename, error),
                }
            }
            if outcomes
                .iter()
                .all(|o| matches!(o, UploadOutcome::Failed { .. }))
            {
                bail!("no files were uploaded");
            }
        }
        Commands::Ask {
            document_id,
            question,
        } => {
            let outcome = ask::ask(&app, document_id, &question).await?;
            println!("{}", outcome.answer);
        }
        Commands::History { document_id } => {
            let json = match document_id {
                Some(id) => serde_json::to_string_pretty(&history::document_history(&app, id).await?)?,
                None => serde_json::to_string_pretty(&history::list_documents(&app).await?)?,
            };
            println!("{}", json);
        }
        Commands::Clear { yes } => {
            if !yes {
                bail!("refusing to delete everything without --yes");
            }
            let report = history::clear_all(&app).await?;
            println!("{}", report.message);
        }
    }

    Ok(())
}
