#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use pdf_qa::app::App;
use pdf_qa::completion::{Completer, DisabledCompleter, Prompt};
use pdf_qa::config::Config;
use pdf_qa::embedding::Embedder;
use pdf_qa::store::SqliteStore;
use pdf_qa::{db, files, migrate};

// ─── Test PDFs ──────────────────────────────────────────────────────

/// A PDF with one page per entry; `None` pages have an empty content stream.
pub fn pdf_with_pages(pages: &[Option<&str>]) -> Vec<u8> {
    let n = pages.len();
    let page_obj = |i: usize| 4 + 2 * i;
    let content_obj = |i: usize| 5 + 2 * i;
    let total = 3 + 2 * n;

    let mut out = Vec::new();
    let mut offsets = vec![0usize; total + 1];
    out.extend_from_slice(b"%PDF-1.4\n");

    offsets[1] = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");

    offsets[2] = out.len();
    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", page_obj(i))).collect();
    out.extend_from_slice(
        format!(
            "2 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
            kids.join(" "),
            n
        )
        .as_bytes(),
    );

    offsets[3] = out.len();
    out.extend_from_slice(
        b"3 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );

    for (i, page) in pages.iter().enumerate() {
        offsets[page_obj(i)] = out.len();
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >> endobj\n",
                page_obj(i),
                content_obj(i)
            )
            .as_bytes(),
        );
        let stream = match page {
            Some(text) => format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", text),
            None => String::new(),
        };
        offsets[content_obj(i)] = out.len();
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                content_obj(i),
                stream.len(),
                stream
            )
            .as_bytes(),
        );
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", total + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets.iter().skip(1) {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            total + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

pub fn report_pdf() -> Vec<u8> {
    pdf_with_pages(&[Some("Revenue grew 10%.")])
}

// ─── Fake model providers ───────────────────────────────────────────

/// Letter-frequency vectors: deterministic, and similar texts score high.
pub struct LetterEmbedder {
    pub calls: AtomicUsize,
}

impl LetterEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for LetterEmbedder {
    fn model_name(&self) -> &str {
        "letters"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; 27];
                for c in t.to_lowercase().chars() {
                    match c {
                        'a'..='z' => v[(c as u8 - b'a') as usize] += 1.0,
                        _ => v[26] += 0.1,
                    }
                }
                v
            })
            .collect())
    }
}

/// Answers by quoting the context section of the prompt it was given.
pub struct QuotingCompleter {
    pub prompts: Mutex<Vec<Prompt>>,
}

impl QuotingCompleter {
    pub fn new() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Completer for QuotingCompleter {
    fn model_name(&self) -> &str {
        "quoting"
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.clone());
        let context = prompt.user.split("---").nth(1).unwrap_or("").trim();
        Ok(format!("According to the document: {}", context))
    }
}

// ─── App and server ─────────────────────────────────────────────────

pub struct TestApp {
    pub tmp: TempDir,
    pub app: Arc<App>,
    pub embedder: Arc<LetterEmbedder>,
    pub completer: Option<Arc<QuotingCompleter>>,
}

async fn build(configure: impl FnOnce(&mut Config), with_model: bool) -> TestApp {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::with_root(tmp.path());
    configure(&mut config);

    let pool = db::connect(&config).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    files::ensure_dirs(&config.storage).await.unwrap();

    let embedder = Arc::new(LetterEmbedder::new());
    let completer = with_model.then(|| Arc::new(QuotingCompleter::new()));
    let completer_dyn: Arc<dyn Completer> = match &completer {
        Some(c) => c.clone() as Arc<dyn Completer>,
        None => Arc::new(DisabledCompleter) as Arc<dyn Completer>,
    };

    let app = App::new(
        config,
        Arc::new(SqliteStore::new(pool)),
        embedder.clone(),
        completer_dyn,
    );
    TestApp {
        tmp,
        app: Arc::new(app),
        embedder,
        completer,
    }
}

/// An app with the fake embedder and quoting completer.
pub async fn app_with_model(configure: impl FnOnce(&mut Config)) -> TestApp {
    build(configure, true).await
}

/// An app whose completion provider is disabled.
pub async fn app_without_model(configure: impl FnOnce(&mut Config)) -> TestApp {
    build(configure, false).await
}

/// Serve `app` on a free local port and return its base URL.
pub async fn spawn_server(app: Arc<App>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        pdf_qa::server::serve_listener(listener, app).await.ok();
    });
    wait_for_server(port).await;
    format!("http://127.0.0.1:{}", port)
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    panic!("Server did not become ready within 5 seconds");
}
