//! PDF text extraction.
//!
//! Turns raw PDF bytes into plain UTF-8 text, page by page. Pages without
//! extractable text (scanned images, blank pages) contribute nothing and are
//! reported back so the caller can log them; only an unparseable document
//! is an error.

use tracing::warn;

use crate::error::ExtractionError;

pub const MIME_PDF: &str = "application/pdf";

/// Result of extracting one PDF.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    /// Concatenated text of every page, in page order.
    pub text: String,
    pub pages: usize,
    /// 1-based numbers of pages that yielded no text.
    pub empty_pages: Vec<usize>,
}

impl ExtractedText {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Extracts text from PDF bytes. `filename` is only used for errors and logs.
pub fn extract_pdf(bytes: &[u8], filename: &str) -> Result<ExtractedText, ExtractionError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| {
        ExtractionError {
            filename: filename.to_string(),
            message: e.to_string(),
        }
    })?;

    let mut text = String::new();
    let mut empty_pages = Vec::new();
    for (i, page_text) in pages.iter().enumerate() {
        if page_text.trim().is_empty() {
            warn!(page = i + 1, filename, "page has no extractable text");
            empty_pages.push(i + 1);
            continue;
        }
        text.push_str(page_text);
    }

    if text.trim().is_empty() {
        warn!(filename, "no text found in document; it may be a scanned image");
    }

    Ok(ExtractedText {
        text,
        pages: pages.len(),
        empty_pages,
    })
}

/// Runs [`extract_pdf`] on the blocking pool. A parser panic becomes an
/// [`ExtractionError`] instead of taking the worker down.
pub async fn extract_pdf_blocking(
    bytes: Vec<u8>,
    filename: String,
) -> Result<ExtractedText, ExtractionError> {
    let name = filename.clone();
    tokio::task::spawn_blocking(move || extract_pdf(&bytes, &filename))
        .await
        .map_err(|e| ExtractionError {
            filename: name,
            message: format!("PDF parser aborted: {}", e),
        })?
}
