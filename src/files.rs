//! On-disk storage of uploaded PDFs and their extracted text.
//!
//! Stored names are `{sanitized_base}_{uuid}.{ext}`, so two uploads of the
//! same file never collide and a client-supplied name can never escape the
//! storage directory.

use std::path::{Path, PathBuf};

use tracing::warn;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::StorageError;

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
///
/// Only the final path component of `filename` is kept, and its extension
/// is dropped.
pub fn sanitize_base_name(filename: &str) -> String {
    let last = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename);
    let base = match last.rfind('.') {
        Some(dot) if dot > 0 => &last[..dot],
        _ => last,
    };

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "document".to_string()
    } else {
        cleaned
    }
}

pub fn stored_name(base: &str, id: &Uuid, ext: &str) -> String {
    format!("{}_{}.{}", base, id, ext)
}

/// The pair of paths one upload is written to.
#[derive(Debug, Clone)]
pub struct StoredPaths {
    pub pdf: PathBuf,
    pub text: PathBuf,
}

impl StoredPaths {
    pub fn for_upload(storage: &StorageConfig, original_filename: &str) -> Self {
        let base = sanitize_base_name(original_filename);
        let id = Uuid::new_v4();
        Self {
            pdf: storage.upload_dir.join(stored_name(&base, &id, "pdf")),
            text: storage.text_dir.join(stored_name(&base, &id, "txt")),
        }
    }
}

pub async fn ensure_dirs(storage: &StorageConfig) -> Result<(), StorageError> {
    for dir in [&storage.upload_dir, &storage.text_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| StorageError::file(dir, e))?;
    }
    Ok(())
}

pub async fn write_file(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| StorageError::file(path, e))
}

pub async fn read_text(path: &Path) -> Result<String, StorageError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| StorageError::file(path, e))
}

/// Best-effort delete; a missing file is not an error.
pub async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove file");
        }
    }
}

/// Delete every regular file in the upload and text directories. Returns the
/// number of files removed.
pub async fn clear_dirs(storage: &StorageConfig) -> Result<usize, StorageError> {
    let mut removed = 0;
    for dir in [&storage.upload_dir, &storage.text_dir] {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(StorageError::file(dir, e)),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::file(dir, e))?
        {
            let path = entry.path();
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file {
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|e| StorageError::file(&path, e))?;
                removed += 1;
            }
        }
    }
    Ok(removed)
}

/// Whether both storage directories exist and are directories.
pub fn dirs_ready(storage: &StorageConfig) -> bool {
    storage.upload_dir.is_dir() && storage.text_dir.is_dir()
}
