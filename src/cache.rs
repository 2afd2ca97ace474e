//! In-memory cache of built document indexes.
//!
//! Each document id maps to a [`OnceCell`]. The first caller for an id runs
//! the build; concurrent callers for the same id wait on that build instead
//! of starting their own. Builds for different ids proceed in parallel. A
//! failed build leaves the cell empty, so the next caller retries.
//!
//! The cache lives for the process; nothing is persisted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::OnceCell;
use tracing::info;

use crate::chunk::chunk_text;
use crate::config::ChunkingConfig;
use crate::embedding::Embedder;
use crate::error::IndexBuildError;
use crate::index::DocumentIndex;

type Slot = Arc<OnceCell<Arc<DocumentIndex>>>;

#[derive(Default)]
pub struct IndexCache {
    slots: Mutex<HashMap<i64, Slot>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<i64, Slot>> {
        // The map holds no invariants a panicking holder could break.
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn slot(&self, document_id: i64) -> Slot {
        self.slots()
            .entry(document_id)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    /// Return the cached index for `document_id`, building it from `text` on
    /// first use.
    pub async fn get_or_build(
        &self,
        document_id: i64,
        text: &str,
        embedder: &dyn Embedder,
        chunking: &ChunkingConfig,
        batch_size: usize,
    ) -> Result<Arc<DocumentIndex>, IndexBuildError> {
        let slot = self.slot(document_id);
        let index = slot
            .get_or_try_init(|| async {
                let chunks = chunk_text(text, chunking.max_chars, chunking.overlap_chars);
                let index = DocumentIndex::build(chunks, embedder, batch_size).await?;
                info!(
                    document_id,
                    chunks = index.len(),
                    model = embedder.model_name(),
                    "built document index"
                );
                Ok::<_, IndexBuildError>(Arc::new(index))
            })
            .await?;
        Ok(index.clone())
    }

    /// The index for `document_id`, if one has been built.
    pub fn get(&self, document_id: i64) -> Option<Arc<DocumentIndex>> {
        self.slots()
            .get(&document_id)
            .and_then(|slot| slot.get().cloned())
    }

    pub fn contains(&self, document_id: i64) -> bool {
        self.get(document_id).is_some()
    }

    /// Drop the entry for `document_id`. A build already in flight finishes
    /// but its result is not kept.
    pub fn invalidate(&self, document_id: i64) {
        self.slots().remove(&document_id);
    }

    pub fn clear(&self) {
        self.slots().clear();
    }

    /// Number of built indexes held.
    pub fn len(&self) -> usize {
        self.slots().values().filter(|s| s.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingEmbedder {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.fail.load(Ordering::SeqCst) {
                bail!("provider unavailable");
            }
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    fn chunking() -> ChunkingConfig {
        ChunkingConfig {
            max_chars: 100,
            overlap_chars: 10,
        }
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_build() {
        let cache = Arc::new(IndexCache::new());
        let embedder = Arc::new(CountingEmbedder::new());
        let text = "Revenue grew 10%.".repeat(5);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let embedder = embedder.clone();
            let text = text.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_build(1, &text, embedder.as_ref(), &chunking(), 64)
                    .await
                    .unwrap()
            }));
        }

        let mut built = Vec::new();
        for h in handles {
            built.push(h.await.unwrap());
        }

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        for index in &built[1..] {
            assert!(Arc::ptr_eq(&built[0], index));
        }
        assert!(cache.contains(1));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn different_documents_build_separately() {
        let cache = IndexCache::new();
        let embedder = CountingEmbedder::new();
        cache
            .get_or_build(1, "first document", &embedder, &chunking(), 64)
            .await
            .unwrap();
        cache
            .get_or_build(2, "second document", &embedder, &chunking(), 64)
            .await
            .unwrap();
        cache
            .get_or_build(1, "first document", &embedder, &chunking(), 64)
            .await
            .unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn failed_build_is_retried_on_next_request() {
        let cache = IndexCache::new();
        let embedder = CountingEmbedder::new();
        embedder.fail.store(true, Ordering::SeqCst);

        let err = cache
            .get_or_build(7, "some text", &embedder, &chunking(), 64)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexBuildError::Embedding(_)));
        assert!(!cache.contains(7));

        embedder.fail.store(false, Ordering::SeqCst);
        let index = cache
            .get_or_build(7, "some text", &embedder, &chunking(), 64)
            .await
            .unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_and_clear_force_rebuild() {
        let cache = IndexCache::new();
        let embedder = CountingEmbedder::new();
        cache
            .get_or_build(1, "text", &embedder, &chunking(), 64)
            .await
            .unwrap();
        cache.invalidate(1);
        assert!(!cache.contains(1));
        cache
            .get_or_build(1, "text", &embedder, &chunking(), 64)
            .await
            .unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);

        cache.clear();
        assert!(cache.is_empty());
    }
}
