//! Per-document vector index.
//!
//! A [`DocumentIndex`] holds every chunk of one document together with its
//! embedding and answers "which *k* chunks are closest to this query
//! vector" by brute-force cosine similarity. It is built in one go and
//! never updated in place.

use tracing::debug;

use crate::chunk::Chunk;
use crate::embedding::{cosine_similarity, Embedder};
use crate::error::IndexBuildError;

#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub index: usize,
    pub text: String,
    pub vector: Vec<f32>,
}

/// A chunk returned from [`DocumentIndex::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub index: usize,
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Clone, Default)]
pub struct DocumentIndex {
    chunks: Vec<IndexedChunk>,
}

impl DocumentIndex {
    /// Embed `chunks` in batches of `batch_size` and assemble the index.
    ///
    /// Any failed batch, or a batch returning the wrong number of vectors,
    /// fails the whole build. An empty chunk set builds an empty index
    /// without calling the embedder.
    pub async fn build<'a, I>(
        chunks: I,
        embedder: &dyn Embedder,
        batch_size: usize,
    ) -> Result<Self, IndexBuildError>
    where
        I: IntoIterator<Item = Chunk<'a>>,
    {
        let chunks: Vec<Chunk<'a>> = chunks.into_iter().collect();
        let mut indexed = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.to_string()).collect();
            let vectors = embedder
                .embed(&texts)
                .await
                .map_err(|e| IndexBuildError::Embedding(format!("{:#}", e)))?;

            if vectors.len() != texts.len() {
                return Err(IndexBuildError::CountMismatch {
                    expected: texts.len(),
                    got: vectors.len(),
                });
            }

            for (chunk, (text, vector)) in batch.iter().zip(texts.into_iter().zip(vectors)) {
                indexed.push(IndexedChunk {
                    index: chunk.index,
                    text,
                    vector,
                });
            }
            debug!(embedded = indexed.len(), total = chunks.len(), "embedded batch");
        }

        Ok(Self { chunks: indexed })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The `k` chunks most similar to `query`, best first. Equal scores keep
    /// document order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<ScoredChunk> = self
            .chunks
            .iter()
            .map(|c| ScoredChunk {
                index: c.index,
                text: c.text.clone(),
                score: cosine_similarity(query, &c.vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.index.cmp(&b.index))
        });
        scored.truncate(k);
        scored
    }
}
