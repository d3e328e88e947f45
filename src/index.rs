//! Embedding / index store: turns chunks into vectors and answers
//! similarity queries over one project's collection.
//!
//! Indexing clears the collection first, so indexing the same chunks twice
//! leaves the same vectors behind as indexing them once. Batches are
//! embedded sequentially and upserted in chunk order; a batch that
//! exhausts its retries aborts the run with
//! [`PipelineError::EmbeddingService`], leaving earlier batches in place.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use repodoc_core::embedding::Embedder;
use repodoc_core::error::{PipelineError, ServiceError};
use repodoc_core::models::{Chunk, RetrievedChunk, VectorMetadata};
use repodoc_core::store::{sort_hits, VectorIndex};

use crate::retry::RetryPolicy;

pub struct IndexStore {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    collection: String,
    batch_size: usize,
    retry: RetryPolicy,
}

/// Deterministic vector id for a chunk: 32 hex chars of
/// `sha256(collection \0 file_path \0 seq)`.
pub fn vector_id(collection: &str, file_path: &str, seq: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(collection.as_bytes());
    hasher.update([0u8]);
    hasher.update(file_path.as_bytes());
    hasher.update([0u8]);
    hasher.update(seq.to_string().as_bytes());
    format!("{:x}", hasher.finalize())[..32].to_string()
}

impl IndexStore {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        collection: impl Into<String>,
        batch_size: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            embedder,
            index,
            collection: collection.into(),
            batch_size: batch_size.max(1),
            retry,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Replace the collection's contents with `chunks`. Returns the number
    /// of vectors written.
    pub async fn index(&self, chunks: &[Chunk]) -> Result<usize, PipelineError> {
        self.index
            .delete(&self.collection)
            .await
            .map_err(|e| PipelineError::embedding_service(format!("failed to clear index: {}", e)))?;

        let total_batches = chunks.len().div_ceil(self.batch_size);
        let mut indexed = 0;

        for (batch_no, batch) in chunks.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embed(&texts).await?;

            for (chunk, vector) in batch.iter().zip(vectors.iter()) {
                let id = vector_id(&self.collection, &chunk.file_path, chunk.seq);
                let metadata = VectorMetadata {
                    chunk: chunk.to_ref(),
                    text: chunk.text.clone(),
                };
                self.index
                    .upsert(&self.collection, &id, vector, &metadata)
                    .await
                    .map_err(|e| {
                        PipelineError::embedding_service(format!(
                            "failed to write vector {}: {}",
                            id, e
                        ))
                    })?;
                indexed += 1;
            }

            tracing::debug!(
                collection = %self.collection,
                batch = batch_no + 1,
                total_batches,
                "batch indexed"
            );
        }

        tracing::info!(
            collection = %self.collection,
            model = self.embedder.model_name(),
            indexed,
            "index rebuilt"
        );
        Ok(indexed)
    }

    /// Top `top_k` chunks most similar to `text`, by descending score with
    /// ties broken by sequence index then path.
    pub async fn query(
        &self,
        text: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, PipelineError> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        let query_vec = vectors.pop().unwrap_or_default();

        let mut hits = self
            .index
            .search(&self.collection, &query_vec, top_k)
            .await
            .map_err(|e| PipelineError::embedding_service(format!("index search failed: {}", e)))?;
        sort_hits(&mut hits);
        hits.truncate(top_k);

        Ok(hits.into_iter().map(RetrievedChunk::from).collect())
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let expected = texts.len();
        let dims = self.embedder.dims();
        self.retry
            .run("embed", || async {
                let vectors = self.embedder.embed(texts).await?;
                if vectors.len() != expected {
                    return Err(ServiceError::permanent(format!(
                        "embedding service returned {} vectors for {} texts",
                        vectors.len(),
                        expected
                    )));
                }
                if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dims) {
                    return Err(ServiceError::permanent(format!(
                        "embedding service returned a {}-dimensional vector at position {}, expected {}",
                        v.len(),
                        i,
                        dims
                    )));
                }
                Ok(vectors)
            })
            .await
            .map_err(|e| PipelineError::embedding_service(e.to_string()))
    }
}
