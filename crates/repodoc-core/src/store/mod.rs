//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the only way the pipeline talks to a
//! vector store, so backends are interchangeable: [`memory::InMemoryIndex`]
//! for tests, and the SQLite index in the app crate for the CLI.
//!
//! Vectors live in named collections; the pipeline uses one collection
//! per project.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{SearchHit, VectorMetadata};

/// Abstract vector store.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorIndex::upsert) | Insert or replace one vector by id |
/// | [`search`](VectorIndex::search) | Top-k cosine similarity search |
/// | [`delete`](VectorIndex::delete) | Drop a whole collection |
/// | [`count`](VectorIndex::count) | Number of vectors in a collection |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        vector: &[f32],
        metadata: &VectorMetadata,
    ) -> Result<()>;

    /// Returns at most `top_k` hits ordered by descending score. Ties keep
    /// whatever order the backend produces; callers needing a total order
    /// sort again.
    async fn search(&self, collection: &str, vector: &[f32], top_k: usize)
        -> Result<Vec<SearchHit>>;

    /// Deleting a collection that does not exist is not an error.
    async fn delete(&self, collection: &str) -> Result<()>;

    async fn count(&self, collection: &str) -> Result<usize>;
}

/// Order hits by descending score, then ascending chunk sequence index,
/// then file path. Every backend result passes through this before it
/// reaches a caller. NaN scores rank last.
pub fn sort_hits(hits: &mut [SearchHit]) {
    fn rank(score: f32) -> f32 {
        if score.is_nan() {
            f32::NEG_INFINITY
        } else {
            score
        }
    }

    hits.sort_by(|a, b| {
        rank(b.score)
            .total_cmp(&rank(a.score))
            .then_with(|| a.metadata.chunk.seq.cmp(&b.metadata.chunk.seq))
            .then_with(|| a.metadata.chunk.file_path.cmp(&b.metadata.chunk.file_path))
    });
}
