//! In-memory [`VectorIndex`] for tests and one-shot runs.
//!
//! Collections are `HashMap`s behind a `std::sync::RwLock`. Search is
//! brute-force cosine similarity.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{SearchHit, VectorMetadata};

use super::{sort_hits, VectorIndex};

struct StoredVector {
    vector: Vec<f32>,
    metadata: VectorMetadata,
}

#[derive(Default)]
pub struct InMemoryIndex {
    collections: RwLock<HashMap<String, HashMap<String, StoredVector>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        vector: &[f32],
        metadata: &VectorMetadata,
    ) -> Result<()> {
        let mut collections = self.collections.write().unwrap();
        collections.entry(collection.to_string()).or_default().insert(
            id.to_string(),
            StoredVector {
                vector: vector.to_vec(),
                metadata: metadata.clone(),
            },
        );
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let collections = self.collections.read().unwrap();
        let Some(stored) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<SearchHit> = stored
            .iter()
            .map(|(id, sv)| SearchHit {
                id: id.clone(),
                score: cosine_similarity(vector, &sv.vector),
                metadata: sv.metadata.clone(),
            })
            .collect();

        sort_hits(&mut hits);
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete(&self, collection: &str) -> Result<()> {
        self.collections.write().unwrap().remove(collection);
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().unwrap();
        Ok(collections.get(collection).map(|c| c.len()).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkRef;

    fn meta(path: &str, seq: usize) -> VectorMetadata {
        VectorMetadata {
            chunk: ChunkRef {
                file_path: path.to_string(),
                seq,
                start: seq * 10,
                end: seq * 10 + 10,
            },
            text: format!("{}#{}", path, seq),
        }
    }

    #[tokio::test]
    async fn test_search_orders_by_score() {
        let index = InMemoryIndex::new();
        index.upsert("p", "a", &[1.0, 0.0], &meta("a.md", 0)).await.unwrap();
        index.upsert("p", "b", &[0.7, 0.7], &meta("b.md", 0)).await.unwrap();
        index.upsert("p", "c", &[0.0, 1.0], &meta("c.md", 0)).await.unwrap();

        let hits = index.search("p", &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[1].id, "b");
    }

    #[tokio::test]
    async fn test_ties_broken_by_sequence_index() {
        let index = InMemoryIndex::new();
        index.upsert("p", "x3", &[1.0, 1.0], &meta("a.md", 3)).await.unwrap();
        index.upsert("p", "x1", &[1.0, 1.0], &meta("a.md", 1)).await.unwrap();
        index.upsert("p", "x2", &[1.0, 1.0], &meta("a.md", 2)).await.unwrap();

        let hits = index.search("p", &[1.0, 1.0], 10).await.unwrap();
        let seqs: Vec<usize> = hits.iter().map(|h| h.metadata.chunk.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_delete_clears() {
        let index = InMemoryIndex::new();
        index.upsert("p", "a", &[1.0], &meta("a.md", 0)).await.unwrap();
        index.upsert("p", "a", &[1.0], &meta("a.md", 0)).await.unwrap();
        index.upsert("q", "a", &[1.0], &meta("a.md", 0)).await.unwrap();
        assert_eq!(index.count("p").await.unwrap(), 1);

        index.delete("p").await.unwrap();
        assert_eq!(index.count("p").await.unwrap(), 0);
        assert_eq!(index.count("q").await.unwrap(), 1);
        assert!(index.search("p", &[1.0], 5).await.unwrap().is_empty());
        index.delete("missing").await.unwrap();
    }
}
