//! SQLite-backed [`VectorIndex`].
//!
//! Vectors are stored as little-endian `f32` BLOBs in the `vectors` table,
//! keyed by `(collection, id)`. Search loads the collection and scores
//! every row with cosine similarity in Rust; repositories are small enough
//! that a brute-force scan is fine.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use repodoc_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use repodoc_core::models::{ChunkRef, SearchHit, VectorMetadata};
use repodoc_core::store::{sort_hits, VectorIndex};

pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    /// Wrap a pool whose schema is already migrated.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        vector: &[f32],
        metadata: &VectorMetadata,
    ) -> Result<()> {
        let chunk = &metadata.chunk;
        sqlx::query(
            r#"
            INSERT INTO vectors
                (collection, id, file_path, seq, start_offset, end_offset, text, dims, embedding)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(collection, id) DO UPDATE SET
                file_path = excluded.file_path,
                seq = excluded.seq,
                start_offset = excluded.start_offset,
                end_offset = excluded.end_offset,
                text = excluded.text,
                dims = excluded.dims,
                embedding = excluded.embedding
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(&chunk.file_path)
        .bind(chunk.seq as i64)
        .bind(chunk.start as i64)
        .bind(chunk.end as i64)
        .bind(&metadata.text)
        .bind(vector.len() as i64)
        .bind(vec_to_blob(vector))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let rows = sqlx::query(
            r#"
            SELECT id, file_path, seq, start_offset, end_offset, text, embedding
            FROM vectors
            WHERE collection = ?
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<SearchHit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let seq: i64 = row.get("seq");
                let start: i64 = row.get("start_offset");
                let end: i64 = row.get("end_offset");
                SearchHit {
                    id: row.get("id"),
                    score: cosine_similarity(vector, &blob_to_vec(&blob)),
                    metadata: VectorMetadata {
                        chunk: ChunkRef {
                            file_path: row.get("file_path"),
                            seq: seq as usize,
                            start: start as usize,
                            end: end as usize,
                        },
                        text: row.get("text"),
                    },
                }
            })
            .collect();

        sort_hits(&mut hits);
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete(&self, collection: &str) -> Result<()> {
        sqlx::query("DELETE FROM vectors WHERE collection = ?")
            .bind(collection)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    async fn open(tmp: &TempDir) -> SqliteIndex {
        let mut config = Config::minimal();
        config.db.path = tmp.path().join("data").join("repodoc.sqlite");
        let pool = crate::db::connect(&config).await.unwrap();
        crate::migrate::migrate_pool(&pool).await.unwrap();
        SqliteIndex::new(pool)
    }

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
    async fn test_upsert_search_and_count() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp).await;

        index.upsert("p", "a", &[1.0, 0.0], &meta("a.py", 0)).await.unwrap();
        index.upsert("p", "b", &[0.0, 1.0], &meta("b.py", 0)).await.unwrap();
        index.upsert("p", "c", &[0.7, 0.7], &meta("c.py", 1)).await.unwrap();
        index.upsert("other", "z", &[1.0, 0.0], &meta("z.py", 0)).await.unwrap();

        assert_eq!(index.count("p").await.unwrap(), 3);
        let hits = index.search("p", &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[1].id, "c");
        assert_eq!(hits[1].metadata.chunk.start, 10);
        assert_eq!(hits[1].metadata.text, "c.py#1");
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp).await;

        index.upsert("p", "a", &[1.0, 0.0], &meta("a.py", 0)).await.unwrap();
        index.upsert("p", "a", &[0.0, 1.0], &meta("a.py", 0)).await.unwrap();

        assert_eq!(index.count("p").await.unwrap(), 1);
        let hits = index.search("p", &[0.0, 1.0], 5).await.unwrap();
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_delete_collection_only() {
        let tmp = TempDir::new().unwrap();
        let index = open(&tmp).await;

        index.upsert("p", "a", &[1.0], &meta("a.py", 0)).await.unwrap();
        index.upsert("q", "a", &[1.0], &meta("a.py", 0)).await.unwrap();
        index.delete("p").await.unwrap();
        index.delete("never-created").await.unwrap();

        assert_eq!(index.count("p").await.unwrap(), 0);
        assert_eq!(index.count("q").await.unwrap(), 1);
    }
}
