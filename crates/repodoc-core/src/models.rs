//! Core data models shared by every pipeline stage.
//!
//! These types represent the files, chunks, vectors, and search hits that
//! flow from the loader through the chunker into the vector index and back
//! out to the generation stage.

use serde::{Deserialize, Serialize};

/// A text file read from a repository.
///
/// `path` is relative to the repository root and always uses `/` as the
/// separator, so the same repository yields the same paths on every
/// platform and inside zip archives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
    /// Size on disk in bytes.
    pub size: u64,
}

/// A window of text cut from one source file.
///
/// Offsets are character (Unicode scalar) positions into the file content,
/// half-open: `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub file_path: String,
    /// Position of this chunk within its file, starting at 0.
    pub seq: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

impl Chunk {
    /// Number of characters covered by this chunk.
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }

    pub fn to_ref(&self) -> ChunkRef {
        ChunkRef {
            file_path: self.file_path.clone(),
            seq: self.seq,
            start: self.start,
            end: self.end,
        }
    }
}

/// Lightweight pointer back to a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkRef {
    pub file_path: String,
    pub seq: usize,
    pub start: usize,
    pub end: usize,
}

/// Payload stored next to each vector in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMetadata {
    pub chunk: ChunkRef,
    pub text: String,
}

/// A single result from a vector index search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub score: f32,
    pub metadata: VectorMetadata,
}

/// A retrieved excerpt handed to the generation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk: ChunkRef,
    pub text: String,
    pub score: f32,
}

impl From<SearchHit> for RetrievedChunk {
    fn from(hit: SearchHit) -> Self {
        Self {
            chunk: hit.metadata.chunk,
            text: hit.metadata.text,
            score: hit.score,
        }
    }
}
