//! Sliding-window text chunker.
//!
//! Cuts file content into overlapping windows of `chunk_size` characters
//! for embedding. The window advances by `chunk_size - overlap`
//! characters, so every pair of consecutive chunks shares exactly
//! `overlap` characters. The final window is kept even when it is shorter
//! than `chunk_size`.
//!
//! Sizes and offsets count Unicode scalar values, never bytes, so a window
//! never splits a multi-byte character.
//!
//! # Example
//!
//! ```rust
//! use repodoc_core::chunk::Chunker;
//!
//! let chunker = Chunker::new(500, 50).unwrap();
//! let text = "x".repeat(2000);
//! let chunks: Vec<_> = chunker.windows("big.txt", &text).collect();
//! assert_eq!(chunks.len(), 5);
//! assert_eq!(chunks[1].start, 450);
//! assert_eq!(chunks[4].end, 2000);
//! ```

use sha2::{Digest, Sha256};

use crate::error::{PipelineError, Result};
use crate::models::{Chunk, SourceFile};

/// Validated chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Returns a [`PipelineError::Config`] when `chunk_size` is zero or
    /// `overlap >= chunk_size` (the window would never advance).
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(PipelineError::config("chunk_size must be > 0"));
        }
        if overlap >= chunk_size {
            return Err(PipelineError::config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance in characters between the starts of consecutive windows.
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Lazily iterate the windows of `text`.
    ///
    /// The iterator is `Clone`; a clone taken before iteration replays the
    /// same sequence from the beginning.
    pub fn windows<'a>(&self, file_path: &'a str, text: &'a str) -> Windows<'a> {
        Windows {
            file_path,
            text,
            chunk_size: self.chunk_size,
            step: self.step(),
            byte_pos: 0,
            char_pos: 0,
            seq: 0,
            done: false,
        }
    }

    pub fn chunk_file(&self, file: &SourceFile) -> Vec<Chunk> {
        self.windows(&file.path, &file.content).collect()
    }
}

/// Iterator over the windows of one text. See [`Chunker::windows`].
#[derive(Debug, Clone)]
pub struct Windows<'a> {
    file_path: &'a str,
    text: &'a str,
    chunk_size: usize,
    step: usize,
    byte_pos: usize,
    char_pos: usize,
    seq: usize,
    done: bool,
}

impl Iterator for Windows<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done || self.byte_pos >= self.text.len() {
            self.done = true;
            return None;
        }

        let rest = &self.text[self.byte_pos..];
        let (end_byte, len_chars) = match rest.char_indices().nth(self.chunk_size) {
            Some((offset, _)) => (self.byte_pos + offset, self.chunk_size),
            None => (self.text.len(), rest.chars().count()),
        };

        let chunk = make_chunk(
            self.file_path,
            self.seq,
            self.char_pos,
            self.char_pos + len_chars,
            &self.text[self.byte_pos..end_byte],
        );
        self.seq += 1;

        if end_byte >= self.text.len() {
            self.done = true;
        } else {
            // step < chunk_size, and this window was full, so the next
            // start is always inside the text.
            let advance = rest
                .char_indices()
                .nth(self.step)
                .map(|(offset, _)| offset)
                .unwrap_or(rest.len());
            self.byte_pos += advance;
            self.char_pos += self.step;
        }

        Some(chunk)
    }
}

/// Build a [`Chunk`] with a SHA-256 content hash.
fn make_chunk(file_path: &str, seq: usize, start: usize, end: usize, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        file_path: file_path.to_string(),
        seq,
        start,
        end,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Concatenate chunks, dropping the overlapping prefix of every chunk
    /// after the first.
    fn reconstruct(chunks: &[Chunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, c) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(&c.text);
            } else {
                out.extend(c.text.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_size() {
        assert!(matches!(
            Chunker::new(100, 100),
            Err(PipelineError::Config { .. })
        ));
        assert!(matches!(
            Chunker::new(100, 250),
            Err(PipelineError::Config { .. })
        ));
        assert!(matches!(Chunker::new(0, 0), Err(PipelineError::Config { .. })));
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunker = Chunker::new(10, 2).unwrap();
        assert_eq!(chunker.windows("a.txt", "").count(), 0);
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = Chunker::new(800, 100).unwrap();
        let chunks: Vec<_> = chunker.windows("a.txt", "Hello, world!").collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks[0].end, 13);
        assert_eq!(chunks[0].seq, 0);
    }

    #[test]
    fn test_exact_size_text_single_chunk() {
        let chunker = Chunker::new(10, 3).unwrap();
        let chunks: Vec<_> = chunker.windows("a.txt", "0123456789").collect();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_two_thousand_x_five_windows() {
        let chunker = Chunker::new(500, 50).unwrap();
        let text = "x".repeat(2000);
        let chunks: Vec<_> = chunker.windows("big.txt", &text).collect();

        assert_eq!(chunks.len(), 5);
        let starts: Vec<usize> = chunks.iter().map(|c| c.start).collect();
        assert_eq!(starts, vec![0, 450, 900, 1350, 1800]);
        assert_eq!(chunks[4].char_len(), 200);

        for pair in chunks.windows(2) {
            let suffix: String = pair[0].text.chars().skip(pair[0].char_len() - 50).collect();
            let prefix: String = pair[1].text.chars().take(50).collect();
            assert_eq!(suffix, prefix);
        }
    }

    #[test]
    fn test_reconstruction_and_overlap() {
        let texts = [
            "The quick brown fox jumps over the lazy dog. ".repeat(37),
            "fn main() {\n    println!(\"hi\");\n}\n".repeat(11),
            "┌──┐ héllo wörld ✓ 日本語テキスト ".repeat(23),
            "abc".to_string(),
        ];
        for (size, overlap) in [(7, 0), (16, 5), (64, 63), (100, 10)] {
            let chunker = Chunker::new(size, overlap).unwrap();
            for text in &texts {
                let chunks: Vec<_> = chunker.windows("f", text).collect();
                assert_eq!(&reconstruct(&chunks, overlap), text);

                for c in &chunks {
                    assert!(c.char_len() <= size);
                    assert_eq!(c.text.chars().count(), c.char_len());
                }
                for pair in chunks.windows(2) {
                    assert_eq!(pair[0].end - pair[1].start, overlap);
                    assert!(pair[1].start > pair[0].start);
                }
            }
        }
    }

    #[test]
    fn test_sequence_indices_contiguous() {
        let chunker = Chunker::new(5, 1).unwrap();
        let text = "abcdefghijklmnopqrstuvwxyz";
        for (i, c) in chunker.windows("f", text).enumerate() {
            assert_eq!(c.seq, i);
            assert_eq!(c.file_path, "f");
        }
    }

    #[test]
    fn test_iterator_is_restartable() {
        let chunker = Chunker::new(8, 2).unwrap();
        let text = "restartable iterators replay from the start";
        let windows = chunker.windows("f", text);
        let first: Vec<_> = windows.clone().collect();
        let second: Vec<_> = windows.collect();
        assert_eq!(first, second);
        assert!(first.len() > 1);
    }

    #[test]
    fn test_deterministic_hashes() {
        let chunker = Chunker::new(4, 1).unwrap();
        let a: Vec<_> = chunker.windows("f", "Alpha Beta Gamma").collect();
        let b: Vec<_> = chunker.windows("f", "Alpha Beta Gamma").collect();
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.hash, y.hash);
            assert_eq!(x.hash.len(), 64);
        }
    }
}
