//! crates/smartlearn_core/src/chunker.rs
//!
//! Splits page text into overlapping fixed-size segments for embedding.
//!
//! Chunking is page-aware: each page is chunked independently, so a chunk
//! never spans a page boundary and its `source_ref` citation is always
//! exact. The function is pure and deterministic.

use crate::domain::{Chunk, Page};

/// Chunk window settings, in characters.
///
/// Fields are private: every `ChunkConfig` comes through `new` (or
/// `Default`), so `0 <= overlap < chunk_size` holds by construction and the
/// window always advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    chunk_size: usize,
    overlap: usize,
}

/// Raised when a `ChunkConfig` violates `0 <= overlap < chunk_size`.
#[derive(Debug, thiserror::Error)]
pub enum ChunkConfigError {
    #[error("chunk_size must be greater than zero")]
    ZeroChunkSize,
    #[error("overlap ({overlap}) must be smaller than chunk_size ({chunk_size})")]
    OverlapTooLarge { chunk_size: usize, overlap: usize },
}

impl ChunkConfig {
    /// Validates and constructs a chunk configuration.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkConfigError> {
        if chunk_size == 0 {
            return Err(ChunkConfigError::ZeroChunkSize);
        }
        if overlap >= chunk_size {
            return Err(ChunkConfigError::OverlapTooLarge {
                chunk_size,
                overlap,
            });
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

    /// How far the window advances between consecutive chunks.
    fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

impl Default for ChunkConfig {
    /// 1000-character chunks with a 200-character (20%) overlap.
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

/// Splits every page into overlapping chunks tagged with page metadata.
///
/// A page shorter than `chunk_size` yields exactly one chunk equal to the
/// page text; an empty page yields no chunks. `sequence_index` runs across
/// the whole document in page order.
pub fn chunk_pages(pages: &[Page], config: &ChunkConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut sequence_index = 0;

    for page in pages {
        // Windows are measured in chars, not bytes, so multi-byte text
        // never splits inside a code point.
        let chars: Vec<char> = page.text.chars().collect();
        if chars.is_empty() {
            continue;
        }

        let mut start = 0;
        loop {
            let end = (start + config.chunk_size).min(chars.len());
            chunks.push(Chunk {
                page_number: page.page_number,
                source_ref: format!("Page {}", page.page_number),
                text: chars[start..end].iter().collect(),
                sequence_index,
            });
            sequence_index += 1;

            if end == chars.len() {
                break;
            }
            start += config.step();
        }
    }

    chunks
}
