use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::Document;

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Malformed chunking configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    OverlapTooLarge { chunk_size: usize, overlap: usize },
}

/// Window width and overlap, both counted in characters.
///
/// Construction guarantees `overlap < chunk_size`, so the window always advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    chunk_size: usize,
    overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        ChunkConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkError> {
        if chunk_size == 0 {
            return Err(ChunkError::ZeroChunkSize);
        }
        if overlap >= chunk_size {
            return Err(ChunkError::OverlapTooLarge {
                chunk_size,
                overlap,
            });
        }
        Ok(ChunkConfig {
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

    /// Distance between the starts of consecutive windows
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// A window of a document's text, carrying the document's metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The text of this window
    pub content: String,
    /// File name of the parent document
    pub source: String,
    /// Page of the parent document
    pub page: u32,
}

/// Split every document into overlapping fixed-size windows
pub fn chunk_documents(documents: &[Document], config: &ChunkConfig) -> Vec<Chunk> {
    let chunks: Vec<Chunk> = documents
        .iter()
        .flat_map(|doc| {
            split_text(&doc.content, config)
                .into_iter()
                .map(move |content| Chunk {
                    content: content.to_string(),
                    source: doc.source.clone(),
                    page: doc.page,
                })
        })
        .collect();

    info!(
        "Split {} documents into {} chunks",
        documents.len(),
        chunks.len()
    );
    chunks
}

/// Slide a `chunk_size`-character window over `text` in steps of `chunk_size - overlap`.
///
/// Windows start at 0, step, 2*step, ... while the start is inside the text, so the
/// result has `ceil(chars / step)` entries and the last ones may be shorter.
pub fn split_text<'a>(text: &'a str, config: &ChunkConfig) -> Vec<&'a str> {
    // Byte offset of every char boundary, plus the end of the string
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;

    (0..char_count)
        .step_by(config.step())
        .map(|start| {
            let end = (start + config.chunk_size).min(char_count);
            &text[boundaries[start]..boundaries[end]]
        })
        .collect()
}
