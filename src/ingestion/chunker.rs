//! Text chunking with sentence-boundary awareness and overlap

use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::types::{Chunk, Locator, TextBlock};

/// Splits normalized blocks into overlapping chunks.
///
/// Chunks are exact byte slices of the block text, so the union of chunk
/// ranges reconstructs the document with no gaps; consecutive chunks within
/// a block share an overlap taken at a sentence or word boundary.
pub struct ChunkSplitter {
    /// Target chunk size in bytes
    chunk_size: usize,
    /// Overlap between consecutive chunks
    overlap: usize,
}

impl ChunkSplitter {
    /// Create a new splitter from configuration
    pub fn new(config: &ChunkingConfig) -> Self {
        let chunk_size = config.chunk_size.max(1);
        Self {
            chunk_size,
            // An overlap as large as the window would stall the window
            overlap: config.chunk_overlap.min(chunk_size / 2),
        }
    }

    /// Split blocks into ordered chunks for one session
    pub fn split(&self, session_id: Uuid, blocks: &[TextBlock]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for block in blocks {
            self.split_block(session_id, block, &mut chunks);
        }

        tracing::debug!(
            session_id = %session_id,
            blocks = blocks.len(),
            chunks = chunks.len(),
            "split document"
        );

        chunks
    }

    /// Sliding window over one block's text
    fn split_block(&self, session_id: Uuid, block: &TextBlock, chunks: &mut Vec<Chunk>) {
        let text = block.text.as_str();
        if text.trim().is_empty() {
            return;
        }

        let mut current = String::new();
        let mut current_start = 0usize;
        let mut pos = 0usize;

        for sentence in text
            .split_sentence_bounds()
            .flat_map(|s| self.bound_sentence(s))
        {
            if !current.is_empty() && current.len() + sentence.len() > self.chunk_size {
                self.emit(session_id, block, &current, current_start, pos, chunks);

                let tail = self.overlap_tail(&current);
                current_start = pos - tail.len();
                current = tail;
            }

            current.push_str(sentence);
            pos += sentence.len();
        }

        if !current.is_empty() {
            self.emit(session_id, block, &current, current_start, pos, chunks);
        }
    }

    /// Record one chunk covering `[start, end)` of the block text
    fn emit(
        &self,
        session_id: Uuid,
        block: &TextBlock,
        text: &str,
        start: usize,
        end: usize,
        chunks: &mut Vec<Chunk>,
    ) {
        let locator = Locator {
            page: block.locator.page,
            section: block.locator.section.clone(),
            char_start: block.locator.char_start + start,
            char_end: block.locator.char_start + end,
        };

        let index = chunks.len() as u32;
        chunks.push(Chunk::new(
            session_id,
            index,
            text.to_string(),
            locator,
            block.block_id,
        ));
    }

    /// Break a sentence longer than the window at word boundaries.
    ///
    /// A single word longer than the window is kept whole rather than cut
    /// mid-word.
    fn bound_sentence<'a>(&self, sentence: &'a str) -> Vec<&'a str> {
        if sentence.len() <= self.chunk_size {
            return vec![sentence];
        }

        let mut pieces = Vec::new();
        let mut start = 0usize;
        let mut len = 0usize;

        for (idx, word) in sentence.split_word_bound_indices() {
            if len > 0 && len + word.len() > self.chunk_size {
                pieces.push(&sentence[start..idx]);
                start = idx;
                len = 0;
            }
            len += word.len();
        }
        if start < sentence.len() {
            pieces.push(&sentence[start..]);
        }

        pieces
    }

    /// Take the overlap from the end of a finished chunk, preferring a
    /// sentence boundary, then a word boundary
    fn overlap_tail(&self, text: &str) -> String {
        if self.overlap == 0 {
            return String::new();
        }
        if text.len() <= self.overlap {
            return text.to_string();
        }

        let mut start = text.len() - self.overlap;
        while start > 0 && !text.is_char_boundary(start) {
            start -= 1;
        }

        let tail = &text[start..];

        if let Some(idx) = tail.find(". ") {
            return tail[idx + 2..].to_string();
        }

        if let Some(idx) = tail.find(' ') {
            return tail[idx + 1..].to_string();
        }

        tail.to_string()
    }
}
