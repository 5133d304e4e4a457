//! Fixed-size chunking of text into copy-sized blocks.

use serde::{Deserialize, Serialize};

use crate::document::{Document, FragmentKind};

/// Block size used when nothing else is configured.
pub const DEFAULT_CHAR_LIMIT: usize = 4000;

/// Smallest block size a user may choose.
pub const MIN_CHAR_LIMIT: usize = 100;

/// A contiguous slice of a source string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub content: String,
    /// 0-based position in the sequence.
    pub index: usize,
    /// Length in chars.
    pub length: usize,
    pub lines: usize,
}

/// Split `text` into blocks of at most `size` chars.
///
/// Blocks cover the input left to right with no gaps or overlaps; only the
/// last one may be shorter than `size`. Empty and whitespace-only input give
/// no blocks. Callers are expected to pass a positive `size` (see
/// [`clamp_char_limit`]); zero also yields no blocks.
pub fn chunk(text: &str, size: usize) -> Vec<Block> {
    if size == 0 || text.trim().is_empty() {
        return Vec::new();
    }

    let mut blocks = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (offset, _) in text.char_indices() {
        if count == size {
            blocks.push(make_block(&text[start..offset], blocks.len(), count));
            start = offset;
            count = 0;
        }
        count += 1;
    }
    blocks.push(make_block(&text[start..], blocks.len(), count));
    blocks
}

fn make_block(content: &str, index: usize, length: usize) -> Block {
    Block {
        content: content.to_string(),
        index,
        length,
        lines: content.split('\n').count(),
    }
}

pub fn clamp_char_limit(requested: usize) -> usize {
    requested.max(MIN_CHAR_LIMIT)
}

/// Parse a user-typed block size. Anything unparsable counts as zero and is
/// then clamped up to [`MIN_CHAR_LIMIT`].
pub fn parse_char_limit(input: &str) -> usize {
    clamp_char_limit(input.trim().parse::<usize>().unwrap_or(0))
}

/// Blocks for one section of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionBlocks {
    pub kind: FragmentKind,
    pub blocks: Vec<Block>,
}

/// Blocks for the markup, style and script sections, in that order.
pub fn chunk_document(document: &Document, size: usize) -> Vec<SectionBlocks> {
    [FragmentKind::Markup, FragmentKind::Style, FragmentKind::Script]
        .into_iter()
        .map(|kind| SectionBlocks {
            kind,
            blocks: chunk(document.get(kind), size),
        })
        .collect()
}
