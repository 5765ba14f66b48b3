//! Page-aware paragraph chunker with overlap.
//!
//! Splits the pages of a loaded document into [`RetrievalUnit`]s. Splitting
//! is a pure function of the page texts and the two size parameters, so the
//! same content always produces the same ordered units and therefore the
//! same unit identities.
//!
//! # Algorithm
//!
//! For each page, independently:
//!
//! 1. Split on `\n\n` paragraph boundaries, dropping blank paragraphs.
//! 2. Hard-split any paragraph longer than `chunk_size` at the last newline
//!    or space before the limit (snapped to a UTF-8 char boundary).
//! 3. Pack pieces greedily into units of at most `chunk_size` bytes.
//! 4. After a unit is flushed, the next one starts with the flushed unit's
//!    trailing `chunk_overlap` bytes (moved forward to a word boundary),
//!    as long as that still leaves room for the next piece.
//!
//! Units never span pages. Sequence indices run `0..N` across the whole
//! document.
//!
//! # Example
//!
//! ```rust
//! use docsync_core::chunk::Chunker;
//! use docsync_core::models::PageText;
//!
//! let pages = vec![PageText::paged(0, "First page."), PageText::paged(1, "Second page.")];
//! let units = Chunker::new(800, 150).split("/docs/a.pdf", "abc123", &pages);
//! assert_eq!(units.len(), 2);
//! assert_eq!(units[1].page, Some(1));
//! assert_eq!(units[1].id().as_str(), "abc123:1:1");
//! ```

use crate::models::{PageText, RetrievalUnit};

const PARAGRAPH_SEP: &str = "\n\n";
const CONTINUATION_SEP: &str = " ";

/// Fixed-size splitter. Sizes are measured in bytes of UTF-8 text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    /// `chunk_size` is clamped to at least 1 and `chunk_overlap` to less
    /// than `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split a document's pages into ordered retrieval units.
    pub fn split(
        &self,
        source_path: &str,
        source_hash: &str,
        pages: &[PageText],
    ) -> Vec<RetrievalUnit> {
        let mut units = Vec::new();
        for page in pages {
            for text in self.split_text(&page.text) {
                units.push(RetrievalUnit {
                    text,
                    source_path: source_path.to_string(),
                    page: page.page,
                    source_hash: source_hash.to_string(),
                    sequence_index: units.len(),
                });
            }
        }
        units
    }

    /// Split one page of text. Blank input yields no units.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let mut pieces: Vec<(&str, &str)> = Vec::new();
        for para in text.split(PARAGRAPH_SEP) {
            let trimmed = para.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.len() <= self.chunk_size {
                pieces.push((PARAGRAPH_SEP, trimmed));
                continue;
            }
            for (i, piece) in hard_split(trimmed, self.chunk_size).into_iter().enumerate() {
                let sep = if i == 0 { PARAGRAPH_SEP } else { CONTINUATION_SEP };
                pieces.push((sep, piece));
            }
        }

        let mut chunks = Vec::new();
        let mut buf = String::new();
        // Whether `buf` holds anything beyond text carried over as overlap.
        let mut fresh = false;

        for (sep, piece) in pieces {
            if !buf.is_empty() && buf.len() + sep.len() + piece.len() > self.chunk_size {
                if fresh {
                    let tail = overlap_tail(&buf, self.chunk_overlap).to_string();
                    chunks.push(std::mem::replace(&mut buf, tail));
                }
                if !buf.is_empty() && buf.len() + sep.len() + piece.len() > self.chunk_size {
                    buf.clear();
                }
            }
            if !buf.is_empty() {
                buf.push_str(sep);
            }
            buf.push_str(piece);
            fresh = true;
        }

        if fresh {
            chunks.push(buf);
        }
        chunks
    }
}

/// Split an oversized paragraph into pieces of at most `max` bytes,
/// preferring newline/space boundaries.
fn hard_split(text: &str, max: usize) -> Vec<&str> {
    let mut out = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        if remaining.len() <= max {
            out.push(remaining);
            break;
        }
        let mut limit = snap_to_char_boundary(remaining, max);
        if limit == 0 {
            // A single char wider than `max`: emit it whole.
            limit = remaining
                .char_indices()
                .nth(1)
                .map(|(i, _)| i)
                .unwrap_or(remaining.len());
        }
        let split_at = remaining[..limit]
            .rfind(|c: char| c == '\n' || c == ' ')
            .map(|pos| pos + 1)
            .unwrap_or(limit);
        let (head, tail) = remaining.split_at(split_at);
        let head = head.trim();
        if !head.is_empty() {
            out.push(head);
        }
        remaining = tail.trim_start();
    }
    out
}

/// Trailing `overlap` bytes of `text`, starting at a word boundary.
fn overlap_tail(text: &str, overlap: usize) -> &str {
    if overlap == 0 {
        return "";
    }
    if text.len() <= overlap {
        return text;
    }
    let mut start = text.len() - overlap;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    if !text[..start].ends_with(char::is_whitespace) {
        match text[start..].find(char::is_whitespace) {
            Some(pos) => start += pos,
            None => return "",
        }
    }
    text[start..].trim_start()
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
