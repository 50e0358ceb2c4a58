//! Overlapping, structure-aware text chunker.
//!
//! Splits cleaned document text into [`Chunk`]s of at most `chunk_size`
//! characters, repeating up to `overlap` characters of context between
//! consecutive chunks. Two strategies share one interface through the
//! [`Chunker`] enum:
//!
//! - **Standard**: recursive splitting over an ordered list of separators
//!   (paragraphs, lines, sentences, commas, spaces, then a character window).
//! - **Section-aware**: detects legal headings first and chunks each section
//!   independently, tagging chunks with their section title.
//!
//! # Algorithm (standard)
//!
//! 1. Pick the first separator that occurs in the text.
//! 2. Split on it, keeping the separator at the end of each piece so the
//!    pieces concatenate back to the original text.
//! 3. Greedily merge pieces up to `chunk_size`. After emitting a chunk, keep
//!    trailing pieces totalling at most `overlap` characters as the start of
//!    the next one.
//! 4. Pieces still larger than `chunk_size` recurse with the finer
//!    separators. The last resort is a fixed window of `chunk_size` chars
//!    advancing by `chunk_size - overlap`.
//! 5. Emitted segments are trimmed; empty ones are dropped.
//!
//! All lengths are measured in characters, not bytes.
//!
//! # Example
//!
//! ```rust
//! use lexchunk::chunk::{Chunker, ChunkerConfig, ChunkStrategy};
//! use serde_json::Map;
//!
//! let chunker = Chunker::new(ChunkStrategy::Standard, ChunkerConfig::default()).unwrap();
//! let chunks = chunker.chunk("The appeal is dismissed.", &Map::new());
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].chunk_index, 0);
//! ```

use std::collections::VecDeque;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::models::Chunk;

/// Separator candidates, coarsest first. `""` means "character window".
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", ", ", " ", ""];

/// Which chunking strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    Standard,
    /// Section-aware chunking for legal documents.
    Legal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub overlap: usize,
    /// Quality floor used by [`Chunker::validate`].
    pub min_chunk_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 175,
            min_chunk_chars: 20,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("chunk_size must be > 0")]
    ZeroChunkSize,
    #[error("overlap ({overlap}) must be smaller than chunk_size ({chunk_size})")]
    OverlapTooLarge { overlap: usize, chunk_size: usize },
}

/// A titled span of text chunked independently of its neighbours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSpan<'a> {
    pub title: String,
    pub text: &'a str,
}

/// A detected heading: `start..end` covers the heading line and the body up
/// to the next heading (or end of text).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub start: usize,
    pub end: usize,
}

/// Recursive character splitter with overlap.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    overlap: usize,
    separators: Vec<&'static str>,
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkError> {
        if chunk_size == 0 {
            return Err(ChunkError::ZeroChunkSize);
        }
        if overlap >= chunk_size {
            return Err(ChunkError::OverlapTooLarge {
                overlap,
                chunk_size,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
            separators: DEFAULT_SEPARATORS.to_vec(),
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into trimmed, non-empty segments of at most `chunk_size` chars.
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut ranges = Vec::new();
        self.split_span(text, 0..text.len(), &self.separators, &mut ranges);
        ranges
            .into_iter()
            .map(|r| text[r].trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    fn split_span(
        &self,
        full: &str,
        span: Range<usize>,
        separators: &[&'static str],
        out: &mut Vec<Range<usize>>,
    ) {
        let text = &full[span.clone()];
        let (separator, finer) = match separators
            .iter()
            .position(|s| s.is_empty() || text.contains(*s))
        {
            Some(i) => (separators[i], &separators[i + 1..]),
            None => ("", &separators[separators.len()..]),
        };

        if separator.is_empty() {
            self.window(full, span, out);
            return;
        }

        let mut pending: Vec<Range<usize>> = Vec::new();
        let mut offset = span.start;
        for piece in text.split_inclusive(separator) {
            let range = offset..offset + piece.len();
            offset += piece.len();

            if piece.chars().count() <= self.chunk_size {
                pending.push(range);
                continue;
            }

            if !pending.is_empty() {
                self.merge(full, &pending, out);
                pending.clear();
            }
            if finer.is_empty() {
                self.window(full, range, out);
            } else {
                self.split_span(full, range, finer, out);
            }
        }

        if !pending.is_empty() {
            self.merge(full, &pending, out);
        }
    }

    /// Greedy merge of contiguous pieces, carrying up to `overlap` chars forward.
    fn merge(&self, full: &str, pieces: &[Range<usize>], out: &mut Vec<Range<usize>>) {
        let mut current: VecDeque<(Range<usize>, usize)> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = full[piece.clone()].chars().count();

            if total + len > self.chunk_size {
                if let Some(span) = covering(&current) {
                    out.push(span);
                }
                while total > 0 && (total > self.overlap || total + len > self.chunk_size) {
                    match current.pop_front() {
                        Some((_, popped)) => total -= popped,
                        None => break,
                    }
                }
            }

            current.push_back((piece.clone(), len));
            total += len;
        }

        if let Some(span) = covering(&current) {
            out.push(span);
        }
    }

    /// Fixed character window; the start advances while it is inside the span.
    fn window(&self, full: &str, span: Range<usize>, out: &mut Vec<Range<usize>>) {
        let text = &full[span.clone()];
        let offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        let n = offsets.len();
        let stride = self.chunk_size - self.overlap;

        let mut start = 0;
        while start < n {
            let end = (start + self.chunk_size).min(n);
            let from = span.start + offsets[start];
            let to = if end == n {
                span.end
            } else {
                span.start + offsets[end]
            };
            out.push(from..to);
            start += stride;
        }
    }
}

fn covering(pieces: &VecDeque<(Range<usize>, usize)>) -> Option<Range<usize>> {
    let first = pieces.front()?;
    let last = pieces.back()?;
    Some(first.0.start..last.0.end)
}

/// Legal heading patterns in priority order.
static SECTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Optionally numbered all-caps header: "2. STATEMENT OF FACTS"
        r"(?m)^(?:\d+\.[ \t]+)?([A-Z][A-Z ]{5,}):?[ \t]*$",
        // Roman numeral header: "IV. DISCUSSION"
        r"(?m)^([IVX]+\.[ \t]+[A-Z][A-Z ]{5,})[ \t]*$",
        // Title-case header ending in a colon: "Procedural History:"
        r"(?m)^([A-Z][A-Za-z ]{5,}):[ \t]*$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Scan `text` for legal section headings.
///
/// Where matches from different patterns overlap, the higher-priority
/// pattern wins. Sections are returned in text order; each one ends where
/// the next begins.
pub fn find_sections(text: &str) -> Vec<Section> {
    let mut accepted: Vec<(Range<usize>, String)> = Vec::new();

    for pattern in SECTION_PATTERNS.iter() {
        for caps in pattern.captures_iter(text) {
            let (Some(whole), Some(title)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let span = whole.range();
            let overlaps = accepted
                .iter()
                .any(|(r, _)| span.start < r.end && r.start < span.end);
            if !overlaps {
                accepted.push((span, title.as_str().trim().to_string()));
            }
        }
    }

    accepted.sort_by_key(|(r, _)| r.start);

    let mut sections = Vec::with_capacity(accepted.len());
    for (i, (span, title)) in accepted.iter().enumerate() {
        let end = accepted
            .get(i + 1)
            .map(|(next, _)| next.start)
            .unwrap_or(text.len());
        sections.push(Section {
            title: title.clone(),
            start: span.start,
            end,
        });
    }
    sections
}

/// Chunking strategies behind one contract: `chunk`, `validate`.
#[derive(Debug, Clone)]
pub enum Chunker {
    Standard {
        splitter: RecursiveSplitter,
        min_chunk_chars: usize,
    },
    SectionAware {
        splitter: RecursiveSplitter,
        min_chunk_chars: usize,
    },
}

impl Chunker {
    pub fn new(strategy: ChunkStrategy, config: ChunkerConfig) -> Result<Self, ChunkError> {
        let splitter = RecursiveSplitter::new(config.chunk_size, config.overlap)?;
        let min_chunk_chars = config.min_chunk_chars;
        Ok(match strategy {
            ChunkStrategy::Standard => Chunker::Standard {
                splitter,
                min_chunk_chars,
            },
            ChunkStrategy::Legal => Chunker::SectionAware {
                splitter,
                min_chunk_chars,
            },
        })
    }

    fn splitter(&self) -> &RecursiveSplitter {
        match self {
            Chunker::Standard { splitter, .. } | Chunker::SectionAware { splitter, .. } => splitter,
        }
    }

    fn min_chunk_chars(&self) -> usize {
        match self {
            Chunker::Standard {
                min_chunk_chars, ..
            }
            | Chunker::SectionAware {
                min_chunk_chars, ..
            } => *min_chunk_chars,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.splitter().chunk_size()
    }

    pub fn overlap(&self) -> usize {
        self.splitter().overlap()
    }

    /// Chunk `text`, attaching `metadata` to every chunk.
    ///
    /// Empty or whitespace-only text yields no chunks. Indices are
    /// contiguous from 0 in emission order.
    pub fn chunk(&self, text: &str, metadata: &Map<String, Value>) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        if let Chunker::SectionAware { .. } = self {
            let sections = find_sections(text);
            if sections.len() >= 2 {
                let spans: Vec<SectionSpan<'_>> = sections
                    .iter()
                    .enumerate()
                    .map(|(i, s)| {
                        // Preamble before the first heading belongs to it.
                        let start = if i == 0 { 0 } else { s.start };
                        SectionSpan {
                            title: s.title.clone(),
                            text: &text[start..s.end],
                        }
                    })
                    .collect();
                return self.chunk_sections(&spans, metadata);
            }
        }

        self.splitter()
            .split(text)
            .into_iter()
            .enumerate()
            .map(|(i, segment)| make_chunk(i, segment, None, metadata))
            .collect()
    }

    /// Chunk pre-identified sections, tagging each chunk with its section.
    pub fn chunk_sections(
        &self,
        sections: &[SectionSpan<'_>],
        metadata: &Map<String, Value>,
    ) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for (section_index, section) in sections.iter().enumerate() {
            for segment in self.splitter().split(section.text) {
                let index = chunks.len();
                chunks.push(make_chunk(
                    index,
                    segment,
                    Some((section.title.as_str(), section_index)),
                    metadata,
                ));
            }
        }
        chunks
    }

    /// Quality gate: non-empty list, every chunk at least `min_chunk_chars`
    /// long and structurally consistent.
    pub fn validate(&self, chunks: &[Chunk]) -> bool {
        if chunks.is_empty() {
            return false;
        }
        let floor = self.min_chunk_chars();
        chunks.iter().enumerate().all(|(i, c)| {
            let trimmed = c.text.trim();
            !trimmed.is_empty()
                && trimmed.chars().count() >= floor
                && c.char_count == c.text.chars().count()
                && c.word_count == c.text.split_whitespace().count()
                && c.chunk_index == i
        })
    }
}

fn make_chunk(
    index: usize,
    text: String,
    section: Option<(&str, usize)>,
    metadata: &Map<String, Value>,
) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    let mut metadata = metadata.clone();
    if let Some((title, idx)) = section {
        metadata.insert("section_title".into(), Value::from(title));
        metadata.insert("section_index".into(), Value::from(idx));
        metadata.insert("is_section_derived".into(), Value::from(true));
    }

    Chunk {
        char_count: text.chars().count(),
        word_count: text.split_whitespace().count(),
        chunk_index: index,
        section_title: section.map(|(title, _)| title.to_string()),
        section_index: section.map(|(_, idx)| idx),
        is_section_derived: section.is_some(),
        hash,
        metadata,
        text,
    }
}
