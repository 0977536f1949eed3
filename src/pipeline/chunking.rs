//! Recursive character chunking with overlap and page provenance.
//!
//! Pages of one document are joined with blank lines and split on the coarsest separator that
//! occurs in the text: paragraphs, then lines, then sentences, then words, then characters. A
//! piece that is still longer than `chunk_size` is split again with the next finer separator.
//! Small pieces are merged greedily into chunks of at most `chunk_size` characters, and each new
//! chunk starts with the trailing pieces of the previous one (up to `chunk_overlap` characters).
//!
//! Chunks are contiguous spans of the joined document text, so every chunk can be mapped back to
//! the pages it covers.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::loader::Page;

use super::types::ChunkingError;

const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];
const PAGE_JOINER: &str = "\n\n";

/// Where a chunk came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// File name of the source document.
    pub source: String,
    /// First page covered by the chunk.
    pub page_start: u32,
    /// Last page covered by the chunk.
    pub page_end: u32,
}

/// Passage of text that is embedded and retrieved as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable identifier derived from the source and content.
    pub id: String,
    /// Chunk text.
    pub text: String,
    /// Pages the chunk was drawn from.
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
}

/// Prefix table mapping byte offsets on char boundaries to char counts.
struct CharIndex {
    prefix: Vec<usize>,
}

impl CharIndex {
    fn new(text: &str) -> Self {
        let mut prefix = vec![0; text.len() + 1];
        for (count, (offset, ch)) in text.char_indices().enumerate() {
            prefix[offset + 1..=offset + ch.len_utf8()].fill(count + 1);
        }
        Self { prefix }
    }

    fn len(&self, start: usize, end: usize) -> usize {
        self.prefix[end] - self.prefix[start]
    }
}

struct Splitter<'a> {
    text: &'a str,
    chars: CharIndex,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl<'a> Splitter<'a> {
    fn new(text: &'a str, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            text,
            chars: CharIndex::new(text),
            chunk_size,
            chunk_overlap,
        }
    }

    fn run(&self) -> Vec<Span> {
        let mut out = Vec::new();
        self.split(
            Span {
                start: 0,
                end: self.text.len(),
            },
            &SEPARATORS,
            &mut out,
        );
        out
    }

    fn split(&self, span: Span, separators: &[&str], out: &mut Vec<Span>) {
        let segment = &self.text[span.start..span.end];
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || segment.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let finer = separators.get(position + 1..).unwrap_or(&[]);

        let mut fitting = Vec::new();
        for piece in self.pieces(span, separator) {
            if self.chars.len(piece.start, piece.end) <= self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                self.merge(&fitting, out);
                fitting.clear();
            }
            if finer.is_empty() {
                out.push(piece);
            } else {
                self.split(piece, finer, out);
            }
        }
        if !fitting.is_empty() {
            self.merge(&fitting, out);
        }
    }

    /// Split `span` on `separator`, dropping the separator's trailing whitespace and keeping any
    /// punctuation attached to the preceding piece. Whitespace-only pieces are discarded.
    fn pieces(&self, span: Span, separator: &str) -> Vec<Span> {
        let segment = &self.text[span.start..span.end];
        let mut pieces = Vec::new();

        if separator.is_empty() {
            for (offset, ch) in segment.char_indices() {
                if !ch.is_whitespace() {
                    let start = span.start + offset;
                    pieces.push(Span {
                        start,
                        end: start + ch.len_utf8(),
                    });
                }
            }
            return pieces;
        }

        let kept = separator.trim_end().len();
        let mut cursor = 0;
        for (offset, _) in segment.match_indices(separator) {
            pieces.push(Span {
                start: span.start + cursor,
                end: span.start + offset + kept,
            });
            cursor = offset + separator.len();
        }
        pieces.push(Span {
            start: span.start + cursor,
            end: span.end,
        });

        pieces
            .into_iter()
            .filter_map(|piece| self.trimmed(piece))
            .collect()
    }

    fn trimmed(&self, span: Span) -> Option<Span> {
        let segment = &self.text[span.start..span.end];
        let leading = segment.len() - segment.trim_start().len();
        let trailing = segment.len() - segment.trim_end().len();
        if leading == segment.len() {
            return None;
        }
        Some(Span {
            start: span.start + leading,
            end: span.end - trailing,
        })
    }

    fn merge(&self, pieces: &[Span], out: &mut Vec<Span>) {
        let mut window: VecDeque<Span> = VecDeque::new();

        for &piece in pieces {
            let overflows = window
                .front()
                .is_some_and(|first| self.chars.len(first.start, piece.end) > self.chunk_size);
            if overflows {
                out.push(self.window_span(&window));
                while let Some(&front) = window.front() {
                    let retained = self.window_len(&window);
                    let extended = self.chars.len(front.start, piece.end);
                    if retained > self.chunk_overlap || extended > self.chunk_size {
                        window.pop_front();
                    } else {
                        break;
                    }
                }
            }
            window.push_back(piece);
        }

        if !window.is_empty() {
            out.push(self.window_span(&window));
        }
    }

    fn window_len(&self, window: &VecDeque<Span>) -> usize {
        match (window.front(), window.back()) {
            (Some(first), Some(last)) => self.chars.len(first.start, last.end),
            _ => 0,
        }
    }

    fn window_span(&self, window: &VecDeque<Span>) -> Span {
        match (window.front(), window.back()) {
            (Some(first), Some(last)) => Span {
                start: first.start,
                end: last.end,
            },
            _ => Span { start: 0, end: 0 },
        }
    }
}

/// Split raw text into chunk strings.
///
/// Returns an empty vector when the input is blank.
pub fn split_text(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<String>, ChunkingError> {
    validate(chunk_size, chunk_overlap)?;
    let splitter = Splitter::new(text, chunk_size, chunk_overlap);
    Ok(splitter
        .run()
        .into_iter()
        .map(|span| text[span.start..span.end].trim().to_string())
        .filter(|chunk| !chunk.is_empty())
        .collect())
}

/// Split loaded pages into chunks, grouping consecutive pages of the same document.
pub fn chunk_pages(
    pages: &[Page],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<Chunk>, ChunkingError> {
    validate(chunk_size, chunk_overlap)?;
    let mut chunks = Vec::new();

    for document in pages.chunk_by(|a, b| a.source == b.source) {
        let (text, bounds) = join_pages(document);
        let splitter = Splitter::new(&text, chunk_size, chunk_overlap);
        for (ordinal, span) in splitter.run().into_iter().enumerate() {
            let chunk_text = text[span.start..span.end].trim();
            if chunk_text.is_empty() {
                continue;
            }
            let (page_start, page_end) = page_range(&bounds, span);
            let source = document[0].source.clone();
            chunks.push(Chunk {
                id: chunk_id(&source, ordinal, chunk_text),
                text: chunk_text.to_string(),
                provenance: Provenance {
                    source,
                    page_start,
                    page_end,
                },
            });
        }
    }

    tracing::debug!(
        pages = pages.len(),
        chunks = chunks.len(),
        chunk_size,
        chunk_overlap,
        "Chunked pages"
    );
    Ok(chunks)
}

fn validate(chunk_size: usize, chunk_overlap: usize) -> Result<(), ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if chunk_overlap >= chunk_size {
        return Err(ChunkingError::OverlapTooLarge {
            chunk_size,
            chunk_overlap,
        });
    }
    Ok(())
}

/// Join a document's pages and remember each page's byte range in the joined text.
fn join_pages(pages: &[Page]) -> (String, Vec<(Span, u32)>) {
    let mut text = String::new();
    let mut bounds = Vec::with_capacity(pages.len());
    for page in pages {
        if !text.is_empty() {
            text.push_str(PAGE_JOINER);
        }
        let start = text.len();
        text.push_str(&page.text);
        bounds.push((
            Span {
                start,
                end: text.len(),
            },
            page.page,
        ));
    }
    (text, bounds)
}

fn page_range(bounds: &[(Span, u32)], span: Span) -> (u32, u32) {
    let mut covered = bounds
        .iter()
        .filter(|(page, _)| page.start < span.end && span.start < page.end)
        .map(|(_, number)| *number);
    let first = covered.next().unwrap_or(0);
    let last = covered.last().unwrap_or(first);
    (first, last)
}

fn chunk_id(source: &str, ordinal: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update([0]);
    hasher.update(ordinal.to_le_bytes());
    hasher.update([0]);
    hasher.update(text.as_bytes());
    hex::encode(&hasher.finalize()[..16])
}
