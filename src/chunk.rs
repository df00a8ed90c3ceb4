//! Boundary-aware text chunker with fixed character overlap.
//!
//! Splits document text into segments of at most `max_chars` characters.
//! Consecutive segments share exactly `overlap_chars` characters: each new
//! segment starts `overlap_chars` before the previous one ended, so the
//! original text can be rebuilt with [`stitch`].
//!
//! # Algorithm
//!
//! 1. Whitespace-only input yields no segments.
//! 2. If the remaining text fits in `max_chars`, emit it and stop.
//! 3. Otherwise look for the last boundary inside the window, in order of
//!    preference: paragraph (`\n\n`), line (`\n`), sentence (`. `), word (` `).
//!    A boundary is first searched in the back half of the window, then
//!    anywhere past the overlap.
//! 4. With no boundary, hard-cut at `max_chars`.
//! 5. Step back `overlap_chars` and repeat.
//!
//! Lengths are counted in `char`s so multibyte text is never cut inside a
//! code point.
//!
//! # Example
//!
//! ```rust
//! use marinereg::chunk::{chunk, stitch};
//!
//! let text = "First paragraph.\n\nSecond paragraph is here.";
//! let chunks = chunk(text, 24, 4).unwrap();
//! assert!(chunks.iter().all(|c| c.chars().count() <= 24));
//! assert_eq!(stitch(&chunks, 4), text);
//! ```

use std::ops::Range;

use crate::error::{Error, Result};

/// Separators tried in order of preference. The cut lands after the separator.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    max_chars: usize,
    overlap_chars: usize,
}

impl Chunker {
    /// Fails with [`Error::Chunking`] unless `0 <= overlap_chars < max_chars`.
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self> {
        if max_chars == 0 {
            return Err(Error::Chunking("max size must be > 0".to_string()));
        }
        if overlap_chars >= max_chars {
            return Err(Error::Chunking(format!(
                "overlap ({}) must be smaller than max size ({})",
                overlap_chars, max_chars
            )));
        }
        Ok(Self {
            max_chars,
            overlap_chars,
        })
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }

    /// Split `text` into owned segments.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.spans(text)
            .into_iter()
            .map(|r| text[r].to_string())
            .collect()
    }

    /// Byte ranges of each segment within `text`.
    pub fn spans(&self, text: &str) -> Vec<Range<usize>> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        // bounds[k] is the byte offset of char k; the final entry is text.len().
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = bounds.len() - 1;

        let mut spans = Vec::new();
        let mut start = 0;
        loop {
            if total - start <= self.max_chars {
                spans.push(bounds[start]..bounds[total]);
                break;
            }
            let hard = start + self.max_chars;
            let end = self.find_break(text, &bounds, start, hard).unwrap_or(hard);
            spans.push(bounds[start]..bounds[end]);
            start = end - self.overlap_chars;
        }
        spans
    }

    /// Char index just past the preferred separator in `(start, hard]`.
    fn find_break(&self, text: &str, bounds: &[usize], start: usize, hard: usize) -> Option<usize> {
        // The cut must advance past the overlap or the next window would not move.
        let min_end = start + self.overlap_chars + 1;
        let half = start + self.max_chars / 2;
        let window = &text[bounds[start]..bounds[hard]];

        for floor in [half.max(min_end), min_end] {
            for sep in SEPARATORS {
                let Some(pos) = window.rfind(sep) else {
                    continue;
                };
                let end_byte = bounds[start] + pos + sep.len();
                if let Ok(end) = bounds.binary_search(&end_byte) {
                    if end >= floor && end <= hard {
                        return Some(end);
                    }
                }
            }
        }
        None
    }
}

/// Split `text` with the given parameters.
pub fn chunk(text: &str, max_chars: usize, overlap_chars: usize) -> Result<Vec<String>> {
    Ok(Chunker::new(max_chars, overlap_chars)?.split(text))
}

/// Rebuild the original text from consecutive segments by dropping the
/// leading `overlap_chars` characters of every segment after the first.
pub fn stitch(chunks: &[String], overlap_chars: usize) -> String {
    let mut out = String::new();
    for (i, c) in chunks.iter().enumerate() {
        if i == 0 {
            out.push_str(c);
        } else {
            out.extend(c.chars().skip(overlap_chars));
        }
    }
    out
}
