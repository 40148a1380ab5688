//! Character-window text splitting with separator-aware boundaries.
//!
//! Documents are cut into segments of at most `chunk_size` characters, with
//! `chunk_overlap` characters repeated between consecutive segments so that
//! context survives the cut. Boundaries prefer the coarsest separator
//! available inside the window (paragraph break, then line break, then
//! sentence period, then comma) and fall back to a hard character cut when
//! no separator fits.

use serde::{Deserialize, Serialize};

use crate::types::SourceOrigin;

/// Separator preference, coarsest first.
pub const SEPARATORS: [&str; 4] = ["\n\n", "\n", ".", ","];

/// A bounded-length piece of source content, the unit indexed and retrieved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source: SourceOrigin,
}

/// Splits raw text into overlapping segments.
///
/// `chunk_overlap >= chunk_size` is caller error: splitting still terminates
/// and produces heavily duplicated output rather than crashing, but no
/// overlap guarantee holds in that regime.
#[derive(Clone, Debug)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Splits one document into segments.
    ///
    /// Every returned segment is at most `chunk_size` characters long, and
    /// (for `chunk_overlap < chunk_size`) each non-final segment shares its
    /// last `chunk_overlap` characters with the start of its successor.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        if total == 0 {
            return Vec::new();
        }
        if total <= self.chunk_size {
            return vec![text.to_string()];
        }

        let mut segments = Vec::new();
        let mut start = 0usize;
        loop {
            let hard_end = (start + self.chunk_size).min(total);
            if hard_end == total {
                segments.push(chars[start..total].iter().collect());
                break;
            }
            let end = self.boundary(&chars, start, hard_end);
            segments.push(chars[start..end].iter().collect());
            start = if end > start + self.chunk_overlap {
                end - self.chunk_overlap
            } else {
                // Degenerate overlap: force forward progress.
                start + 1
            };
        }
        segments
    }

    /// Associates each produced segment with its originating source.
    pub fn split_sources<'a, I>(&self, documents: I) -> Vec<Chunk>
    where
        I: IntoIterator<Item = (&'a str, SourceOrigin)>,
    {
        let mut chunks = Vec::new();
        for (text, source) in documents {
            for segment in self.split(text) {
                chunks.push(Chunk {
                    text: segment,
                    source: source.clone(),
                });
            }
        }
        chunks
    }

    /// Picks the cut position for the window starting at `start`.
    ///
    /// Tries each separator coarsest-first, scanning backwards from
    /// `hard_end` for the latest occurrence that still leaves the segment
    /// longer than the overlap (so the next segment advances past this one).
    /// Falls back to a hard cut at `hard_end`.
    fn boundary(&self, chars: &[char], start: usize, hard_end: usize) -> usize {
        let min_end = start + self.chunk_overlap + 1;
        if min_end > hard_end {
            return hard_end;
        }
        for sep in SEPARATORS {
            let sep_chars: Vec<char> = sep.chars().collect();
            let mut pos = hard_end;
            while pos >= min_end {
                if pos >= sep_chars.len() && chars[pos - sep_chars.len()..pos] == sep_chars[..] {
                    return pos;
                }
                pos -= 1;
            }
        }
        hard_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn overlap_holds(segments: &[String], overlap: usize) -> bool {
        segments.windows(2).all(|pair| {
            let prev: Vec<char> = pair[0].chars().collect();
            let next: Vec<char> = pair[1].chars().collect();
            prev.len() >= overlap
                && next.len() >= overlap
                && prev[prev.len() - overlap..] == next[..overlap]
        })
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let splitter = TextSplitter::new(100, 10);
        assert_eq!(splitter.split("short"), vec!["short".to_string()]);
    }

    #[test]
    fn empty_text_produces_no_chunks() {
        let splitter = TextSplitter::new(100, 10);
        assert!(splitter.split("").is_empty());
    }

    #[test]
    fn segments_respect_size_and_overlap() {
        let text = "The first sentence sets things up. The second adds detail, \
                    and keeps going. The third wraps up.\n\nA new paragraph starts \
                    here and continues with more material to split across windows."
            .repeat(4);
        let splitter = TextSplitter::new(80, 20);
        let segments = splitter.split(&text);
        assert!(segments.len() > 1);
        assert!(segments.iter().all(|s| s.chars().count() <= 80));
        assert!(overlap_holds(&segments, 20));
    }

    #[test]
    fn prefers_paragraph_breaks_over_finer_separators() {
        let text = format!("{}\n\n{}", "a".repeat(60), "b".repeat(60));
        let splitter = TextSplitter::new(80, 0);
        let segments = splitter.split(&text);
        // First cut lands right after the paragraph break, not mid-run.
        assert!(segments[0].ends_with("\n\n"));
    }

    #[test]
    fn falls_back_to_sentence_breaks() {
        let text = format!("{}. {}", "a".repeat(50), "b".repeat(60));
        let splitter = TextSplitter::new(80, 0);
        let segments = splitter.split(&text);
        assert!(segments[0].ends_with('.'));
    }

    #[test]
    fn hard_cut_when_no_separator_in_window() {
        let text = "x".repeat(250);
        let splitter = TextSplitter::new(100, 10);
        let segments = splitter.split(&text);
        assert!(segments.iter().all(|s| s.chars().count() <= 100));
        assert!(overlap_holds(&segments, 10));
        // Every character of the input is covered.
        let rebuilt: usize = segments
            .iter()
            .enumerate()
            .map(|(i, s)| s.chars().count() - if i == 0 { 0 } else { 10 })
            .sum();
        assert_eq!(rebuilt, 250);
    }

    #[test]
    fn degenerate_overlap_still_terminates() {
        let text = "word ".repeat(100);
        let splitter = TextSplitter::new(20, 30);
        let segments = splitter.split(&text);
        assert!(!segments.is_empty());
        assert!(segments.iter().all(|s| s.chars().count() <= 20));
    }

    #[test]
    fn split_sources_keeps_back_references() {
        let splitter = TextSplitter::new(50, 5);
        let url = Url::parse("https://example.com/doc").unwrap();
        let origin = SourceOrigin::Url(url);
        let text = "sentence one. sentence two. sentence three. sentence four. sentence five.";
        let chunks = splitter.split_sources([(text, origin.clone())]);
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.source == origin));
    }
}
