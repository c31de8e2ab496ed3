//! Fixed-width sliding window chunking for unstructured text and parse failures.

use crate::chunk::{ChunkDraft, ConcreteType, Language};

use super::{ChunkingConfig, Extractor};

/// Universal fallback extractor.
#[derive(Debug, Clone)]
pub struct BlindExtractor {
    config: ChunkingConfig,
}

impl BlindExtractor {
    #[must_use]
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }
}

impl Extractor for BlindExtractor {
    fn language(&self) -> Language {
        Language::Blind
    }

    fn extract(&self, source: &str) -> Vec<ChunkDraft> {
        windows(source, self.config.chunk_size, self.config.chunk_overlap)
            .into_iter()
            .filter(|w| !w.trim().is_empty())
            .map(|w| ChunkDraft::new(ConcreteType::BlindChunk, w.to_owned()))
            .collect()
    }
}

/// Split `text` into windows of `size` characters where each window starts
/// `overlap` characters before the previous one ended.
///
/// Window bounds are counted in characters so slices never split a UTF-8
/// sequence. The start always advances by at least one character, so the loop
/// terminates even when `overlap >= size`.
#[must_use]
pub fn windows(text: &str, size: usize, overlap: usize) -> Vec<&str> {
    if text.is_empty() || size == 0 {
        return Vec::new();
    }

    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let char_len = bounds.len();
    bounds.push(text.len());

    let mut out = Vec::new();
    let mut start = 0usize;
    while start < char_len {
        let end = start + size;
        out.push(&text[bounds[start]..bounds[end.min(char_len)]]);
        start = end.saturating_sub(overlap).max(start + 1);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_size: usize, chunk_overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size,
            chunk_overlap,
            ..ChunkingConfig::default()
        }
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(windows("", 10, 2).is_empty());
        assert!(BlindExtractor::new(config(10, 2)).extract("").is_empty());
    }

    #[test]
    fn short_text_is_single_window() {
        assert_eq!(windows("hello", 800, 200), vec!["hello"]);
    }

    #[test]
    fn windows_overlap_by_configured_amount() {
        let text = "abcdefghij";
        assert_eq!(windows(text, 4, 1), vec!["abcd", "defg", "ghij", "j"]);
    }

    #[test]
    fn next_start_is_previous_end_minus_overlap() {
        let text: String = "x".repeat(1000);
        let w = windows(&text, 800, 200);
        assert_eq!(w.len(), 2);
        assert_eq!(w[0].len(), 800);
        assert_eq!(w[1].len(), 400);
    }

    #[test]
    fn oversized_overlap_still_terminates() {
        let w = windows("abc", 2, 5);
        assert_eq!(w, vec!["ab", "bc", "c"]);
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        let text = "héllo wörld ünïcode";
        for piece in windows(text, 3, 1) {
            assert!(piece.chars().count() <= 3);
        }
    }

    #[test]
    fn every_char_is_covered() {
        let text = "line one\nline two\nline three\n";
        let w = windows(text, 7, 2);
        let mut covered = 0usize;
        let mut start = 0usize;
        for piece in &w {
            let len = piece.chars().count();
            covered = covered.max(start + len);
            start = (start + 7).saturating_sub(2);
        }
        assert_eq!(covered, text.chars().count());
    }

    #[test]
    fn whitespace_only_windows_are_dropped() {
        let drafts = BlindExtractor::new(config(4, 0)).extract("abcd    efgh");
        let contents: Vec<_> = drafts.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["abcd", "efgh"]);
        assert!(
            drafts
                .iter()
                .all(|d| d.concrete_type == ConcreteType::BlindChunk)
        );
    }
}
