//! Fixed-size overlapping text chunker.
//!
//! Splits a document's text into spans of at most `max_chars` characters,
//! each starting `max_chars - overlap_chars` characters after the previous
//! one, so neighbouring chunks share `overlap_chars` characters. Lengths are
//! counted in Unicode scalar values; a chunk never splits a code point.
//!
//! The result is a [`Chunks`] iterator. It borrows the text, is finite, and
//! can be restarted by cloning it before iteration.
//!
//! # Example
//!
//! ```rust
//! use pdf_qa::chunk::chunk_text;
//!
//! let chunks: Vec<_> = chunk_text("abcdefghij", 4, 1).collect();
//! let texts: Vec<&str> = chunks.iter().map(|c| c.text).collect();
//! assert_eq!(texts, vec!["abcd", "defg", "ghij"]);
//! ```

/// One span of the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// Position in the chunk sequence, starting at 0.
    pub index: usize,
    /// Character offset of the first character in the source text.
    pub start: usize,
    pub text: &'a str,
}

/// Iterator over the chunks of one text.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    /// Byte offset of every char boundary, plus `text.len()` at the end.
    boundaries: Vec<usize>,
    max_chars: usize,
    step: usize,
    next_start: usize,
    index: usize,
    done: bool,
}

/// Split `text` into overlapping chunks.
///
/// # Panics
///
/// Panics if `max_chars == 0` or `overlap_chars >= max_chars`; config
/// validation rejects both before this is reached.
pub fn chunk_text(text: &str, max_chars: usize, overlap_chars: usize) -> Chunks<'_> {
    assert!(max_chars > 0, "max_chars must be > 0");
    assert!(
        overlap_chars < max_chars,
        "overlap_chars must be smaller than max_chars"
    );

    let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    boundaries.push(text.len());

    Chunks {
        text,
        boundaries,
        max_chars,
        step: max_chars - overlap_chars,
        next_start: 0,
        index: 0,
        done: text.is_empty(),
    }
}

impl<'a> Chunks<'a> {
    fn char_len(&self) -> usize {
        self.boundaries.len() - 1
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Chunk<'a>> {
        if self.done {
            return None;
        }

        let start = self.next_start;
        let end = (start + self.max_chars).min(self.char_len());
        let chunk = Chunk {
            index: self.index,
            start,
            text: &self.text[self.boundaries[start]..self.boundaries[end]],
        };

        if end == self.char_len() {
            self.done = true;
        } else {
            self.next_start = start + self.step;
            self.index += 1;
        }

        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(text: &str, max: usize, overlap: usize) -> Vec<String> {
        chunk_text(text, max, overlap)
            .map(|c| c.text.to_string())
            .collect()
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert_eq!(chunk_text("", 1000, 200).count(), 0);
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks: Vec<_> = chunk_text("Revenue grew 10%.", 1000, 200).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks[0].text, "Revenue grew 10%.");
    }

    #[test]
    fn text_of_exactly_max_len_is_one_chunk() {
        assert_eq!(texts("abcd", 4, 1), vec!["abcd"]);
    }

    #[test]
    fn starts_advance_by_max_minus_overlap() {
        let text: String = std::iter::repeat("0123456789").take(30).collect();
        let chunks: Vec<_> = chunk_text(&text, 100, 20).collect();
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start, pair[0].start + 80);
        }
        for c in &chunks {
            assert!(c.text.chars().count() <= 100);
        }
        let last = chunks.last().unwrap();
        assert_eq!(last.start + last.text.chars().count(), 300);
    }

    #[test]
    fn adjacent_chunks_reconstruct_the_source_span() {
        let text = "The quick brown fox jumps over the lazy dog. Pack my box with five dozen liquor jugs.";
        let total = text.chars().count();
        for max in 2..20 {
            for overlap in 0..max {
                let chunks: Vec<_> = chunk_text(text, max, overlap).collect();
                for pair in chunks.windows(2) {
                    let (a, b) = (&pair[0], &pair[1]);
                    let shared = a.start + a.text.chars().count() - b.start;
                    let joined: String = a
                        .text
                        .chars()
                        .chain(b.text.chars().skip(shared))
                        .collect();
                    let end = b.start + b.text.chars().count();
                    let expected: String = text.chars().skip(a.start).take(end - a.start).collect();
                    assert_eq!(joined, expected, "max={} overlap={}", max, overlap);
                }
                let last = chunks.last().unwrap();
                assert_eq!(last.start + last.text.chars().count(), total);
            }
        }
    }

    #[test]
    fn multibyte_characters_are_never_split() {
        let text = "héllo wörld ünïcödé ✓✓✓";
        let chunks = texts(text, 5, 2);
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.chars().count() <= 5);
        }
        assert_eq!(chunks[0], "héllo");
    }

    #[test]
    fn iteration_is_restartable() {
        let iter = chunk_text("abcdefghij", 4, 1);
        let first: Vec<_> = iter.clone().collect();
        let second: Vec<_> = iter.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn indices_are_contiguous() {
        let text = "x".repeat(2500);
        for (i, c) in chunk_text(&text, 1000, 200).enumerate() {
            assert_eq!(c.index, i);
        }
    }
}
