//! Fixed-size sliding-window chunker.
//!
//! Windows are measured in characters (Unicode scalar values), not bytes,
//! so multi-byte text is never split inside a code point. There is no
//! awareness of words or sentences.

use crate::error::{Error, Result};

/// Text chunk produced by the chunker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Store key, `{document}-chunk-{index}`
    pub id: String,
    /// Zero-based position within the document
    pub index: usize,
    /// Source document name
    pub document: String,
    /// Raw text of the chunk
    pub text: String,
}

impl Chunk {
    pub fn new(document: impl Into<String>, index: usize, text: impl Into<String>) -> Self {
        let document = document.into();
        Self {
            id: chunk_id(&document, index),
            index,
            document,
            text: text.into(),
        }
    }
}

/// Deterministic chunk identity used as the store's primary key.
pub fn chunk_id(document: &str, index: usize) -> String {
    format!("{}-chunk-{}", document, index)
}

/// Sliding-window chunker with character-level overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a new chunker. `overlap` must be smaller than `size`.
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidConfig("chunk size must be positive".into()));
        }
        if overlap >= size {
            return Err(Error::InvalidConfig(format!(
                "chunk overlap ({overlap}) must be smaller than chunk size ({size})"
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Characters each window advances by.
    pub fn step(&self) -> usize {
        self.size - self.overlap
    }

    /// Lazily split text into overlapping windows.
    pub fn split<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks {
            text,
            size: self.size,
            step: self.step(),
            start: 0,
        }
    }

    /// Split a document and tag every window with its id.
    pub fn chunk(&self, text: &str, document: &str) -> Vec<Chunk> {
        self.split(text)
            .enumerate()
            .map(|(index, window)| Chunk::new(document, index, window))
            .collect()
    }
}

/// Iterator over the windows of one text. Cloning restarts from the clone point.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    size: usize,
    step: usize,
    /// Byte offset of the next window
    start: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.start >= self.text.len() {
            return None;
        }

        let start = self.start;
        let rest = &self.text[start..];
        let end = byte_offset_after(rest, self.size).map_or(self.text.len(), |i| start + i);
        self.start = byte_offset_after(rest, self.step).map_or(self.text.len(), |i| start + i);

        Some(&self.text[start..end])
    }
}

impl std::iter::FusedIterator for Chunks<'_> {}

/// Byte offset of the `n`-th character, or `None` when the text is shorter.
fn byte_offset_after(text: &str, n: usize) -> Option<usize> {
    text.char_indices().nth(n).map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Undo chunking by dropping the overlapping prefix of every later window.
    fn rejoin<'a>(windows: impl IntoIterator<Item = &'a str>, overlap: usize) -> String {
        let mut out = String::new();
        for (i, window) in windows.into_iter().enumerate() {
            if i == 0 {
                out.push_str(window);
            } else {
                out.extend(window.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(matches!(Chunker::new(10, 10), Err(Error::InvalidConfig(_))));
        assert!(matches!(Chunker::new(10, 25), Err(Error::InvalidConfig(_))));
        assert!(matches!(Chunker::new(0, 0), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn windows_advance_by_size_minus_overlap() {
        let chunker = Chunker::new(4, 1).unwrap();
        let windows: Vec<&str> = chunker.split("abcdefghij").collect();
        assert_eq!(windows, vec!["abcd", "defg", "ghij", "j"]);
    }

    #[test]
    fn eighteen_hundred_chars_give_three_chunks() {
        let chunker = Chunker::new(1000, 200).unwrap();
        let text = "x".repeat(1800);
        let chunks = chunker.chunk(&text, "faq.md");

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text.len(), 1000);
        assert_eq!(chunks[1].text.len(), 1000);
        assert_eq!(chunks[2].text.len(), 200);
        let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["faq.md-chunk-0", "faq.md-chunk-1", "faq.md-chunk-2"]);
    }

    #[test]
    fn empty_text_yields_nothing() {
        let chunker = Chunker::new(10, 2).unwrap();
        assert_eq!(chunker.split("").count(), 0);
        assert!(chunker.chunk("", "empty.md").is_empty());
    }

    #[test]
    fn short_text_is_one_window_when_shorter_than_step() {
        let chunker = Chunker::new(1000, 200).unwrap();
        let windows: Vec<&str> = chunker.split("hello").collect();
        assert_eq!(windows, vec!["hello"]);
    }

    #[test]
    fn splits_on_char_boundaries() {
        let chunker = Chunker::new(3, 1).unwrap();
        let text = "Привет мир 🎉";
        let windows: Vec<&str> = chunker.split(text).collect();

        assert!(windows.iter().all(|w| w.chars().count() <= 3));
        assert_eq!(rejoin(windows, 1), text);
    }

    #[test]
    fn iterator_is_restartable() {
        let chunker = Chunker::new(5, 2).unwrap();
        let text = "the quick brown fox jumps over the lazy dog";
        let mut windows = chunker.split(text);
        windows.next();
        let resumed = windows.clone();

        assert_eq!(windows.collect::<Vec<_>>(), resumed.collect::<Vec<_>>());
        assert_eq!(
            chunker.split(text).collect::<Vec<_>>(),
            chunker.split(text).collect::<Vec<_>>()
        );
    }

    #[test]
    fn chunk_id_format() {
        assert_eq!(chunk_id("handbook.pdf", 7), "handbook.pdf-chunk-7");
        let chunk = Chunk::new("a.json", 2, "text");
        assert_eq!(chunk.id, "a.json-chunk-2");
        assert_eq!(chunk.document, "a.json");
        assert_eq!(chunk.index, 2);
    }

    proptest! {
        #[test]
        fn rejoining_windows_reconstructs_text(
            text in "\\PC{0,400}",
            size in 1usize..64,
            overlap_seed in 0usize..64,
        ) {
            let overlap = overlap_seed % size;
            let chunker = Chunker::new(size, overlap).unwrap();
            let windows: Vec<&str> = chunker.split(&text).collect();

            prop_assert!(windows.iter().all(|w| w.chars().count() <= size));
            prop_assert_eq!(rejoin(windows, overlap), text);
        }

        #[test]
        fn chunking_is_deterministic(
            text in "[a-z ]{0,300}",
            size in 1usize..50,
            overlap_seed in 0usize..50,
        ) {
            let overlap = overlap_seed % size;
            let chunker = Chunker::new(size, overlap).unwrap();
            prop_assert_eq!(chunker.chunk(&text, "doc"), chunker.chunk(&text, "doc"));
        }
    }
}
