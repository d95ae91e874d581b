//! Character-window text chunking with page provenance

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::{Chunk, DocumentId, ParsedDocument};

/// Sliding-window chunker
///
/// Windows are measured in characters, not tokens, so a boundary may fall
/// inside a word. Each window is trimmed and blank windows are dropped.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Window length in characters
    chunk_size: usize,
    /// Characters shared by consecutive windows
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker, rejecting `chunk_size == 0` or `overlap >= chunk_size`
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::configuration("chunk_size must be greater than 0"));
        }
        if overlap >= chunk_size {
            return Err(Error::configuration(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Chunk the text of a single page
    pub fn chunk(&self, page_text: &str, page: u32, doc_id: &DocumentId) -> Result<Vec<Chunk>> {
        if page == 0 {
            return Err(Error::configuration("page numbers start at 1"));
        }

        let chars: Vec<char> = page_text.chars().collect();
        let chunks = self
            .windows(chars.len())
            .into_iter()
            .filter_map(|(start, end)| {
                let window: String = chars[start..end].iter().collect();
                let trimmed = window.trim();
                (!trimmed.is_empty()).then(|| Chunk {
                    text: trimmed.to_string(),
                    page,
                    source_doc_id: doc_id.clone(),
                })
            })
            .collect();

        Ok(chunks)
    }

    /// Chunk every page of a document, in page order
    pub fn process(&self, document: &ParsedDocument, doc_id: &DocumentId) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        for page in &document.pages {
            chunks.extend(self.chunk(&page.text, page.page, doc_id)?);
        }

        tracing::debug!(
            "Chunked {} pages of {} into {} chunks",
            document.page_count(),
            doc_id,
            chunks.len()
        );

        Ok(chunks)
    }

    /// Character ranges of each window over a text of `len` characters
    fn windows(&self, len: usize) -> Vec<(usize, usize)> {
        let step = self.chunk_size - self.overlap;
        (0..len)
            .step_by(step)
            .map(|start| (start, (start + self.chunk_size).min(len)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FileType, PageText};

    fn doc_id() -> DocumentId {
        DocumentId::new("doc-1")
    }

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    /// Deterministic pseudo-random text with spaces and newlines
    fn sample_text(seed: u64, len: usize) -> String {
        let alphabet: Vec<char> = "abcdefgh ij\nklmnop éü".chars().collect();
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                alphabet[((state >> 33) as usize) % alphabet.len()]
            })
            .collect()
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(TextChunker::new(0, 0), Err(Error::Configuration(_))));
        assert!(matches!(TextChunker::new(10, 10), Err(Error::Configuration(_))));
        assert!(matches!(TextChunker::new(10, 11), Err(Error::Configuration(_))));
        assert!(TextChunker::new(10, 9).is_ok());
        assert!(TextChunker::new(1, 0).is_ok());
    }

    #[test]
    fn test_page_zero_rejected() {
        let chunker = TextChunker::new(10, 2).unwrap();
        assert!(matches!(
            chunker.chunk("text", 0, &doc_id()),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_windows_step_and_trim() {
        let chunker = TextChunker::new(10, 5).unwrap();
        let chunks = chunker.chunk("AAAAA BBBBB CCCCC", 1, &doc_id()).unwrap();

        // Window starts 0, 5, 10, 15
        assert_eq!(
            texts(&chunks),
            vec!["AAAAA BBBB", "BBBBB CCC", "B CCCCC", "CC"]
        );
        assert!(chunks.iter().all(|c| c.page == 1 && c.source_doc_id == doc_id()));
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = TextChunker::new(500, 50).unwrap();
        let chunks = chunker.chunk("  short page  \n", 3, &doc_id()).unwrap();
        assert_eq!(texts(&chunks), vec!["short page"]);
        assert_eq!(chunks[0].page, 3);
    }

    #[test]
    fn test_blank_page_yields_nothing() {
        let chunker = TextChunker::new(500, 50).unwrap();
        assert!(chunker.chunk("", 1, &doc_id()).unwrap().is_empty());
        assert!(chunker.chunk(" \n\t  ", 1, &doc_id()).unwrap().is_empty());
    }

    #[test]
    fn test_blank_windows_dropped() {
        let chunker = TextChunker::new(4, 0).unwrap();
        let chunks = chunker.chunk("abcd        efgh", 1, &doc_id()).unwrap();
        assert_eq!(texts(&chunks), vec!["abcd", "efgh"]);
    }

    #[test]
    fn test_multibyte_text_measured_in_chars() {
        let chunker = TextChunker::new(3, 1).unwrap();
        let chunks = chunker.chunk("äöüßéè", 1, &doc_id()).unwrap();
        assert_eq!(texts(&chunks), vec!["äöü", "üßé", "éè"]);
    }

    #[test]
    fn test_windows_cover_text_and_respect_size() {
        for (size, overlap) in [(1, 0), (7, 3), (10, 0), (50, 49), (64, 8)] {
            let chunker = TextChunker::new(size, overlap).unwrap();
            for seed in 0..5u64 {
                let text = sample_text(seed, 137);
                let len = text.chars().count();

                let windows = chunker.windows(len);
                let mut covered = vec![false; len];
                for (start, end) in &windows {
                    assert!(end - start <= size);
                    covered[*start..*end].iter_mut().for_each(|c| *c = true);
                }
                assert!(covered.iter().all(|c| *c), "size={} overlap={}", size, overlap);

                for chunk in chunker.chunk(&text, 1, &doc_id()).unwrap() {
                    assert!(chunk.text.chars().count() <= size);
                    assert!(text.contains(&chunk.text));
                }
            }
        }
    }

    #[test]
    fn test_chunking_is_idempotent() {
        let chunker = TextChunker::new(40, 10).unwrap();
        let text = sample_text(42, 500);
        let first = chunker.chunk(&text, 2, &doc_id()).unwrap();
        let second = chunker.chunk(&text, 2, &doc_id()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_process_keeps_page_order_without_merging() {
        let chunker = TextChunker::new(20, 5).unwrap();
        let document = ParsedDocument {
            file_type: FileType::Pdf,
            pages: vec![
                PageText {
                    page: 1,
                    text: "The sentence starts on page one and".to_string(),
                },
                PageText {
                    page: 2,
                    text: "   ".to_string(),
                },
                PageText {
                    page: 3,
                    text: "ends here.".to_string(),
                },
            ],
            content_hash: String::new(),
        };

        let chunks = chunker.process(&document, &doc_id()).unwrap();
        let pages: Vec<u32> = chunks.iter().map(|c| c.page).collect();

        assert!(pages.windows(2).all(|w| w[0] <= w[1]));
        assert!(!pages.contains(&2));
        assert_eq!(chunks.last().unwrap().text, "ends here.");
        assert_eq!(chunks.last().unwrap().page, 3);
    }
}
