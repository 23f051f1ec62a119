use super::types::Chunk;

/// Splits extracted release text into contiguous fixed-size chunks.
///
/// Break points prefer a paragraph boundary, then a sentence boundary, then
/// whitespace, searched within the last 20% of the window so chunks stay
/// close to the target size. Chunks never overlap; neighbor expansion at
/// retrieval time supplies the surrounding context.
pub struct ReleaseChunker {
    max_chunk_chars: usize,
}

impl ReleaseChunker {
    pub fn new(max_chunk_chars: usize) -> Self {
        Self { max_chunk_chars }
    }

    pub fn chunk(&self, text: &str, source_id: &str) -> Vec<Chunk> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        let mut start = 0;

        while start < trimmed.len() {
            let window_end = ceil_char_boundary(trimmed, (start + self.max_chunk_chars).min(trimmed.len()));
            let break_at = if window_end < trimmed.len() {
                find_break(trimmed, start, window_end, self.max_chunk_chars)
            } else {
                window_end
            };

            let piece = trimmed[start..break_at].trim();
            if !piece.is_empty() {
                pieces.push(piece.to_string());
            }
            start = break_at;
        }

        let total = pieces.len();
        pieces
            .into_iter()
            .enumerate()
            .map(|(index, content)| Chunk::new(content, source_id, index, total))
            .collect()
    }
}

/// Pick a break position in `[start, window_end)`, preferring paragraph,
/// then sentence, then whitespace boundaries in the last fifth of the window.
fn find_break(text: &str, start: usize, window_end: usize, max_chars: usize) -> usize {
    let search_start = ceil_char_boundary(text, start + (max_chars * 4 / 5));
    let tail = &text[search_start..window_end];

    if let Some(pos) = tail.rfind("\n\n") {
        return search_start + pos + 2;
    }
    if let Some(pos) = tail.rfind(". ") {
        return search_start + pos + 2;
    }
    if let Some(pos) = tail.rfind(char::is_whitespace) {
        let boundary = search_start + pos;
        return ceil_char_boundary(text, boundary + 1);
    }
    window_end
}

/// Round an offset up to the next char boundary.
fn ceil_char_boundary(text: &str, mut offset: usize) -> usize {
    while offset < text.len() && !text.is_char_boundary(offset) {
        offset += 1;
    }
    offset.min(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_single_chunk() {
        let chunker = ReleaseChunker::new(1000);
        let chunks = chunker.chunk("Article 1. A short release.", "rel");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].total, 1);
    }

    #[test]
    fn long_text_splits_with_sequential_indices() {
        let text = "Institutions shall publish their capital ratios every quarter. "
            .repeat(60);
        let chunker = ReleaseChunker::new(500);
        let chunks = chunker.chunk(&text, "rel");

        assert!(chunks.len() > 1);
        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.total, total);
            assert!(chunk.content.len() <= 500, "chunk too large: {}", chunk.content.len());
        }
    }

    #[test]
    fn chunks_are_contiguous_without_overlap() {
        let text = "First paragraph about disclosure duties.\n\nSecond paragraph about deadlines. "
            .repeat(30);
        let chunker = ReleaseChunker::new(400);
        let chunks = chunker.chunk(&text, "rel");

        // Concatenating all chunk contents must preserve every word once.
        let rebuilt: String = chunks.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join(" ");
        let original_words = text.split_whitespace().count();
        let rebuilt_words = rebuilt.split_whitespace().count();
        assert_eq!(original_words, rebuilt_words);
    }

    #[test]
    fn prefers_sentence_boundaries() {
        let text = "The capital ratio is disclosed. ".repeat(40);
        let chunker = ReleaseChunker::new(200);
        let chunks = chunker.chunk(&text, "rel");

        assert!(chunks.len() > 1);
        // Sentences are much shorter than the window, so every non-final
        // chunk should break right after one.
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(
                chunk.content.ends_with('.'),
                "chunk did not end at a sentence: ...{:?}",
                &chunk.content[chunk.content.len().saturating_sub(20)..]
            );
        }
    }

    #[test]
    fn empty_text_returns_empty() {
        let chunker = ReleaseChunker::new(1000);
        assert!(chunker.chunk("", "rel").is_empty());
        assert!(chunker.chunk("   \n  ", "rel").is_empty());
    }

    #[test]
    fn multibyte_text_never_splits_inside_char() {
        let text = "Regulação prudencial exige divulgação de índices de capital. ".repeat(40);
        let chunker = ReleaseChunker::new(300);
        let chunks = chunker.chunk(&text, "rel");
        assert!(chunks.len() > 1);
        // Constructing chunks would have panicked on a bad boundary; also
        // verify content is valid by round-tripping through str::chars.
        for chunk in &chunks {
            assert!(chunk.content.chars().count() > 0);
        }
    }
}
