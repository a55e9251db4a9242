//! Fixed-window text chunker.
//!
//! Splits raw document text into overlapping character windows. The split
//! is a pure function of its inputs, so re-chunking the same document
//! yields the same chunks in the same order.

use crate::core::errors::ApiError;

/// A bounded, possibly overlapping slice of source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// The text content.
    pub text: String,
    /// Position of this chunk within the source document, starting at 0.
    pub sequence_index: usize,
    /// Source identifier (file path, URL, "inline", ...).
    pub source: String,
}

/// Split `text` into windows of `chunk_size` characters, each advancing by
/// `chunk_size - overlap`. The final chunk may be shorter than `chunk_size`.
///
/// An `overlap >= chunk_size` would never advance, so it is coerced to 0
/// and logged. Empty or whitespace-only text is rejected rather than
/// silently producing an empty index.
pub fn split(
    text: &str,
    source: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, ApiError> {
    if chunk_size == 0 {
        return Err(ApiError::BadRequest(
            "chunk_size must be greater than zero".to_string(),
        ));
    }

    if text.trim().is_empty() {
        return Err(ApiError::EmptyInput(
            "document is empty or could not be read".to_string(),
        ));
    }

    let overlap = if overlap >= chunk_size {
        tracing::warn!(
            "chunk overlap {} >= chunk size {}, coercing overlap to 0",
            overlap,
            chunk_size
        );
        0
    } else {
        overlap
    };

    // Char-indexed so multi-byte text never splits inside a code point.
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let step = chunk_size - overlap;

    let mut chunks = Vec::new();
    let mut offset = 0;
    while offset < total {
        let end = (offset + chunk_size).min(total);
        chunks.push(Chunk {
            text: chars[offset..end].iter().collect(),
            sequence_index: chunks.len(),
            source: source.to_string(),
        });
        offset += step;
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(chunks: &[Chunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(&chunk.text);
            } else {
                out.extend(chunk.text.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn windows_reconstruct_original_text() {
        let text = "The quick brown fox jumps over the lazy dog, twice.";
        for (size, overlap) in [(10, 0), (10, 3), (7, 6), (50, 10), (1, 0)] {
            let chunks = split(text, "test", size, overlap).unwrap();
            assert_eq!(reconstruct(&chunks, overlap), text, "size={size} overlap={overlap}");
        }
    }

    #[test]
    fn short_text_yields_single_chunk() {
        let chunks = split("tiny", "test", 100, 10).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "tiny");
        assert_eq!(chunks[0].sequence_index, 0);
    }

    #[test]
    fn empty_text_is_rejected() {
        assert!(matches!(
            split("", "test", 10, 0),
            Err(ApiError::EmptyInput(_))
        ));
        assert!(matches!(
            split("   \n\t ", "test", 10, 0),
            Err(ApiError::EmptyInput(_))
        ));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        assert!(matches!(
            split("text", "test", 0, 0),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn excessive_overlap_is_coerced_to_zero() {
        let chunks = split("abcdefghij", "test", 4, 4).unwrap();
        // With overlap coerced to 0 the windows tile the text exactly.
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn sequence_indices_are_contiguous() {
        let chunks = split(&"x".repeat(100), "test", 10, 2).unwrap();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence_index, i);
        }
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text = "こんにちは世界、また会う日まで";
        let chunks = split(text, "test", 5, 2).unwrap();
        assert!(!chunks.is_empty());
        assert_eq!(reconstruct(&chunks, 2), text);
    }
}
