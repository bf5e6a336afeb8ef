//! Text preprocessing and chunking for embedding.

use anyhow::bail;

pub const CHUNK_SIZE: usize = 1000;
pub const CHUNK_OVERLAP: usize = 200;

/// Splits text into overlapping windows of at most `chunk_size` characters,
/// stepping `chunk_size - overlap` characters each time. The final window
/// may be shorter. Counts are in characters, not bytes, so multi-byte
/// content never splits mid-codepoint.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> anyhow::Result<Vec<String>> {
    if chunk_size == 0 {
        bail!("chunk_size must be positive");
    }
    if overlap >= chunk_size {
        bail!(
            "overlap ({}) must be smaller than chunk_size ({})",
            overlap,
            chunk_size
        );
    }
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        start += step;
    }
    Ok(chunks)
}

/// Normalizes raw file text the way the analysis prompt expects it:
/// lowercase, whitespace-tokenized, each token stripped of characters
/// outside `[a-z0-9 ]`, empty tokens dropped, joined with single spaces.
pub fn preprocess_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .filter_map(|token| {
            let cleaned: String = token
                .chars()
                .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == ' ')
                .collect();
            if cleaned.is_empty() {
                None
            } else {
                Some(cleaned)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_cover_text_with_exact_overlap() {
        let text: String = std::iter::repeat('x').take(2500).collect();
        let chunks = chunk_text(&text, 1000, 200).unwrap();
        // Starting offsets form the arithmetic sequence 0, 800, 1600, 2400.
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].chars().count(), 1000);
        assert_eq!(chunks[1].chars().count(), 1000);
        assert_eq!(chunks[2].chars().count(), 900);
        assert_eq!(chunks[3].chars().count(), 100);
    }

    #[test]
    fn adjacent_chunks_share_overlap_characters() {
        let text: String = ('a'..='z').cycle().take(1500).collect();
        let chunks = chunk_text(&text, 1000, 200).unwrap();
        let first: Vec<char> = chunks[0].chars().collect();
        let second: Vec<char> = chunks[1].chars().collect();
        assert_eq!(&first[800..], &second[..200]);
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk_text("hello", 1000, 200).unwrap();
        assert_eq!(chunks, vec!["hello".to_string()]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("", 1000, 200).unwrap().is_empty());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        assert!(chunk_text("abc", 100, 100).is_err());
        assert!(chunk_text("abc", 0, 0).is_err());
    }

    #[test]
    fn preprocess_lowercases_and_strips_punctuation() {
        assert_eq!(
            preprocess_text("RUN curl -sSL http://x.io | sh"),
            "run curl ssl httpxio sh"
        );
        assert_eq!(preprocess_text("  \t\n "), "");
    }
}
