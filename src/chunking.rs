//! Boundary-aware text chunking with configurable overlap.
//!
//! [`split`] cuts a document into bounded spans, preferring paragraph
//! boundaries, then sentence boundaries, then word boundaries, and only
//! cutting inside a word when a single token exceeds the chunk size. Each
//! chunk after the first begins with the trailing `overlap` characters of
//! its predecessor so cross-boundary context survives retrieval.
//!
//! The unit policy (characters vs. tokens) is fixed per deployment through
//! [`ChunkPolicy`]; it is never auto-detected.

use unicode_segmentation::UnicodeSegmentation;

use crate::types::RagError;

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
/// Default window for the token-based policy.
#[cfg(feature = "token-chunking")]
pub const DEFAULT_MAX_TOKENS: usize = 512;

/// Splitting unit policy. One policy per deployment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChunkPolicy {
    /// Character-based windows with character overlap.
    Characters { size: usize, overlap: usize },
    /// Token-based windows with token overlap, using the cl100k tokenizer.
    #[cfg(feature = "token-chunking")]
    Tokens { max_tokens: usize, overlap: usize },
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        ChunkPolicy::Characters {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkPolicy {
    /// Split `text` according to this policy.
    pub fn split(&self, text: &str) -> Result<Vec<String>, RagError> {
        match self {
            ChunkPolicy::Characters { size, overlap } => Ok(split(text, *size, *overlap)),
            #[cfg(feature = "token-chunking")]
            ChunkPolicy::Tokens {
                max_tokens,
                overlap,
            } => split_tokens(text, *max_tokens, *overlap),
        }
    }
}

/// Splits `text` into chunks of at most `chunk_size` characters, each chunk
/// after the first starting with the trailing `overlap` characters of the
/// previous one. Empty or whitespace-only chunks are dropped.
pub fn split(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if chunk_size == 0 || text.is_empty() {
        return Vec::new();
    }
    // Overlap must leave room for forward progress.
    let overlap = overlap.min(chunk_size.saturating_sub(1));

    // Byte offset of every character, plus a tail sentinel, so window
    // arithmetic stays in characters while slicing stays on char boundaries.
    let mut offsets: Vec<usize> = text.char_indices().map(|(idx, _)| idx).collect();
    offsets.push(text.len());
    let total = offsets.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < total {
        let window_end = (start + chunk_size).min(total);
        let end = if window_end == total {
            total
        } else {
            // The cut must land past the overlapped prefix, otherwise the
            // next window would not advance.
            let min_end = start + overlap + 1;
            find_break(text, &offsets, start, window_end, min_end)
        };

        let piece = &text[offsets[start]..offsets[end]];
        if !piece.trim().is_empty() {
            chunks.push(piece.to_string());
        }

        if end == total {
            break;
        }
        start = end - overlap;
    }

    chunks
}

/// Picks the best cut position (in characters) inside `(min_end, window_end]`,
/// preferring paragraph, then sentence, then word boundaries, and falling
/// back to a hard cut at `window_end` when a single token spans the window.
fn find_break(
    text: &str,
    offsets: &[usize],
    start: usize,
    window_end: usize,
    min_end: usize,
) -> usize {
    let window = &text[offsets[start]..offsets[window_end]];

    // Each boundary kind is tried in turn; a kind whose best cut lands
    // inside the overlapped prefix falls through to the next kind rather
    // than forcing a hard cut.
    let candidates = [
        paragraph_break(window),
        sentence_break(window),
        word_break(window),
    ];
    for cut in candidates.into_iter().flatten() {
        let cut_char = start + byte_to_char(window, cut);
        if cut_char >= min_end && cut_char <= window_end {
            return cut_char;
        }
    }

    window_end
}

/// Byte position just after the last paragraph separator in `window`.
fn paragraph_break(window: &str) -> Option<usize> {
    window.rfind("\n\n").map(|pos| pos + 2)
}

/// Byte position just after the last sentence terminator in `window`.
fn sentence_break(window: &str) -> Option<usize> {
    [". ", "! ", "? ", ".\n", "!\n", "?\n", "\n"]
        .iter()
        .filter_map(|sep| window.rfind(sep).map(|pos| pos + sep.len()))
        .max()
}

/// Byte position of the last word boundary in `window` (never index 0).
fn word_break(window: &str) -> Option<usize> {
    window
        .split_word_bound_indices()
        .map(|(idx, _)| idx)
        .filter(|idx| *idx > 0)
        .last()
}

/// Number of characters in `window` before byte position `byte_pos`.
fn byte_to_char(window: &str, byte_pos: usize) -> usize {
    window[..byte_pos].chars().count()
}

/// Token-based splitting: windows of `max_tokens` cl100k tokens with
/// `overlap` tokens carried between consecutive windows.
#[cfg(feature = "token-chunking")]
pub fn split_tokens(
    text: &str,
    max_tokens: usize,
    overlap: usize,
) -> Result<Vec<String>, RagError> {
    if max_tokens == 0 || text.is_empty() {
        return Ok(Vec::new());
    }
    let overlap = overlap.min(max_tokens.saturating_sub(1));

    let bpe = tiktoken_rs::cl100k_base().map_err(|err| RagError::Chunking(err.to_string()))?;
    let tokens = bpe.encode_ordinary(text);
    let total = tokens.len();

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < total {
        let end = (start + max_tokens).min(total);
        let piece = bpe
            .decode(tokens[start..end].to_vec())
            .map_err(|err| RagError::Chunking(err.to_string()))?;
        if !piece.trim().is_empty() {
            chunks.push(piece);
        }
        if end == total {
            break;
        }
        start = end - overlap;
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_free_text_cuts_at_exact_window() {
        // 1500 chars with no break opportunities: hard cut at 1000, then the
        // second chunk restarts 200 chars back for 700 chars total.
        let text = "x".repeat(1500);
        let chunks = split(&text, 1000, 200);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 1000);
        assert_eq!(chunks[1].chars().count(), 700);
    }

    #[test]
    fn consecutive_chunks_share_the_overlap() {
        let text = "x".repeat(1500);
        let chunks = split(&text, 1000, 200);
        assert_eq!(&chunks[0][800..], &chunks[1][..200]);
    }

    #[test]
    fn short_text_yields_single_chunk() {
        let text = "y".repeat(300);
        let chunks = split(&text, 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chars().count(), 300);
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let first = "a".repeat(600);
        let second = "b".repeat(600);
        let text = format!("{first}\n\n{second}");
        let chunks = split(&text, 1000, 100);
        // The cut lands right after the blank line, not mid-paragraph.
        assert!(chunks[0].trim_end().chars().all(|c| c == 'a'));
        assert!(chunks[1].contains(&second));
    }

    #[test]
    fn prefers_sentence_boundaries_over_words() {
        let sentence = "This is a sentence that ends cleanly. ";
        let text = sentence.repeat(40); // ~1560 chars
        let chunks = split(&text, 1000, 100);
        assert!(chunks.len() >= 2);
        // Every cut should land after a terminator, so no chunk starts
        // mid-sentence.
        for chunk in &chunks[1..] {
            let fresh = &chunk[100.min(chunk.len())..];
            assert!(
                fresh.trim_start().starts_with("This") || fresh.is_empty(),
                "chunk continues mid-sentence: {fresh:?}"
            );
        }
    }

    #[test]
    fn whitespace_only_chunks_are_dropped() {
        assert!(split("   \n\n   \t  ", 1000, 200).is_empty());
        assert!(split("", 1000, 200).is_empty());
    }

    #[test]
    fn never_cuts_inside_words_when_avoidable() {
        let words: Vec<String> = (0..200).map(|i| format!("word{i}")).collect();
        let text = words.join(" ");
        let chunks = split(&text, 100, 20);
        for chunk in &chunks {
            // Trailing fragment of each chunk must be a full word from the
            // input, not a truncated one.
            let last = chunk.split_whitespace().last().unwrap();
            assert!(
                words.iter().any(|w| w == last),
                "chunk ends inside a word: {last:?}"
            );
        }
    }

    #[test]
    fn early_paragraph_break_falls_through_to_word_boundaries() {
        // The only paragraph break sits right after the heading, well inside
        // the overlapped prefix of every window. Cuts must still land on
        // word boundaries instead of degenerating to hard cuts.
        let text = format!("Title\n\n{}", "abcd ".repeat(500));
        let chunks = split(&text, 1000, 200);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            let last = chunk.split_whitespace().last().unwrap();
            assert!(
                last == "Title" || last == "abcd",
                "chunk ends inside a word: {last:?}"
            );
        }
    }

    #[test]
    fn oversized_token_is_cut_rather_than_looping() {
        let text = "z".repeat(50);
        let chunks = split(&text, 10, 2);
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }

    #[test]
    fn multibyte_text_stays_on_char_boundaries() {
        let text = "é".repeat(1500);
        let chunks = split(&text, 1000, 200);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 1000);
        assert_eq!(chunks[1].chars().count(), 700);
    }

    #[test]
    fn default_policy_is_character_based() {
        assert_eq!(
            ChunkPolicy::default(),
            ChunkPolicy::Characters {
                size: 1000,
                overlap: 200
            }
        );
    }
}
