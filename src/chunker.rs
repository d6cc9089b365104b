//! Fixed-window chunking of normalized text.
//!
//! Chunks are the unit of embedding and retrieval: consecutive,
//! non-overlapping windows of whitespace-delimited tokens, rejoined with
//! single spaces. Downstream, the ingestion pipeline assigns each window its
//! 1-based `chunk_index` in iteration order.

/// Default window size in tokens.
pub const DEFAULT_WINDOW_SIZE: usize = 200;

/// Splits `text` into consecutive windows of up to `window_size` tokens.
///
/// The last window may be shorter. Empty input yields an empty iterator,
/// which the ingestion pipeline treats as "nothing to persist", not an
/// error. The sequence is finite, ordered, and restartable — calling again
/// with the same input re-derives the same windows.
///
/// A `window_size` of zero is clamped to one rather than looping forever.
pub fn chunk_text(text: &str, window_size: usize) -> impl Iterator<Item = String> + use<> {
    let tokens: Vec<String> = text.split_whitespace().map(str::to_string).collect();
    let window = window_size.max(1);
    let len = tokens.len();

    (0..len).step_by(window).map(move |start| {
        let end = (start + window).min(len);
        tokens[start..end].join(" ")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert_eq!(chunk_text("", 200).count(), 0);
        assert_eq!(chunk_text("   ", 200).count(), 0);
    }

    #[test]
    fn short_text_is_a_single_window() {
        let chunks: Vec<String> = chunk_text("alpha beta gamma", 200).collect();
        assert_eq!(chunks, vec!["alpha beta gamma".to_string()]);
    }

    #[test]
    fn produces_ceil_l_over_w_windows() {
        let text = words(450);
        let chunks: Vec<String> = chunk_text(&text, 200).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].split_whitespace().count(), 200);
        assert_eq!(chunks[1].split_whitespace().count(), 200);
        assert_eq!(chunks[2].split_whitespace().count(), 50);
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let text = words(400);
        assert_eq!(chunk_text(&text, 200).count(), 2);
    }

    #[test]
    fn rejoining_chunks_reproduces_the_token_sequence() {
        let text = words(123);
        let rejoined = chunk_text(&text, 7).collect::<Vec<_>>().join(" ");
        assert_eq!(rejoined, text);
    }

    #[test]
    fn zero_window_is_clamped() {
        let chunks: Vec<String> = chunk_text("a b c", 0).collect();
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn restartable() {
        let text = words(30);
        let first: Vec<String> = chunk_text(&text, 8).collect();
        let second: Vec<String> = chunk_text(&text, 8).collect();
        assert_eq!(first, second);
    }
}
