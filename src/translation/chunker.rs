/*!
 * Boundary-aware text chunking and sliding-window context.
 *
 * Long texts are split into pieces of at most `max_chars` code points,
 * preferring paragraph breaks, then sentence ends, then word boundaries.
 * `extract_context` takes the trailing words of a translated chunk so the
 * next chunk's request can carry them for continuity.
 */

/// Default number of trailing words carried from one chunk to the next
pub const DEFAULT_CONTEXT_WORDS: usize = 25;

/// Split `text` into chunks of at most `max_chars` code points
///
/// When `max_chars` is 0 or the text already fits, the text is returned
/// unchanged as a single chunk. Otherwise every chunk is trimmed and empty
/// chunks are dropped.
pub fn chunk(text: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 || text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining: Vec<char> = text.chars().collect();

    while remaining.len() > max_chars {
        let split = find_split(&remaining[..max_chars]);

        let piece: String = remaining[..split].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        let rest: String = remaining[split..].iter().collect();
        remaining = rest.trim().chars().collect();
    }

    let last: String = remaining.into_iter().collect();
    let last = last.trim();
    if !last.is_empty() {
        chunks.push(last.to_string());
    }

    chunks
}

/// Find the char index to split at inside a full window
///
/// Only positions after the first character qualify, so every split
/// consumes at least one character.
fn find_split(window: &[char]) -> usize {
    // 1. Paragraph break, consumed with the first piece
    if let Some(idx) = last_index_of(window, &['\n', '\n']).filter(|&i| i > 0) {
        return idx + 2;
    }
    if let Some(idx) = last_index_of(window, &['\r', '\n', '\r', '\n']).filter(|&i| i > 0) {
        return idx + 4;
    }

    // 2. Sentence end followed by whitespace
    for i in (1..window.len().saturating_sub(1)).rev() {
        if matches!(window[i], '.' | '!' | '?') && window[i + 1].is_whitespace() {
            return i + 1;
        }
    }

    // 3. Word boundary
    for i in (1..window.len()).rev() {
        if window[i].is_whitespace() {
            return i;
        }
    }

    // 4. Hard cut
    window.len()
}

fn last_index_of(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Last `word_count` whitespace-separated words of `text`, joined by single spaces
///
/// A `word_count` of 0 means [`DEFAULT_CONTEXT_WORDS`]. Texts with no more
/// words than requested are returned trimmed but otherwise untouched.
pub fn extract_context(text: &str, word_count: usize) -> String {
    let word_count = if word_count == 0 {
        DEFAULT_CONTEXT_WORDS
    } else {
        word_count
    };

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= word_count {
        return text.trim().to_string();
    }

    words[words.len() - word_count..].join(" ")
}
