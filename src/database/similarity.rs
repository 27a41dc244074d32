/*!
 * Text normalization and edit-distance similarity.
 *
 * Cache keys and fuzzy lookups both go through `normalize_text`, so two
 * strings that differ only in Unicode composition or surrounding whitespace
 * map to the same translation memory entry.
 */

use unicode_normalization::UnicodeNormalization;

/// Normalize text for cache keys: canonical composition (NFC) plus trimming
pub fn normalize_text(text: &str) -> String {
    text.nfc().collect::<String>().trim().to_string()
}

/// Levenshtein distance between two strings, measured in Unicode code points
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    // Two-row dynamic programming
    let mut prev_row: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr_row = vec![0; b_chars.len() + 1];

    for (i, a_char) in a_chars.iter().enumerate() {
        curr_row[0] = i + 1;

        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = if a_char == b_char { 0 } else { 1 };
            curr_row[j + 1] = (prev_row[j + 1] + 1)
                .min(curr_row[j] + 1)
                .min(prev_row[j] + cost);
        }

        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b_chars.len()]
}

/// Normalized similarity in `[0, 1]`: `1 - levenshtein / max_len`
///
/// Two equal strings (including two empty strings) score 1.0.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }

    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }

    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

/// Upper bound on similarity given only the two lengths
///
/// Used as a cheap pre-filter: if this is already below the threshold, the
/// real similarity cannot reach it either.
pub fn length_similarity(len_a: usize, len_b: usize) -> f64 {
    let max_len = len_a.max(len_b);
    if max_len == 0 {
        return 1.0;
    }
    1.0 - len_a.abs_diff(len_b) as f64 / max_len as f64
}
