/*!
 * Tests for chunking and context extraction
 */

use multilingo::translation::chunker::{DEFAULT_CONTEXT_WORDS, chunk, extract_context};

const STORY: &str = "The rain had not stopped for three days. Mara watched the river rise.\n\n\
She packed the boat before dawn! Would the bridge hold? Nobody in the village knew.\r\n\r\n\
By noon the water reached the mill and the old miller finally agreed to leave his house behind.";

/// Text that fits is returned untouched, whitespace included
#[test]
fn test_chunk_withShortText_shouldReturnInputExactly() {
    let text = "  Hello, world!  \n";
    assert_eq!(chunk(text, 100), vec![text.to_string()]);
    assert_eq!(chunk(text, 0), vec![text.to_string()]);
}

/// Paragraph breaks are preferred over sentence ends
#[test]
fn test_chunk_withParagraphs_shouldSplitAtBlankLine() {
    let chunks = chunk("First paragraph text here.\n\nSecond paragraph text here.", 40);

    assert!(chunks.len() >= 2);
    assert!(chunks[0].contains("First paragraph"));
    assert!(chunks.last().unwrap().contains("Second paragraph"));
}

/// Every chunk respects the limit and no token is lost
#[test]
fn test_chunk_withStory_shouldPreserveTokensWithinLimit() {
    for max_chars in [10, 25, 60, 120] {
        let chunks = chunk(STORY, max_chars);
        let joined = chunks.join(" ");

        for piece in &chunks {
            assert!(piece.chars().count() <= max_chars);
            assert!(!piece.is_empty());
            assert_eq!(piece.trim(), piece);
        }
        for token in STORY.split_whitespace() {
            assert!(joined.contains(token), "missing {:?} at {}", token, max_chars);
        }
    }
}

/// Multi-byte text is measured in code points
#[test]
fn test_chunk_withCyrillic_shouldCountCodePoints() {
    let text = "Привіт світ. Як справи? Усе добре.";
    let chunks = chunk(text, 13);

    assert_eq!(chunks[0], "Привіт світ.");
    assert!(chunks.iter().all(|c| c.chars().count() <= 13));
}

/// A word longer than the window is cut hard
#[test]
fn test_chunk_withoutBoundary_shouldHardCut() {
    let chunks = chunk("abcdefghij", 4);
    assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
}

#[test]
fn test_extractContext_shouldKeepTrailingWords() {
    assert_eq!(extract_context("alpha beta gamma delta epsilon", 3), "gamma delta epsilon");
    assert_eq!(extract_context("  alpha beta  ", 3), "alpha beta");
}

#[test]
fn test_extractContext_withZero_shouldUseDefault() {
    let words: Vec<String> = (0..40).map(|i| format!("w{}", i)).collect();
    let context = extract_context(&words.join(" "), 0);

    assert_eq!(context.split_whitespace().count(), DEFAULT_CONTEXT_WORDS);
    assert!(context.ends_with("w39"));
}
