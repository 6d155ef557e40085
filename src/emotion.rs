//! Emotion tag extraction from agent text.
//!
//! Agent output carries inline emotion markers such as `[joy]` or
//! `[sadness]`. Extraction resolves them against the active model's emotion
//! map; stripping removes them from the text surfaced to the renderer.

use std::collections::HashMap;

/// Extract expression IDs for every recognized `[emotion]` tag, in order.
///
/// Scans left to right. On `[`, the text up to the next `]` is looked up
/// (lowercased) in the emotion map; a hit appends the mapped ID and the scan
/// resumes past the closing bracket. Anything else — unterminated brackets,
/// unknown tokens, nested openers — is treated as literal text. Never fails;
/// duplicate tags yield duplicate IDs.
#[must_use]
pub fn extract_emotions(text: &str, emotion_map: &HashMap<String, i64>) -> Vec<i64> {
    let mut ids = Vec::new();
    if emotion_map.is_empty() {
        return ids;
    }

    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '[' {
            if let Some((id, end)) = match_tag(&chars, i, emotion_map) {
                ids.push(id);
                i = end;
                continue;
            }
        }
        i += 1;
    }
    ids
}

/// Remove every recognized `[emotion]` tag, leaving other text untouched.
#[must_use]
pub fn strip_emotion_tags(text: &str, emotion_map: &HashMap<String, i64>) -> String {
    if emotion_map.is_empty() {
        return text.to_owned();
    }

    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '[' {
            if let Some((_, end)) = match_tag(&chars, i, emotion_map) {
                i = end;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Try to match `[token]` starting at `open`. Returns the mapped ID and the
/// index just past the closing bracket.
fn match_tag(
    chars: &[char],
    open: usize,
    emotion_map: &HashMap<String, i64>,
) -> Option<(i64, usize)> {
    let close = chars[open + 1..].iter().position(|c| *c == ']')? + open + 1;
    let token: String = chars[open + 1..close].iter().collect();
    let id = emotion_map.get(&token.to_lowercase())?;
    Some((*id, close + 1))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn map() -> HashMap<String, i64> {
        let mut m = HashMap::new();
        m.insert("neutral".to_owned(), 0);
        m.insert("sadness".to_owned(), 1);
        m.insert("joy".to_owned(), 3);
        m
    }

    #[test]
    fn extracts_tags_in_order() {
        let ids = extract_emotions("Hi there [joy] and [sadness] again", &map());
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn extraction_is_case_insensitive() {
        assert_eq!(extract_emotions("[JOY] [Sadness]", &map()), vec![3, 1]);
    }

    #[test]
    fn duplicates_are_preserved() {
        assert_eq!(extract_emotions("[joy][joy]", &map()), vec![3, 3]);
    }

    #[test]
    fn unknown_and_unterminated_tags_are_literal() {
        assert_eq!(extract_emotions("[confused] text", &map()), Vec::<i64>::new());
        assert_eq!(extract_emotions("broken [joy", &map()), Vec::<i64>::new());
    }

    #[test]
    fn nested_brackets_recover() {
        // The first opener never closes on a known token; the inner one does.
        assert_eq!(extract_emotions("[[joy]", &map()), vec![3]);
        assert_eq!(extract_emotions("[a[joy]b]", &map()), vec![3]);
    }

    #[test]
    fn empty_map_returns_empty() {
        assert_eq!(
            extract_emotions("[joy]", &HashMap::new()),
            Vec::<i64>::new()
        );
    }

    #[test]
    fn only_mapped_values_are_returned() {
        let m = map();
        let ids = extract_emotions("[joy] [neutral] [sadness] [nope]", &m);
        for id in ids {
            assert!(m.values().any(|v| *v == id));
        }
    }

    #[test]
    fn strip_removes_only_recognized_tags() {
        let m = map();
        assert_eq!(strip_emotion_tags("Hi [joy] there", &m), "Hi  there");
        assert_eq!(strip_emotion_tags("[confused] stays", &m), "[confused] stays");
        assert_eq!(strip_emotion_tags("no tags", &m), "no tags");
    }

    #[test]
    fn inserted_tags_round_trip() {
        let m = map();
        let text = "alpha [joy] beta [sadness] gamma";
        assert_eq!(extract_emotions(text, &m), vec![3, 1]);
        assert_eq!(strip_emotion_tags(text, &m), "alpha  beta  gamma");
    }
}
