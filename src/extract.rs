//! Answer extraction from free-form model output.
//!
//! Models answer in prose, in enumerated form, or with a bare letter. A single
//! ordered regex cascade recovers the chosen option; specific cues are tried
//! before the catch-all standalone letter, which is prone to false positives.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::choice::Choice;

/// Patterns in precedence order. Each captures the letter in group 1.
const PATTERNS: &[&str] = &[
    // enumerated marker: "b)"
    r"\b([a-d])\)",
    r"\boption\s+([a-d])\b",
    // "answer: b", "answer - b", "answer b"
    r"answer\s*[:\-]?\s*([a-d])\b",
    r"the correct answer is\s+([a-d])\b",
    r"the correct option is\s+([a-d])\b",
    // last resort
    r"\b([a-d])\b",
];

static CASCADE: Lazy<Vec<Regex>> = Lazy::new(|| {
    PATTERNS
        .iter()
        .map(|p| Regex::new(p).expect("Invalid answer extraction regex"))
        .collect()
});

/// Recover a single choice letter from model text.
///
/// Absent text is treated as empty. Input is lowercased and trimmed before
/// matching; returns `None` when no pattern matches.
pub fn extract_letter(text: Option<&str>) -> Option<Choice> {
    let normalized = text.unwrap_or("").trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }

    CASCADE.iter().find_map(|re| {
        re.captures(&normalized)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().chars().next())
            .and_then(Choice::from_char)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumerated_marker_wins() {
        assert_eq!(extract_letter(Some("b) EC2")), Some(Choice::B));
        assert_eq!(
            extract_letter(Some("Looking at the choices, d) fits best")),
            Some(Choice::D)
        );
    }

    #[test]
    fn correct_answer_phrase_beats_catch_all() {
        // "a" appears as a standalone word earlier, but only the catch-all would take it.
        let text = "Out of a long list, the correct answer is c";
        assert_eq!(extract_letter(Some(text)), Some(Choice::C));
    }

    #[test]
    fn correct_option_phrase() {
        let text = "Having weighed a few things, the correct option is d";
        assert_eq!(extract_letter(Some(text)), Some(Choice::D));
    }

    #[test]
    fn option_keyword() {
        assert_eq!(
            extract_letter(Some("I would pick Option C here")),
            Some(Choice::C)
        );
    }

    #[test]
    fn empty_and_missing_are_absent() {
        assert_eq!(extract_letter(Some("")), None);
        assert_eq!(extract_letter(Some("   \n")), None);
        assert_eq!(extract_letter(None), None);
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(extract_letter(Some("Answer: B")), Some(Choice::B));
        assert_eq!(extract_letter(Some("answer: b")), Some(Choice::B));
        assert_eq!(extract_letter(Some("ANSWER - a")), Some(Choice::A));
    }

    #[test]
    fn bare_letter_fallback() {
        assert_eq!(extract_letter(Some("  C  ")), Some(Choice::C));
        assert_eq!(extract_letter(Some("b.")), Some(Choice::B));
    }

    #[test]
    fn no_cue_is_absent() {
        assert_eq!(extract_letter(Some("This question is unclear.")), None);
        // letters outside a-d never match
        assert_eq!(extract_letter(Some("e) none of these")), None);
    }

    #[test]
    fn deterministic() {
        let text = "I believe the correct answer is b) EC2";
        let first = extract_letter(Some(text));
        for _ in 0..10 {
            assert_eq!(extract_letter(Some(text)), first);
        }
        assert_eq!(first, Some(Choice::B));
    }
}
