//! Recognizer-noise scrubbing.
//!
//! Applied to every raw backend transcript before reconciliation: removes
//! spoken filler words and discards hypotheses that are nothing but a known
//! recognizer hallucination (short/silent audio makes some models emit
//! sign-off phrases). Runs before [`normalize`](super::normalize), which
//! cleans up the whitespace left behind by removals.

use once_cell::sync::Lazy;
use regex::Regex;

const FILLER_WORDS: &[&str] = &[
    "uh", "um", "uhm", "umm", "uhh", "ah", "eh", "hmm", "hm", "mmm", "mm",
];

static FILLER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    FILLER_WORDS
        .iter()
        .map(|word| Regex::new(&format!(r"(?i)\b{}\b[,.]?", regex::escape(word))).unwrap())
        .collect()
});

/// Phrases that, when they are the entire hypothesis, are recognizer
/// hallucinations rather than speech.
const HALLUCINATION_PHRASES: &[&str] = &[
    "thank you for watching",
    "thanks for watching",
    "thank you for listening",
    "please subscribe",
    "see you next time",
    "bye bye",
    "thank you",
    "thanks",
    "you",
];

fn is_hallucination(text: &str) -> bool {
    let stripped: String = text
        .trim()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    let lowered = stripped.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    !lowered.is_empty() && HALLUCINATION_PHRASES.iter().any(|phrase| lowered == *phrase)
}

/// Removes filler words and returns an empty string for whole-output
/// hallucinations. Whitespace is left ragged; callers normalize afterwards.
pub fn scrub_transcript(text: &str) -> String {
    let mut scrubbed = text.to_string();
    for pattern in FILLER_PATTERNS.iter() {
        scrubbed = pattern.replace_all(&scrubbed, "").to_string();
    }

    if is_hallucination(&scrubbed) {
        return String::new();
    }
    scrubbed
}
