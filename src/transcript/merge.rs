//! Overlapping-chunk merging for the batch (cloud) transcription path.
//!
//! Each cloud poll returns a full-session transcription, but backends
//! frequently restate a trailing clause with minor corrections. Merging by
//! longest suffix/prefix word overlap is what keeps those restatements from
//! landing twice.

/// Longest suffix/prefix overlap considered, in words.
pub const MERGE_OVERLAP_WINDOW_WORDS: usize = 14;

/// Merges two possibly-overlapping transcript snapshots (both already
/// normalized) into the best current estimate of the full utterance.
///
/// If either side is empty the other wins; if one contains the other the
/// superset wins; otherwise the longest case-insensitive suffix-of-existing /
/// prefix-of-incoming word overlap (up to [`MERGE_OVERLAP_WINDOW_WORDS`]) is
/// spliced. No overlap at all falls back to concatenation with a space.
pub fn merge_chunks(existing: &str, incoming: &str) -> String {
    if existing.is_empty() {
        return incoming.to_string();
    }
    if incoming.is_empty() {
        return existing.to_string();
    }

    let existing_lower = existing.to_lowercase();
    let incoming_lower = incoming.to_lowercase();
    if incoming_lower.contains(&existing_lower) {
        return incoming.to_string();
    }
    if existing_lower.contains(&incoming_lower) {
        return existing.to_string();
    }

    let existing_words: Vec<&str> = existing.split(' ').collect();
    let incoming_words: Vec<&str> = incoming.split(' ').collect();
    let max_overlap = MERGE_OVERLAP_WINDOW_WORDS
        .min(existing_words.len())
        .min(incoming_words.len());

    // Longest overlap wins; ties cannot occur since we scan downwards.
    for overlap in (1..=max_overlap).rev() {
        let suffix = &existing_words[existing_words.len() - overlap..];
        let prefix = &incoming_words[..overlap];
        let matches = suffix
            .iter()
            .zip(prefix.iter())
            .all(|(a, b)| a.eq_ignore_ascii_case(b));
        if matches {
            let remainder = incoming_words[overlap..].join(" ");
            if remainder.is_empty() {
                return existing.to_string();
            }
            return format!("{} {}", existing, remainder);
        }
    }

    format!("{} {}", existing, incoming)
}
