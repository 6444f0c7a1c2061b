//! Append-only delta extraction.
//!
//! Given the text already reconciled (the anchor, or the live-typed text)
//! and a fresh backend snapshot, these functions compute the suffix that has
//! not been seen yet. Backends restate, extend, and silently rewrite earlier
//! words; when no structural relationship between old and new text can be
//! established, the answer is an empty delta. Replaying a rewritten
//! transcript as an append would duplicate words in the user's document, so
//! silence always beats duplication.
//!
//! Deltas preserve their leading whitespace from the snapshot: a match that
//! ends at a word boundary yields a delta starting with a space, while a
//! mid-word prefix extension (`"hello wor"` -> `"hello world"`) yields a
//! bare continuation (`"ld"`). The formatter downstream relies on this.

use super::normalize;

/// Word-overlap search window for the lenient (live-typing) variant.
pub const LENIENT_OVERLAP_WINDOW_WORDS: usize = 16;
/// Word-overlap search window for the strict (segment-boundary) variant.
pub const STRICT_OVERLAP_WINDOW_WORDS: usize = 24;
/// Minimum matched words the strict variant accepts.
pub const STRICT_MIN_OVERLAP_WORDS: usize = 2;

/// Lenient append-only delta, used on the live-typing path.
///
/// Tries, in order: exact prefix extension, `previous` as a whole substring
/// of `next` (rightmost match at word boundaries), and word-level overlap
/// between the tail of `previous` and any position in `next`. Returns an
/// empty string when `next` looks like a rewrite rather than an extension.
pub fn compute_append_only_delta(previous: &str, next: &str) -> String {
    let prev = normalize(previous);
    let next = normalize(next);
    if prev.is_empty() {
        return next;
    }
    if next.is_empty() {
        return String::new();
    }

    if let Some(rest) = next.strip_prefix(&prev) {
        return non_blank(rest);
    }

    if let Some(idx) = rfind_at_word_boundary(&next, &prev) {
        return non_blank(&next[idx + prev.len()..]);
    }

    word_overlap_delta(&prev, &next, LENIENT_OVERLAP_WINDOW_WORDS, 1).unwrap_or_default()
}

/// Strict suffix extraction, used for native-backend segment boundaries
/// where a false positive drives irreversible external keystrokes.
///
/// Accepts an exact char-level prefix extension; otherwise requires a
/// word-level overlap of at least [`STRICT_MIN_OVERLAP_WORDS`] words. The
/// lenient variant's whole-substring fallback is deliberately absent.
pub fn extract_strict_suffix(previous: &str, next: &str) -> String {
    let prev = normalize(previous);
    let next = normalize(next);
    if prev.is_empty() {
        return next;
    }
    if next.is_empty() {
        return String::new();
    }

    if let Some(rest) = next.strip_prefix(&prev) {
        return non_blank(rest);
    }

    word_overlap_delta(
        &prev,
        &next,
        STRICT_OVERLAP_WINDOW_WORDS,
        STRICT_MIN_OVERLAP_WORDS,
    )
    .unwrap_or_default()
}

fn non_blank(delta: &str) -> String {
    if delta.trim().is_empty() {
        String::new()
    } else {
        delta.to_string()
    }
}

/// Rightmost occurrence of `needle` in `haystack` that starts and ends at a
/// word boundary. Both strings are normalized (single-space separated).
fn rfind_at_word_boundary(haystack: &str, needle: &str) -> Option<usize> {
    let mut search_end = haystack.len();
    while let Some(idx) = haystack[..search_end].rfind(needle) {
        let before_ok = idx == 0 || haystack.as_bytes()[idx - 1] == b' ';
        let after = idx + needle.len();
        let after_ok = after == haystack.len() || haystack.as_bytes()[after] == b' ';
        if before_ok && after_ok {
            return Some(idx);
        }
        if idx == 0 {
            break;
        }
        search_end = idx;
    }
    None
}

/// Byte spans of the words in a normalized string.
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut offset = 0;
    for word in text.split(' ') {
        spans.push((offset, offset + word.len()));
        offset += word.len() + 1;
    }
    spans
}

/// Longest tail-of-previous / anywhere-in-next word overlap within `window`,
/// preferring the rightmost match at equal length. Returns the remainder of
/// `next` after the match, or `None` when no overlap of at least
/// `min_overlap` words exists.
fn word_overlap_delta(
    prev: &str,
    next: &str,
    window: usize,
    min_overlap: usize,
) -> Option<String> {
    let prev_words: Vec<&str> = prev.split(' ').collect();
    let next_words: Vec<&str> = next.split(' ').collect();
    let spans = word_spans(next);

    let max_overlap = window.min(prev_words.len()).min(next_words.len());
    if max_overlap < min_overlap.max(1) {
        return None;
    }

    for overlap in (min_overlap.max(1)..=max_overlap).rev() {
        let tail = &prev_words[prev_words.len() - overlap..];
        for start in (0..=next_words.len() - overlap).rev() {
            let matches = tail
                .iter()
                .zip(&next_words[start..start + overlap])
                .all(|(a, b)| a.eq_ignore_ascii_case(b));
            if matches {
                let end = spans[start + overlap - 1].1;
                return Some(non_blank(&next[end..]));
            }
        }
    }
    None
}
