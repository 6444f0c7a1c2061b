//! Joiner synthesis between already-typed text and a new delta.
//!
//! Strictly a formatting layer on top of delta extraction: it never drops
//! content, it only decides whether the boundary needs a synthesized
//! sentence break (`". "`), a single word space, or nothing. Deltas carry
//! their own leading whitespace when they were cut at a word boundary, so
//! insertion here is the exception, not the rule.

/// Prepares `delta` for insertion after `previous`.
///
/// Returns an empty string for whitespace-only deltas. A capitalized delta
/// following unterminated prose gets a synthesized `". "`; a capitalized
/// delta (or one following terminal punctuation) that would otherwise touch
/// the previous word gets a single space. Lowercase continuations are typed
/// verbatim so mid-word suffixes stay glued to their word.
pub fn format_delta(previous: &str, delta: &str) -> String {
    if delta.trim().is_empty() {
        return String::new();
    }
    if previous.is_empty() {
        return delta.trim_start().to_string();
    }

    let prev_last = match previous.chars().next_back() {
        Some(c) => c,
        None => return delta.trim_start().to_string(),
    };
    let delta_first = match delta.chars().next() {
        Some(c) => c,
        None => return String::new(),
    };

    // Whitespace already present on either side of the seam.
    if prev_last.is_whitespace() || delta_first.is_whitespace() {
        return delta.to_string();
    }

    let ends_terminal = previous.trim_end().ends_with(['.', '!', '?']);

    if prev_last.is_alphanumeric() && delta_first.is_uppercase() && !ends_terminal {
        return format!(". {}", delta);
    }
    if delta_first.is_uppercase() || ends_terminal {
        return format!(" {}", delta);
    }

    delta.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_only_delta_is_dropped() {
        assert_eq!(format_delta("hello", "   "), "");
        assert_eq!(format_delta("hello", ""), "");
    }

    #[test]
    fn empty_previous_trims_leading_space() {
        assert_eq!(format_delta("", " hello there"), "hello there");
    }

    #[test]
    fn delta_with_leading_space_passes_through() {
        assert_eq!(format_delta("hello world", " again"), " again");
    }

    #[test]
    fn synthesized_sentence_break() {
        // Unterminated prose followed by a capitalized restart.
        assert_eq!(
            format_delta("we walked home", "Then it rained"),
            ". Then it rained"
        );
    }

    #[test]
    fn space_after_terminal_punctuation() {
        assert_eq!(
            format_delta("I went to the store.", "Store and bought milk"),
            " Store and bought milk"
        );
    }

    #[test]
    fn midword_continuation_stays_glued() {
        assert_eq!(format_delta("hello wor", "ld"), "ld");
    }

    #[test]
    fn punctuation_leading_delta_passes_through() {
        assert_eq!(format_delta("hello world", ", and more"), ", and more");
    }

    #[test]
    fn no_break_after_question_mark() {
        assert_eq!(format_delta("is that so?", "Yes it is"), " Yes it is");
    }
}
