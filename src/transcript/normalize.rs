//! Transcript text canonicalization.
//!
//! Speech backends disagree on cosmetic details: double spaces, stray
//! whitespace around punctuation, and wrapping quotes around the whole
//! hypothesis. Everything that compares or stores transcript text goes
//! through [`normalize`] first so those differences never masquerade as
//! a content rewrite.

/// Quote pairs stripped when they wrap the entire string.
const QUOTE_PAIRS: &[(char, char)] = &[
    ('"', '"'),
    ('\'', '\''),
    ('\u{201C}', '\u{201D}'),
    ('\u{2018}', '\u{2019}'),
];

/// Collapses runs of whitespace to single spaces, strips outer wrapping
/// quotes, and trims. Idempotent: `normalize(normalize(s)) == normalize(s)`.
pub fn normalize(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    strip_outer_quotes(&collapsed).to_string()
}

fn strip_outer_quotes(text: &str) -> &str {
    let mut out = text.trim();
    loop {
        let mut chars = out.chars();
        let (first, last) = match (chars.next(), out.chars().next_back()) {
            (Some(f), Some(l)) => (f, l),
            _ => return out,
        };
        // A single quote character is not a wrapped string.
        if out.chars().count() < 2 {
            return out;
        }
        let wrapped = QUOTE_PAIRS.iter().any(|&(open, close)| first == open && last == close);
        if !wrapped {
            return out;
        }
        out = out[first.len_utf8()..out.len() - last.len_utf8()].trim();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_interior_whitespace() {
        assert_eq!(normalize("hello   world\t again"), "hello world again");
    }

    #[test]
    fn trims_edges() {
        assert_eq!(normalize("  hello world  "), "hello world");
    }

    #[test]
    fn strips_wrapping_quotes() {
        assert_eq!(normalize("\"hello world\""), "hello world");
        assert_eq!(normalize("'hello world'"), "hello world");
        assert_eq!(normalize("\u{201C}hello world\u{201D}"), "hello world");
    }

    #[test]
    fn strips_nested_wrapping_quotes() {
        assert_eq!(normalize("\"'hello'\""), "hello");
    }

    #[test]
    fn keeps_interior_quotes() {
        assert_eq!(normalize("she said \"hi\" twice"), "she said \"hi\" twice");
    }

    #[test]
    fn lone_quote_is_preserved() {
        assert_eq!(normalize("\""), "\"");
    }

    #[test]
    fn empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn idempotent() {
        for case in [
            "hello   world",
            "\" spaced   quote \"",
            "plain",
            "'a'",
            "  mixed \u{201C}q\u{201D}  ",
            "",
        ] {
            let once = normalize(case);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", case);
        }
    }
}
