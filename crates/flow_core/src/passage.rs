//! crates/flow_core/src/passage.rs
//!
//! Text utilities for the analysis pipeline: extracting the trailing
//! complete-sentence passage, counting words, and normalizing editor markup.

/// Returns the longest prefix of `text` ending at a sentence terminator
/// (`.`, `!` or `?`) that is followed by whitespace or the end of the input,
/// inclusive of that terminator.
///
/// If no complete sentence exists, the whole input is returned. Empty or
/// whitespace-only input yields an empty string. The result is always a slice
/// of the input, so it is byte-for-byte a prefix of it.
pub fn current_passage(text: &str) -> &str {
    if text.trim().is_empty() {
        return "";
    }

    let mut end = None;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            match chars.peek() {
                Some(&(_, next)) if next.is_whitespace() => end = Some(i + c.len_utf8()),
                None => end = Some(i + c.len_utf8()),
                _ => {}
            }
        }
    }

    match end {
        Some(e) => &text[..e],
        None => text,
    }
}

/// Counts words the way the editor header does: whitespace-separated,
/// non-empty tokens.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Replaces markup tags with spaces so tag boundaries still separate words.
/// Unclosed tags are dropped through to the end of the input.
pub fn strip_tags(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut in_tag = false;
    for c in markup.chars() {
        match c {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Normalizes content before it is sent to the store: empty paragraph markup
/// is stripped and surrounding whitespace trimmed. This is the saved baseline
/// that `has_unsaved_changes` compares against.
pub fn normalize_content(content: &str) -> String {
    content.replace("<p></p>", "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passage_drops_trailing_incomplete_sentence() {
        assert_eq!(current_passage("Hello world. This is great"), "Hello world.");
    }

    #[test]
    fn passage_is_whole_input_when_no_terminator() {
        assert_eq!(current_passage("no punctuation here"), "no punctuation here");
    }

    #[test]
    fn passage_of_empty_or_blank_input_is_empty() {
        assert_eq!(current_passage(""), "");
        assert_eq!(current_passage("   \n\t "), "");
    }

    #[test]
    fn passage_keeps_terminator_at_end_of_input() {
        assert_eq!(current_passage("Done!"), "Done!");
        assert_eq!(current_passage("One. Two? Three!"), "One. Two? Three!");
    }

    #[test]
    fn terminator_without_following_whitespace_does_not_end_a_sentence() {
        // "3.14" must not be treated as a sentence boundary.
        assert_eq!(current_passage("pi is 3.14 roughly"), "pi is 3.14 roughly");
        assert_eq!(current_passage("pi is 3.14. More text"), "pi is 3.14.");
    }

    #[test]
    fn passage_is_always_a_prefix_of_the_input() {
        let inputs = [
            "Hello world. This is great",
            "  leading space. tail",
            "no terminator",
            "multi. sentence? text! trailing words",
            "ünïcödé sentence. Ünfinished",
        ];
        for input in inputs {
            let passage = current_passage(input);
            assert!(input.starts_with(passage), "{passage:?} not a prefix of {input:?}");
        }
    }

    #[test]
    fn word_count_ignores_extra_whitespace() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("  one   two\nthree "), 3);
    }

    #[test]
    fn strip_tags_separates_words_at_tag_boundaries() {
        assert_eq!(strip_tags("<p>one</p><p>two</p>").split_whitespace().count(), 2);
        assert_eq!(strip_tags("plain text"), "plain text");
    }

    #[test]
    fn normalize_removes_empty_paragraphs_and_trims() {
        assert_eq!(normalize_content("<p>hi</p><p></p> "), "<p>hi</p>");
        assert_eq!(normalize_content("<p></p>"), "");
    }
}
