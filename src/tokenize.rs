//! Sentence tokenization for speech playback.
//!
//! Turns one chapter's prose into the ordered unit list a playback session
//! consumes. The split is deliberately naive: terminal punctuation followed
//! by whitespace. No abbreviation or numeral handling is attempted; masking
//! imperfect boundaries behind heuristics would hide bugs, and imperfect
//! boundaries are acceptable here.

/// Split chapter content into speakable units.
///
/// Whitespace runs (newlines included) collapse to single spaces first, then
/// the text splits after `.`, `!` or `?` when followed by whitespace, keeping
/// the terminator attached to the preceding unit. Fragments whose trimmed
/// length does not exceed `min_unit_chars` are dropped so stray headers and
/// page numbers are never spoken as isolated "sentences".
pub fn tokenize_units(content: &str, min_unit_chars: usize) -> Vec<String> {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut units = Vec::new();
    let mut current = String::new();
    let mut chars = collapsed.chars().peekable();

    while let Some(ch) = chars.next() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') && chars.peek() == Some(&' ') {
            chars.next();
            push_unit(&mut units, &mut current, min_unit_chars);
        }
    }
    push_unit(&mut units, &mut current, min_unit_chars);

    units
}

fn push_unit(units: &mut Vec<String>, current: &mut String, min_unit_chars: usize) {
    let trimmed = current.trim();
    if trimmed.chars().count() > min_unit_chars {
        units.push(trimmed.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminal_punctuation() {
        let units = tokenize_units("The fox jumped over. The dog slept soundly.", 10);
        assert_eq!(
            units,
            vec!["The fox jumped over.", "The dog slept soundly."]
        );
    }

    #[test]
    fn keeps_terminator_attached() {
        let units = tokenize_units("Is this a question? It certainly is one!", 10);
        assert_eq!(units[0], "Is this a question?");
        assert_eq!(units[1], "It certainly is one!");
    }

    #[test]
    fn collapses_newlines_into_spaces() {
        let units = tokenize_units("First part of\nthe sentence here.\n\nSecond sentence follows.", 10);
        assert_eq!(units[0], "First part of the sentence here.");
        assert_eq!(units[1], "Second sentence follows.");
    }

    #[test]
    fn drops_short_fragments() {
        let units = tokenize_units("CHAPTER I. Hello. Some words here. More words there.", 10);
        assert_eq!(units, vec!["Some words here.", "More words there."]);
    }

    #[test]
    fn no_emitted_unit_is_at_or_below_threshold() {
        let text = "Tiny. A. Something of reasonable length. Ok. Another long enough sentence.";
        for unit in tokenize_units(text, 10) {
            assert!(unit.chars().count() > 10, "unit too short: {unit:?}");
        }
    }

    #[test]
    fn ellipsis_does_not_split_mid_run() {
        let units = tokenize_units("He paused dramatically... then he spoke again.", 10);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0], "He paused dramatically...");
    }

    #[test]
    fn joined_units_reconstruct_collapsed_source() {
        let text = "A reasonably long sentence. Followed by another long one! And a third question here?";
        let units = tokenize_units(text, 10);
        assert_eq!(units.join(" "), text);
    }

    #[test]
    fn trailing_fragment_without_terminator_is_kept() {
        let units = tokenize_units("Complete sentence here. And then a dangling tail", 10);
        assert_eq!(units[1], "And then a dangling tail");
    }

    #[test]
    fn empty_input_yields_no_units() {
        assert!(tokenize_units("", 10).is_empty());
        assert!(tokenize_units("   \n  ", 10).is_empty());
    }
}
