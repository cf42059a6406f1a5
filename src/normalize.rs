const PUNCTUATION: &[char] = &[
    ',', '.', '!', '?', ';', ':', '"', '\u{201c}', '\u{201d}', '\'', '\u{2018}', '\u{2019}', '`',
];

const FILLER_WORDS: &[&str] = &["uh", "um", "eh", "hmm", "er", "ah", "erm"];

/// Canonicalize text before word comparison: lowercase, strip punctuation,
/// drop standalone filler tokens, collapse whitespace. Spoken number words
/// are left as words ("six" stays "six").
pub fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|ch| !PUNCTUATION.contains(ch))
        .collect();
    stripped
        .split_whitespace()
        .filter(|word| !FILLER_WORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::normalize_text;

    #[test]
    fn lowercases_and_strips_punctuation() {
        assert_eq!(normalize_text("Hello, world!"), "hello world");
        assert_eq!(normalize_text("\u{201c}Quoted\u{201d} `text'"), "quoted text");
    }

    #[test]
    fn removes_standalone_filler_words() {
        assert_eq!(normalize_text("um hello uh world"), "hello world");
        assert_eq!(normalize_text("erm, hmm... okay"), "okay");
    }

    #[test]
    fn keeps_filler_letters_inside_words() {
        assert_eq!(normalize_text("umbrella herd"), "umbrella herd");
    }

    #[test]
    fn collapses_whitespace_and_trims() {
        assert_eq!(normalize_text("  hello \t  world \n"), "hello world");
    }

    #[test]
    fn empty_in_empty_out() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("  \t "), "");
        assert_eq!(normalize_text("um, uh!"), "");
    }

    #[test]
    fn never_converts_number_words_to_digits() {
        assert_eq!(normalize_text("I have six apples"), "i have six apples");
    }

    #[test]
    fn idempotent() {
        for text in [
            "Hello, HOW are you?",
            "um hello  uh world",
            "\u{2018}six\u{2019} plus `seven`",
            "",
        ] {
            let once = normalize_text(text);
            assert_eq!(normalize_text(&once), once);
        }
    }
}
