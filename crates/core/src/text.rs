use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Folds a title to the form used for comparisons: accents stripped,
/// lowercase, apostrophes dropped, other punctuation turned into spaces.
pub fn normalize_title(text: &str) -> String {
    let folded: String = text
        .nfkd()
        .filter(|character| !is_combining_mark(*character))
        .flat_map(char::to_lowercase)
        .filter(|character| !matches!(character, '\'' | '\u{2019}' | '`'))
        .map(|character| {
            if character.is_alphanumeric() {
                character
            } else {
                ' '
            }
        })
        .collect();

    normalize_whitespace(&folded)
}

/// Cuts `text` to at most `max_chars` characters, marking the cut with an ellipsis.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let mut cut: String = text.chars().take(max_chars).collect();
    let trimmed_len = cut.trim_end().len();
    cut.truncate(trimmed_len);
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_is_normalized() {
        let input = "A  \t  lot\nof   spacing";
        assert_eq!(normalize_whitespace(input), "A lot of spacing");
    }

    #[test]
    fn titles_fold_case_accents_and_punctuation() {
        assert_eq!(
            normalize_title("  Harry Potter and the Sorcerer's Stone "),
            "harry potter and the sorcerers stone"
        );
        assert_eq!(normalize_title("Les Misérables"), "les miserables");
        assert_eq!(normalize_title("Catch-22"), "catch 22");
        assert_eq!(normalize_title("?!"), "");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("ééééé", 3), "ééé…");
        assert_eq!(truncate_chars("word and more", 5), "word…");
    }
}
