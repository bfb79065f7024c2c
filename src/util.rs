use std::collections::HashSet;

const LABEL_MAX_CHARS: usize = 28;
const LABEL_KEEP_CHARS: usize = 25;

/// Lower-cases `text` and keeps only runs of ASCII letters and digits,
/// joined by single spaces.
pub fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut words = Vec::new();
    let mut word = String::new();

    for ch in lowered.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            word.push(ch);
        } else if !word.is_empty() {
            words.push(std::mem::take(&mut word));
        }
    }
    if !word.is_empty() {
        words.push(word);
    }

    words.join(" ")
}

/// Distinct words of `text` longer than two characters.
pub fn tokenize(text: &str) -> HashSet<String> {
    normalize_text(text)
        .split(' ')
        .filter(|word| word.len() > 2)
        .map(str::to_owned)
        .collect()
}

pub fn truncate_label(text: &str) -> String {
    if text.chars().count() > LABEL_MAX_CHARS {
        let head = text.chars().take(LABEL_KEEP_CHARS).collect::<String>();
        format!("{head}…")
    } else {
        text.to_owned()
    }
}

pub fn format_score(score: Option<f64>) -> String {
    match score {
        Some(value) => format!("{value:.3}"),
        None => "n/a".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_splits_on_punctuation_and_lowercases() {
        assert_eq!(normalize_text("Volt-Related Peak!!"), "volt related peak");
        assert_eq!(normalize_text("  __a1__B2  "), "a1 b2");
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("!!!"), "");
    }

    #[test]
    fn normalize_drops_non_ascii_letters() {
        assert_eq!(normalize_text("Température élevée"), "temp rature lev e");
    }

    #[test]
    fn tokenize_keeps_words_longer_than_two_chars() {
        let tokens = tokenize("Volt-Related Peak!!");
        let expected = ["volt", "related", "peak"]
            .into_iter()
            .map(str::to_owned)
            .collect::<HashSet<_>>();
        assert_eq!(tokens, expected);

        let tokens = tokenize("ok it is fine fine");
        assert_eq!(tokens.len(), 1);
        assert!(tokens.contains("fine"));
    }

    #[test]
    fn tokenize_empty_input_is_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("a b c").is_empty());
    }

    #[test]
    fn truncate_label_respects_character_budget() {
        assert_eq!(truncate_label("short name"), "short name");

        let exact = "a".repeat(28);
        assert_eq!(truncate_label(&exact), exact);

        let long = "abcdefghijklmnopqrstuvwxyz0123456789";
        assert_eq!(truncate_label(long), "abcdefghijklmnopqrstuvwxy…");
    }

    #[test]
    fn format_score_uses_three_decimals() {
        assert_eq!(format_score(Some(0.12345)), "0.123");
        assert_eq!(format_score(None), "n/a");
    }
}
