use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::card::Card;

static ARTICLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(der|die|das)\s+").expect("article pattern is valid"));

static EDGE_PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{P}\p{S}]+|[\p{P}\p{S}]+$").expect("punctuation pattern is valid")
});

/// Removes a leading German definite article ("der", "die", "das").
pub fn strip_article(word: &str) -> &str {
    match ARTICLE.find(word) {
        Some(m) => word[m.end()..].trim(),
        None => word.trim(),
    }
}

/// Splits free text into unique words, keeping first-seen order.
///
/// Punctuation and symbols are trimmed from both ends of each word; letters
/// such as `ä`, `ö`, `ü` and `ß` are left alone.
pub fn extract_words(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split_whitespace()
        .map(|word| EDGE_PUNCTUATION.replace_all(word, "").into_owned())
        .filter(|word| !word.is_empty())
        .filter(|word| seen.insert(word.clone()))
        .collect()
}

/// Word list matcher used by the custom study mode.
#[derive(Debug, Clone, Default)]
pub struct CustomFilter {
    words: Vec<String>,
}

impl CustomFilter {
    pub fn new<I, W>(words: I) -> Self
    where
        I: IntoIterator<Item = W>,
        W: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self { words }
    }

    /// One word per line, blank lines ignored.
    pub fn parse(input: &str) -> Self {
        Self::new(input.lines())
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn matches(&self, card: &Card) -> bool {
        let full = card.word.as_str().to_lowercase();
        let bare = strip_article(card.word.as_str()).to_lowercase();
        self.words
            .iter()
            .any(|w| bare == *w || full.contains(w.as_str()))
    }
}
