use serde::{Deserialize, Serialize};
use std::fmt;

use crate::words::strip_article;

/// Identity of a card: the word exactly as it appears in the source,
/// article and casing included ("der Hund" and "Hund" are different cards).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    pub fn new(word: impl AsRef<str>) -> Self {
        Self(word.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CardId {
    fn from(word: &str) -> Self {
        Self::new(word)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub word: CardId,
    pub pronunciation: String,
    pub translation_primary: String,
    pub translation_secondary: String,
    pub example_sentence: String,
}

impl Card {
    pub fn new(word: impl AsRef<str>) -> Self {
        Self {
            word: CardId::new(word),
            pronunciation: String::new(),
            translation_primary: String::new(),
            translation_secondary: String::new(),
            example_sentence: String::new(),
        }
    }

    pub fn id(&self) -> &CardId {
        &self.word
    }

    /// Front-of-card form: the word without its leading article.
    pub fn display_word(&self) -> &str {
        let stripped = strip_article(self.word.as_str());
        if stripped.is_empty() {
            self.word.as_str()
        } else {
            stripped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_trimmed_but_keeps_article_and_case() {
        let card = Card::new("  der Hund ");
        assert_eq!(card.id().as_str(), "der Hund");
        assert_ne!(CardId::new("der Hund"), CardId::new("Hund"));
        assert_ne!(CardId::new("Hund"), CardId::new("hund"));
    }

    #[test]
    fn display_word_strips_article() {
        assert_eq!(Card::new("die Katze").display_word(), "Katze");
        assert_eq!(Card::new("laufen").display_word(), "laufen");
        assert_eq!(Card::new("das").display_word(), "das");
    }
}
