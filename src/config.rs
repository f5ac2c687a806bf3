use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::table::ColumnMap;

/// Thresholds that drive card selection and prefetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionPolicy {
    /// Size of the recency buffer that prevents immediate repeats.
    pub recent_capacity: usize,
    /// Evicted cards go back into the pool only while it holds fewer cards
    /// than this, and only once every page is loaded.
    pub low_water_mark: usize,
    /// A background prefetch starts when fewer cards than this are available.
    pub prefetch_threshold: usize,
    /// Pages fetched per prefetch batch; 0 counts as 1.
    pub prefetch_batch: usize,
    /// Pages fetched when a lazily loaded mode starts.
    pub initial_pages: usize,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            recent_capacity: 6,
            low_water_mark: 10,
            prefetch_threshold: 20,
            prefetch_batch: 2,
            initial_pages: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub endpoint: String,
    pub langpair: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.mymemory.translated.net/get".to_string(),
            langpair: "de|bn".to_string(),
        }
    }
}

/// Reference pages offered for the card on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinksConfig {
    /// Dictionary search; the word goes in the `s` parameter.
    pub dictionary: String,
    /// Wiki base; the word is appended as a path segment.
    pub wiktionary: String,
    pub wiktionary_section: String,
    /// Text-to-speech endpoint; the word goes in the `q` parameter.
    pub audio: String,
    pub audio_language: String,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            dictionary: "https://www.dict.cc/".to_string(),
            wiktionary: "https://en.wiktionary.org/wiki/".to_string(),
            wiktionary_section: "German".to_string(),
            audio: "https://translate.google.com/translate_tts".to_string(),
            audio_language: "de".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub folder: String,
    pub total_pages: usize,
    pub delimiter: char,
    pub columns: ColumnMap,
    pub selection: SelectionPolicy,
    pub translation: TranslationConfig,
    pub links: LinksConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            folder: "lws".to_string(),
            total_pages: 25,
            delimiter: ',',
            columns: ColumnMap::default(),
            selection: SelectionPolicy::default(),
            translation: TranslationConfig::default(),
            links: LinksConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)?;
        log::info!("Config loaded from: {}", path.display());
        Ok(config)
    }
}
