use reqwest::Url;

use crate::card::Card;
use crate::config::LinksConfig;
use crate::error::{Error, Result};

/// Dictionary, wiki and pronunciation links for one card, built from the
/// word without its article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickLinks {
    pub dictionary: Url,
    pub wiktionary: Url,
    pub audio: Url,
}

impl QuickLinks {
    pub fn for_card(card: &Card, config: &LinksConfig) -> Result<Self> {
        let word = card.display_word();

        let dictionary = with_params(&config.dictionary, &[("s", word)])?;

        let mut wiktionary = parse(&config.wiktionary)?;
        wiktionary
            .path_segments_mut()
            .map_err(|()| Error::InvalidUrl(config.wiktionary.clone()))?
            .pop_if_empty()
            .push(word);
        wiktionary.set_fragment(Some(&config.wiktionary_section));

        let audio = with_params(
            &config.audio,
            &[
                ("ie", "UTF-8"),
                ("tl", config.audio_language.as_str()),
                ("client", "tw-ob"),
                ("q", word),
            ],
        )?;

        Ok(Self {
            dictionary,
            wiktionary,
            audio,
        })
    }
}

fn parse(base: &str) -> Result<Url> {
    Url::parse(base).map_err(|e| Error::InvalidUrl(format!("{base}: {e}")))
}

fn with_params(base: &str, params: &[(&str, &str)]) -> Result<Url> {
    Url::parse_with_params(base, params).map_err(|e| Error::InvalidUrl(format!("{base}: {e}")))
}
