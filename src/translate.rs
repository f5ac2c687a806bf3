use reqwest::Client;
use serde::Deserialize;

use crate::config::TranslationConfig;
use crate::error::Result;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslationResponse {
    response_data: Option<ResponseData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseData {
    translated_text: Option<String>,
}

impl TranslationResponse {
    fn into_text(self) -> Option<String> {
        self.response_data?
            .translated_text
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
    }
}

/// Looks words up in a MyMemory-style translation API.
#[derive(Debug, Clone)]
pub struct Translator {
    client: Client,
    config: TranslationConfig,
}

impl Translator {
    pub fn new(config: TranslationConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// `None` when the service had no translation for `word`.
    pub async fn translate(&self, word: &str) -> Result<Option<String>> {
        let response: TranslationResponse = self
            .client
            .get(&self.config.endpoint)
            .query(&[("q", word), ("langpair", self.config.langpair.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.into_text())
    }
}
