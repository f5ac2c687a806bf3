use reqwest::{Client, StatusCode};

use crate::error::FetchError;
use crate::sources::{page_path, PageSource};

/// Pages served over HTTP at `<base>/<folder>/csv/<n>.csv`.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    base: String,
    folder: String,
}

impl HttpSource {
    pub fn new(base: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base: base.into(),
            folder: folder.into(),
        }
    }

    pub fn page_url(&self, index: usize) -> String {
        format!(
            "{}/{}",
            self.base.trim_end_matches('/'),
            page_path(&self.folder, index)
        )
    }
}

impl PageSource for HttpSource {
    fn name(&self) -> String {
        format!("{}/{}", self.base.trim_end_matches('/'), self.folder)
    }

    async fn fetch_page(&self, index: usize) -> Result<String, FetchError> {
        let response = self.client.get(self.page_url(index)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound { page: index });
        }
        Ok(response.error_for_status()?.text().await?)
    }
}
