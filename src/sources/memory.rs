use std::collections::HashMap;
use std::time::Duration;

use crate::error::FetchError;
use crate::sources::PageSource;

/// Pages held in memory, optionally answered after a fixed delay.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pages: HashMap<usize, String>,
    latency: Option<Duration>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, index: usize, text: impl Into<String>) -> Self {
        self.pages.insert(index, text.into());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

impl PageSource for MemorySource {
    fn name(&self) -> String {
        "memory".to_string()
    }

    async fn fetch_page(&self, index: usize) -> Result<String, FetchError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.pages
            .get(&index)
            .cloned()
            .ok_or(FetchError::NotFound { page: index })
    }
}
