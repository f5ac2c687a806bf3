use std::future::Future;

use crate::error::FetchError;

pub mod directory;
pub mod embedded;
pub mod http;
pub mod memory;

pub use directory::DirectorySource;
pub use embedded::EmbeddedSource;
pub use http::HttpSource;
pub use memory::MemorySource;

/// Where numbered word-list pages come from.
pub trait PageSource: Send + Sync + 'static {
    fn name(&self) -> String;

    /// Raw delimited text of page `index` (1-based).
    fn fetch_page(&self, index: usize) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// Any of the built-in sources, picked at runtime.
#[derive(Debug, Clone)]
pub enum AnySource {
    Embedded(EmbeddedSource),
    Directory(DirectorySource),
    Http(HttpSource),
}

impl AnySource {
    /// The bundled deck for `None`, HTTP for `http(s)://` locations and a
    /// local directory otherwise.
    pub fn from_location(location: Option<&str>, folder: &str) -> Self {
        match location {
            None => AnySource::Embedded(EmbeddedSource),
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
                AnySource::Http(HttpSource::new(url, folder))
            }
            Some(dir) => AnySource::Directory(DirectorySource::new(dir, folder)),
        }
    }
}

impl PageSource for AnySource {
    fn name(&self) -> String {
        match self {
            AnySource::Embedded(source) => source.name(),
            AnySource::Directory(source) => source.name(),
            AnySource::Http(source) => source.name(),
        }
    }

    async fn fetch_page(&self, index: usize) -> Result<String, FetchError> {
        match self {
            AnySource::Embedded(source) => source.fetch_page(index).await,
            AnySource::Directory(source) => source.fetch_page(index).await,
            AnySource::Http(source) => source.fetch_page(index).await,
        }
    }
}

/// `<folder>/csv/<index>.csv`, the layout every source shares.
pub fn page_path(folder: &str, index: usize) -> String {
    if folder.is_empty() {
        format!("csv/{index}.csv")
    } else {
        format!("{}/csv/{index}.csv", folder.trim_matches('/'))
    }
}
