use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::FetchError;
use crate::sources::{page_path, PageSource};

/// Pages read from disk at `<root>/<folder>/csv/<n>.csv`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    folder: String,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>, folder: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            folder: folder.into(),
        }
    }

    pub fn page_file(&self, index: usize) -> PathBuf {
        self.root.join(page_path(&self.folder, index))
    }
}

impl PageSource for DirectorySource {
    fn name(&self) -> String {
        format!("{}/{}", self.root.display(), self.folder)
    }

    async fn fetch_page(&self, index: usize) -> Result<String, FetchError> {
        let path = self.page_file(index);
        match tokio::fs::read(&path).await {
            Ok(bytes) => String::from_utf8(bytes).map_err(|_| FetchError::Encoding { page: index }),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(FetchError::NotFound { page: index }),
            Err(e) => Err(e.into()),
        }
    }
}
