use crate::error::FetchError;
use crate::sources::{page_path, PageSource};
use include_dir::{include_dir, Dir, File};

static ASSETS_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/assets");

/// Sample deck bundled into the binary, laid out as `csv/<n>.csv`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedSource;

impl EmbeddedSource {
    /// Number of consecutive pages bundled, starting at 1.
    pub fn page_count() -> usize {
        (1..)
            .take_while(|&index| ASSETS_DIR.get_file(page_path("", index)).is_some())
            .count()
    }
}

impl PageSource for EmbeddedSource {
    fn name(&self) -> String {
        "embedded".to_string()
    }

    async fn fetch_page(&self, index: usize) -> Result<String, FetchError> {
        let page_file: &File = ASSETS_DIR
            .get_file(page_path("", index))
            .ok_or(FetchError::NotFound { page: index })?;

        let data = page_file
            .contents_utf8()
            .ok_or(FetchError::Encoding { page: index })?;

        Ok(data.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{cards_from_table, ColumnMap};

    #[tokio::test]
    async fn bundled_pages_parse_into_cards() {
        assert!(EmbeddedSource::page_count() >= 2);
        let text = EmbeddedSource.fetch_page(1).await.unwrap();
        let cards = cards_from_table(&text, &ColumnMap::default(), ',');
        assert!(!cards.is_empty());
    }

    #[tokio::test]
    async fn missing_page_is_not_found() {
        let err = EmbeddedSource.fetch_page(999).await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound { page: 999 }));
    }
}
