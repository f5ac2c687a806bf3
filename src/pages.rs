use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::card::Card;
use crate::flag::Flag;
use crate::lock;
use crate::sources::PageSource;
use crate::table::{cards_from_table, ColumnMap};

/// Fetches word-list pages on demand and remembers which ones are done.
///
/// Clones share the same load state, so a background prefetch task and the
/// selection path see one `loaded` set and one single-flight flag.
pub struct PageStore<S> {
    source: Arc<S>,
    columns: Arc<ColumnMap>,
    delimiter: char,
    pages: Arc<[usize]>,
    loaded: Arc<Mutex<BTreeSet<usize>>>,
    loading: Flag,
}

impl<S> Clone for PageStore<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            columns: Arc::clone(&self.columns),
            delimiter: self.delimiter,
            pages: Arc::clone(&self.pages),
            loaded: Arc::clone(&self.loaded),
            loading: self.loading.clone(),
        }
    }
}

impl<S: PageSource> PageStore<S> {
    /// A store over the given page indices, kept in ascending order.
    pub fn new(
        source: Arc<S>,
        columns: ColumnMap,
        delimiter: char,
        pages: impl IntoIterator<Item = usize>,
    ) -> Self {
        let pages: BTreeSet<usize> = pages.into_iter().filter(|&p| p > 0).collect();
        Self {
            source,
            columns: Arc::new(columns),
            delimiter,
            pages: pages.into_iter().collect(),
            loaded: Arc::new(Mutex::new(BTreeSet::new())),
            loading: Flag::new(),
        }
    }

    /// Fetches one page. Failures yield no cards; the page counts as loaded
    /// either way and is never retried.
    pub async fn load_page(&self, index: usize) -> Vec<Card> {
        let cards = match self.source.fetch_page(index).await {
            Ok(text) => cards_from_table(&text, &self.columns, self.delimiter),
            Err(e) => {
                log::warn!("Page {index} from {} contributed no cards: {e}", self.source.name());
                Vec::new()
            }
        };
        lock(&self.loaded).insert(index);
        log::debug!("Page {index} loaded with {} cards", cards.len());
        cards
    }

    /// Loads up to `count` pages not loaded yet, lowest index first, and
    /// returns their cards in page order.
    ///
    /// Returns nothing if every page is loaded or another batch is in flight.
    pub async fn load_next_unloaded_pages(&self, count: usize) -> Vec<Card> {
        let Some(_loading) = self.loading.try_acquire() else {
            log::debug!("Page batch already in flight, skipping");
            return Vec::new();
        };

        let pending = self.unloaded_pages(count);
        if pending.is_empty() {
            return Vec::new();
        }

        let batches = join_all(pending.iter().map(|&index| self.load_page(index))).await;
        let cards: Vec<Card> = batches.into_iter().flatten().collect();
        log::info!(
            "Loaded pages {pending:?}: {} cards ({}/{} pages)",
            cards.len(),
            self.loaded_count(),
            self.total_pages()
        );
        cards
    }

    /// Loads every remaining page, waiting out any batch already in flight.
    pub async fn load_all(&self) -> Vec<Card> {
        let mut cards = Vec::new();
        while self.has_unloaded() {
            if self.is_loading() {
                self.settled().await;
                continue;
            }
            cards.extend(self.load_next_unloaded_pages(self.pages.len()).await);
        }
        cards
    }

    fn unloaded_pages(&self, count: usize) -> Vec<usize> {
        let loaded = lock(&self.loaded);
        self.pages
            .iter()
            .copied()
            .filter(|index| !loaded.contains(index))
            .take(count)
            .collect()
    }

    pub fn all_pages_loaded(&self) -> bool {
        self.loaded_count() == self.pages.len()
    }

    pub fn has_unloaded(&self) -> bool {
        !self.all_pages_loaded()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_set()
    }

    /// Resolves when no batch is in flight.
    pub async fn settled(&self) {
        self.loading.cleared().await
    }

    pub fn loaded_pages(&self) -> Vec<usize> {
        lock(&self.loaded).iter().copied().collect()
    }

    pub fn loaded_count(&self) -> usize {
        let loaded = lock(&self.loaded);
        self.pages.iter().filter(|index| loaded.contains(index)).count()
    }

    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }
}
