use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::card::Card;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::SessionEvent;
use crate::pages::PageStore;
use crate::pool::CardPool;
use crate::progress::{ProgressStore, Stats, Status};
use crate::selection::{Selection, SelectionController, SessionSnapshot};
use crate::sources::PageSource;
use crate::storage::{ExportSink, KeyValueStore};
use crate::words::CustomFilter;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudyMode {
    /// A single page.
    Page(usize),
    /// Every page, loaded lazily while studying.
    All,
    /// Cards from any page matching one of these words.
    Custom(Vec<String>),
}

impl fmt::Display for StudyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StudyMode::Page(page) => write!(f, "page {page}"),
            StudyMode::All => f.write_str("all pages"),
            StudyMode::Custom(words) => write!(f, "custom ({} words)", words.len()),
        }
    }
}

/// Everything a front end needs: mode selection, navigation and progress.
pub struct Trainer<S, K> {
    source: Arc<S>,
    config: Config,
    progress: ProgressStore<K>,
    session: Option<SelectionController<S>>,
    events: broadcast::Sender<SessionEvent>,
    /// Card total behind the last `StatsChanged`.
    published_total: AtomicUsize,
    seed: Option<u64>,
}

impl<S: PageSource, K: KeyValueStore> Trainer<S, K> {
    pub fn new(source: S, store: K, config: Config) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            source: Arc::new(source),
            config,
            progress: ProgressStore::open(store),
            session: None,
            events,
            published_total: AtomicUsize::new(0),
            seed: None,
        }
    }

    /// Makes every session shuffle deterministically.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn progress(&self) -> &ProgressStore<K> {
        &self.progress
    }

    pub fn source_name(&self) -> String {
        self.source.name()
    }

    /// The running session, for callers that drive it directly.
    pub fn session(&self) -> Option<&SelectionController<S>> {
        self.session.as_ref()
    }

    fn page_store(&self, pages: impl IntoIterator<Item = usize>) -> PageStore<S> {
        PageStore::new(
            Arc::clone(&self.source),
            self.config.columns.clone(),
            self.config.delimiter,
            pages,
        )
    }

    /// Starts a fresh session in `mode` and shows its first card.
    pub async fn select_mode(&mut self, mode: StudyMode) -> Result<Card> {
        let total = self.config.total_pages;
        if let StudyMode::Page(page) = mode {
            if page == 0 || page > total {
                return Err(Error::PageOutOfRange { page, total });
            }
        }
        if let Some(previous) = self.session.take() {
            previous.close();
        }

        let (pages, cards) = match &mode {
            StudyMode::Page(page) => {
                let pages = self.page_store([*page]);
                let cards = pages.load_all().await;
                (pages, cards)
            }
            StudyMode::All => {
                let pages = self.page_store(1..=total);
                let batch = self.config.selection.initial_pages.max(1);
                let mut cards = Vec::new();
                while cards.is_empty() && pages.has_unloaded() {
                    cards = pages.load_next_unloaded_pages(batch).await;
                }
                (pages, cards)
            }
            StudyMode::Custom(words) => {
                let filter = CustomFilter::new(words);
                let pages = self.page_store(1..=total);
                let cards: Vec<Card> = pages
                    .load_all()
                    .await
                    .into_iter()
                    .filter(|card| filter.matches(card))
                    .collect();
                (pages, cards)
            }
        };

        if cards.is_empty() {
            log::warn!("No cards found for {mode}");
            return Err(Error::NoCards);
        }

        let mut pool = match self.seed {
            Some(seed) => CardPool::seeded(&self.config.selection, seed),
            None => CardPool::new(&self.config.selection),
        };
        pool.reset(cards);
        let count = pool.all_cards().len();
        log::info!(
            "Starting {mode} with {count} cards ({}/{} pages loaded)",
            pages.loaded_count(),
            pages.total_pages()
        );

        let session =
            SelectionController::new(pages, pool, self.config.selection, self.events.clone());
        self.session = Some(session.clone());
        let _ = self.events.send(SessionEvent::ModeChanged {
            mode: mode.to_string(),
            cards: count,
        });
        self.publish_stats();

        match session.next().await {
            Selection::Shown(card) => Ok(card),
            _ => Err(Error::NoCards),
        }
    }

    fn active(&self) -> Result<&SelectionController<S>> {
        self.session.as_ref().ok_or(Error::NoSession)
    }

    pub async fn next(&self) -> Result<Selection> {
        let session = self.active()?;
        let selection = session.next().await;
        if session.card_count() != self.published_total.load(Ordering::Relaxed) {
            self.publish_stats();
        }
        Ok(selection)
    }

    pub fn previous(&self) -> Result<Option<Card>> {
        Ok(self.active()?.previous())
    }

    pub fn current(&self) -> Option<Card> {
        self.session.as_ref().and_then(|session| session.current())
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.session.as_ref().map(|session| session.snapshot())
    }

    /// Records `status` for the card on screen.
    pub fn mark(&mut self, status: Status) -> Result<Stats> {
        let card = self.current().ok_or(Error::NoCurrentCard)?;
        self.progress.mark(&card.word, status)?;
        log::debug!("Marked {} as {status}", card.word);
        Ok(self.publish_stats())
    }

    pub fn stats(&self) -> Stats {
        match &self.session {
            Some(session) => self.progress.stats(&session.card_ids()),
            None => Stats::default(),
        }
    }

    fn publish_stats(&self) -> Stats {
        let stats = self.stats();
        self.published_total.store(stats.total, Ordering::Relaxed);
        let _ = self.events.send(SessionEvent::StatsChanged(stats));
        stats
    }

    pub fn export(&self, sink: &mut impl ExportSink) -> Result<PathBuf> {
        let total_cards = self.stats().total;
        self.progress.export(total_cards, sink)
    }

    pub fn import(&mut self, json: &str) -> Result<usize> {
        let count = self.progress.import(json)?;
        self.publish_stats();
        Ok(count)
    }

    /// Erases all saved progress. Confirming with the user is up to the caller.
    pub fn clear(&mut self) -> Result<()> {
        self.progress.clear()?;
        self.publish_stats();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MemorySource;
    use crate::storage::MemoryStore;
    use std::time::Duration;

    const HEADER: &str = "German Word,Bangla Pronunciation,Bangla Meaning,English Meaning,German sentence";

    fn source() -> MemorySource {
        MemorySource::new()
            .with_page(1, format!("{HEADER}\nder Hund,a,b,dog,s\ndie Katze,a,b,cat,s\n"))
            .with_page(2, format!("{HEADER}\ndas Haus,a,b,house,s\nlaufen,a,b,run,s\n"))
            .with_page(3, format!("{HEADER}\nder Hundekuchen,a,b,dog biscuit,s\n"))
    }

    fn numbered_pages(pages: usize, per_page: usize) -> MemorySource {
        (1..=pages).fold(MemorySource::new(), |source, index| {
            let mut text = format!("{HEADER}\n");
            for i in 0..per_page {
                text.push_str(&format!("wort{index}-{i},a,b,c,s\n"));
            }
            source.with_page(index, text)
        })
    }

    fn six_page_trainer(source: MemorySource) -> Trainer<MemorySource, MemoryStore> {
        let config = Config {
            total_pages: 6,
            ..Config::default()
        };
        Trainer::new(source, MemoryStore::new(), config).with_seed(7)
    }

    fn trainer() -> Trainer<MemorySource, MemoryStore> {
        let config = Config {
            total_pages: 3,
            ..Config::default()
        };
        Trainer::new(source(), MemoryStore::new(), config).with_seed(3)
    }

    #[tokio::test]
    async fn page_mode_studies_one_page() {
        let mut trainer = trainer();
        let card = trainer.select_mode(StudyMode::Page(2)).await.unwrap();
        assert!(["das Haus", "laufen"].contains(&card.word.as_str()));
        let snapshot = trainer.snapshot().unwrap();
        assert_eq!(snapshot.total_cards, 2);
        assert_eq!(snapshot.total_pages, 1);
    }

    #[tokio::test]
    async fn page_out_of_range_is_rejected() {
        let mut trainer = trainer();
        assert!(matches!(
            trainer.select_mode(StudyMode::Page(4)).await,
            Err(Error::PageOutOfRange { page: 4, total: 3 })
        ));
        assert!(matches!(trainer.next().await, Err(Error::NoSession)));
    }

    #[tokio::test]
    async fn all_mode_starts_with_initial_pages() {
        let mut trainer = trainer();
        trainer.select_mode(StudyMode::All).await.unwrap();
        let snapshot = trainer.snapshot().unwrap();
        assert!(snapshot.loaded_pages >= 2);
        assert_eq!(snapshot.shown, 1);
    }

    #[tokio::test]
    async fn custom_mode_filters_by_word() {
        let mut trainer = trainer();
        trainer
            .select_mode(StudyMode::Custom(vec!["hund".to_string()]))
            .await
            .unwrap();
        let snapshot = trainer.snapshot().unwrap();
        assert_eq!(snapshot.total_cards, 2);
        assert_eq!(snapshot.loaded_pages, 3);
    }

    #[tokio::test]
    async fn custom_mode_without_matches_has_no_cards() {
        let mut trainer = trainer();
        let result = trainer
            .select_mode(StudyMode::Custom(vec!["zebra".to_string()]))
            .await;
        assert!(matches!(result, Err(Error::NoCards)));
        assert!(trainer.snapshot().is_none());
    }

    #[tokio::test]
    async fn marking_updates_stats_and_notifies() {
        let mut trainer = trainer();
        let mut events = trainer.subscribe();
        trainer.select_mode(StudyMode::Page(1)).await.unwrap();

        let stats = trainer.mark(Status::Known).unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.known, 1);
        assert_eq!(stats.completion, 50);

        let mut saw_stats = false;
        while let Ok(event) = events.try_recv() {
            saw_stats |= event == SessionEvent::StatsChanged(stats);
        }
        assert!(saw_stats);
    }

    #[tokio::test]
    async fn mark_without_a_card_fails() {
        let mut trainer = trainer();
        assert!(matches!(
            trainer.mark(Status::Review),
            Err(Error::NoCurrentCard)
        ));
    }

    #[tokio::test]
    async fn clear_resets_stats() {
        let mut trainer = trainer();
        trainer.select_mode(StudyMode::Page(1)).await.unwrap();
        trainer.mark(Status::Review).unwrap();
        trainer.clear().unwrap();
        assert_eq!(trainer.stats().review, 0);
        assert!(trainer.progress().is_empty());
    }

    #[tokio::test]
    async fn switching_mode_stops_the_old_prefetch() {
        let source = numbered_pages(6, 2).with_latency(Duration::from_millis(20));
        let mut trainer = six_page_trainer(source);
        trainer.select_mode(StudyMode::All).await.unwrap();
        let abandoned = trainer.session().unwrap().clone();
        assert!(abandoned.snapshot().loading);

        let mut events = trainer.subscribe();
        trainer.select_mode(StudyMode::Page(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(abandoned.is_closed());
        assert!(!abandoned.snapshot().loading);
        assert_eq!(abandoned.snapshot().loaded_pages, 2);
        while let Ok(event) = events.try_recv() {
            assert!(
                !matches!(event, SessionEvent::PagesLoaded { .. }),
                "stale {event:?}"
            );
        }
        let snapshot = trainer.snapshot().unwrap();
        assert_eq!((snapshot.loaded_pages, snapshot.total_pages), (1, 1));
    }

    #[tokio::test]
    async fn stats_follow_pages_loaded_in_the_background() {
        let mut trainer = six_page_trainer(numbered_pages(6, 2));
        let mut events = trainer.subscribe();
        trainer.select_mode(StudyMode::All).await.unwrap();
        assert_eq!(trainer.stats().total, 4);

        trainer.session().unwrap().prefetch_settled().await;
        trainer.next().await.unwrap();

        let mut totals = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let SessionEvent::StatsChanged(stats) = event {
                totals.push(stats.total);
            }
        }
        assert_eq!(totals, vec![4, 8]);
    }
}
