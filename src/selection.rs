use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::{AbortHandle, JoinHandle};

use crate::card::{Card, CardId};
use crate::config::SelectionPolicy;
use crate::error::{NoHistory, PoolEmpty, SelectionError};
use crate::events::SessionEvent;
use crate::flag::Flag;
use crate::lock;
use crate::pages::PageStore;
use crate::pool::CardPool;
use crate::sources::PageSource;

/// Outcome of asking for the next card.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Shown(Card),
    /// Another selection was still running; this request was dropped.
    Skipped,
    /// No card can be drawn, loaded or recycled.
    Exhausted,
}

impl Selection {
    pub fn card(&self) -> Option<&Card> {
        match self {
            Selection::Shown(card) => Some(card),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrawState {
    Drawing,
    Prefetching,
    Recycling,
    Exhausted,
}

/// Progress-display view of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub current: Option<Card>,
    pub shown: usize,
    pub available: usize,
    pub recent: usize,
    pub total_cards: usize,
    pub loaded_pages: usize,
    pub total_pages: usize,
    pub can_go_back: bool,
    pub loading: bool,
}

struct Shared<S> {
    pages: PageStore<S>,
    pool: Mutex<CardPool>,
    policy: SelectionPolicy,
    selecting: Flag,
    prefetching: Flag,
    prefetch_task: Mutex<Option<AbortHandle>>,
    closed: AtomicBool,
    events: broadcast::Sender<SessionEvent>,
}

impl<S: PageSource> Shared<S> {
    /// The one place loaded pages enter the pool.
    fn ingest(&self, cards: Vec<Card>) -> usize {
        if cards.is_empty() || self.closed.load(Ordering::Acquire) {
            return 0;
        }
        let added = lock(&self.pool).ingest(cards);
        let _ = self.events.send(SessionEvent::PagesLoaded {
            cards_added: added,
            loaded_pages: self.pages.loaded_count(),
            total_pages: self.pages.total_pages(),
        });
        added
    }
}

/// Answers "which card next / previous" for one study session.
///
/// Clones share the session. `next` and `previous` are single-flight: a call
/// that arrives while another selection is running does nothing.
pub struct SelectionController<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for SelectionController<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: PageSource> SelectionController<S> {
    pub fn new(
        pages: PageStore<S>,
        pool: CardPool,
        policy: SelectionPolicy,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                pages,
                pool: Mutex::new(pool),
                policy,
                selecting: Flag::new(),
                prefetching: Flag::new(),
                prefetch_task: Mutex::new(None),
                closed: AtomicBool::new(false),
                events,
            }),
        }
    }

    pub async fn next(&self) -> Selection {
        let Some(_selecting) = self.shared.selecting.try_acquire() else {
            log::debug!("Selection in progress, dropping next()");
            return Selection::Skipped;
        };

        self.prefetch_if_low();

        let selection = match self.select().await {
            Ok(selection) => selection,
            Err(e) => {
                log::error!("Card selection failed: {e}; drawing directly from the pool");
                self.fallback()
            }
        };
        self.publish(&selection);
        selection
    }

    pub fn previous(&self) -> Option<Card> {
        let Some(_selecting) = self.shared.selecting.try_acquire() else {
            log::debug!("Selection in progress, dropping previous()");
            return None;
        };

        let back = lock(&self.shared.pool).go_back();
        match back {
            Ok(card) => {
                self.publish(&Selection::Shown(card.clone()));
                Some(card)
            }
            Err(NoHistory) => {
                log::debug!("Already at the first card");
                None
            }
        }
    }

    async fn select(&self) -> Result<Selection, SelectionError> {
        let mut state = DrawState::Drawing;
        let mut prefetched = false;
        let mut recycled = false;

        loop {
            log::trace!("Selection state: {state:?}");
            state = match state {
                DrawState::Drawing => {
                    let all_loaded = self.shared.pages.all_pages_loaded();
                    let drawn = lock(&self.shared.pool).draw_next(all_loaded);
                    match drawn {
                        Ok(card) => return Ok(Selection::Shown(card)),
                        Err(PoolEmpty) if !prefetched && self.shared.pages.has_unloaded() => {
                            DrawState::Prefetching
                        }
                        Err(PoolEmpty) if !recycled => DrawState::Recycling,
                        Err(PoolEmpty) => DrawState::Exhausted,
                    }
                }
                DrawState::Prefetching => {
                    prefetched = true;
                    self.prefetch_now().await?;
                    DrawState::Drawing
                }
                DrawState::Recycling => {
                    recycled = true;
                    let recycled_any = lock(&self.shared.pool).recycle();
                    if recycled_any {
                        DrawState::Drawing
                    } else {
                        DrawState::Exhausted
                    }
                }
                DrawState::Exhausted => {
                    log::info!("No cards left to show");
                    return Ok(Selection::Exhausted);
                }
            };
        }
    }

    /// Starts a background batch when the pool runs low. Never waits for it.
    fn prefetch_if_low(&self) {
        let available = lock(&self.shared.pool).available_len();
        if available < self.shared.policy.prefetch_threshold && self.shared.pages.has_unloaded() {
            if self.spawn_prefetch().is_some() {
                log::debug!("Pool down to {available} cards, prefetching");
            }
        }
    }

    fn spawn_prefetch(&self) -> Option<JoinHandle<usize>> {
        if self.shared.closed.load(Ordering::Acquire) {
            return None;
        }
        let prefetching = self.shared.prefetching.try_acquire()?;
        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(async move {
            let _prefetching = prefetching;
            let batch = shared.policy.prefetch_batch.max(1);
            let cards = shared.pages.load_next_unloaded_pages(batch).await;
            shared.ingest(cards)
        });
        *lock(&self.shared.prefetch_task) = Some(task.abort_handle());
        Some(task)
    }

    /// Loads pages until the pool has a card or no pages remain.
    async fn prefetch_now(&self) -> Result<(), SelectionError> {
        while self.shared.pages.has_unloaded() {
            if self.shared.pages.is_loading() {
                self.shared.pages.settled().await;
            }
            let loaded = self.shared.pages.loaded_count();
            let own_batch = match self.spawn_prefetch() {
                Some(task) => {
                    task.await?;
                    true
                }
                None if self.shared.closed.load(Ordering::Acquire) => break,
                None => {
                    self.shared.prefetching.cleared().await;
                    false
                }
            };
            if lock(&self.shared.pool).available_len() > 0 {
                break;
            }
            if own_batch && self.shared.pages.loaded_count() == loaded {
                log::warn!("Prefetch loaded no pages, giving up");
                break;
            }
        }
        Ok(())
    }

    /// Ends the session: an in-flight prefetch is aborted and nothing more
    /// is loaded or published for it.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        if let Some(task) = lock(&self.shared.prefetch_task).take() {
            task.abort();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    fn fallback(&self) -> Selection {
        let all_loaded = self.shared.pages.all_pages_loaded();
        let drawn = lock(&self.shared.pool).fallback_draw(all_loaded);
        match drawn {
            Some(card) => Selection::Shown(card),
            None => Selection::Exhausted,
        }
    }

    fn publish(&self, selection: &Selection) {
        let event = match selection {
            Selection::Shown(card) => SessionEvent::CardChanged {
                card: card.clone(),
                shown: self.total_shown(),
            },
            Selection::Exhausted => SessionEvent::Exhausted,
            Selection::Skipped => return,
        };
        if !self.is_closed() {
            let _ = self.shared.events.send(event);
        }
    }

    /// Resolves once no background prefetch is running.
    pub async fn prefetch_settled(&self) {
        self.shared.prefetching.cleared().await
    }

    pub fn current(&self) -> Option<Card> {
        lock(&self.shared.pool).current().cloned()
    }

    pub fn total_shown(&self) -> usize {
        lock(&self.shared.pool).total_shown()
    }

    /// Identities of every card loaded into this session so far.
    pub fn card_ids(&self) -> Vec<CardId> {
        lock(&self.shared.pool)
            .all_cards()
            .iter()
            .map(|card| card.word.clone())
            .collect()
    }

    pub fn card_count(&self) -> usize {
        lock(&self.shared.pool).all_cards().len()
    }

    pub fn is_exhausted(&self) -> bool {
        lock(&self.shared.pool).is_drained() && !self.shared.pages.has_unloaded()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let pool = lock(&self.shared.pool);
        SessionSnapshot {
            current: pool.current().cloned(),
            shown: pool.total_shown(),
            available: pool.available_len(),
            recent: pool.recent_len(),
            total_cards: pool.all_cards().len(),
            can_go_back: pool.can_go_back(),
            loaded_pages: self.shared.pages.loaded_count(),
            total_pages: self.shared.pages.total_pages(),
            loading: self.shared.prefetching.is_set(),
        }
    }
}
