use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::{HashSet, VecDeque};

use crate::card::{Card, CardId};
use crate::config::SelectionPolicy;
use crate::error::{NoHistory, PoolEmpty};

/// Working set of cards for one study session.
///
/// Cards move between `available` (eligible for the next random draw), the
/// bounded `recent` buffer (just shown, newest at the back) and `retired`
/// (evicted from `recent` while the pool was still being fed by pages).
/// A card is in at most one of those at a time.
#[derive(Debug)]
pub struct CardPool {
    all: Vec<Card>,
    ids: HashSet<CardId>,
    available: Vec<Card>,
    recent: VecDeque<Card>,
    retired: Vec<Card>,
    /// Cards undone by `go_back`, replayed by `draw_next` newest first.
    forward: Vec<Card>,
    current: Option<Card>,
    total_shown: usize,
    recent_capacity: usize,
    low_water_mark: usize,
    rng: StdRng,
}

impl CardPool {
    pub fn new(policy: &SelectionPolicy) -> Self {
        Self::with_rng(policy, StdRng::from_os_rng())
    }

    pub fn seeded(policy: &SelectionPolicy, seed: u64) -> Self {
        Self::with_rng(policy, StdRng::seed_from_u64(seed))
    }

    fn with_rng(policy: &SelectionPolicy, rng: StdRng) -> Self {
        Self {
            all: Vec::new(),
            ids: HashSet::new(),
            available: Vec::new(),
            recent: VecDeque::new(),
            retired: Vec::new(),
            forward: Vec::new(),
            current: None,
            total_shown: 0,
            recent_capacity: policy.recent_capacity.max(1),
            low_water_mark: policy.low_water_mark,
            rng,
        }
    }

    /// Starts over with `cards`. Later duplicates of a word are dropped.
    pub fn reset(&mut self, cards: Vec<Card>) {
        self.all.clear();
        self.ids.clear();
        self.available.clear();
        self.recent.clear();
        self.retired.clear();
        self.forward.clear();
        self.current = None;
        self.total_shown = 0;
        self.ingest(cards);
    }

    /// Adds newly loaded cards to the session and reshuffles the pool.
    /// Returns how many were new.
    pub fn ingest(&mut self, cards: Vec<Card>) -> usize {
        let before = self.all.len();
        for card in cards {
            if !self.ids.insert(card.word.clone()) {
                log::debug!("Ignoring duplicate card {}", card.word);
                continue;
            }
            self.all.push(card.clone());
            self.available.push(card);
        }
        let added = self.all.len() - before;
        if added > 0 {
            self.available.shuffle(&mut self.rng);
            self.forward.clear();
        }
        added
    }

    /// Shows the next card: a card undone by `go_back` if there is one,
    /// otherwise a uniformly random available card.
    ///
    /// `all_pages_loaded` decides whether the card evicted from the recency
    /// buffer may return to the pool right away.
    pub fn draw_next(&mut self, all_pages_loaded: bool) -> Result<Card, PoolEmpty> {
        let card = match self.forward.pop() {
            Some(card) => {
                self.remove_available(&card.word);
                card
            }
            None => {
                if self.available.is_empty() {
                    return Err(PoolEmpty);
                }
                let index = self.rng.random_range(0..self.available.len());
                self.available.swap_remove(index)
            }
        };
        self.show(card.clone(), all_pages_loaded);
        Ok(card)
    }

    /// Draws straight from `available` without replaying history.
    pub fn fallback_draw(&mut self, all_pages_loaded: bool) -> Option<Card> {
        self.forward.clear();
        let card = self.available.pop()?;
        self.show(card.clone(), all_pages_loaded);
        Some(card)
    }

    fn show(&mut self, card: Card, all_pages_loaded: bool) {
        self.recent.push_back(card.clone());
        self.current = Some(card);
        self.total_shown += 1;

        if self.recent.len() > self.recent_capacity {
            if let Some(evicted) = self.recent.pop_front() {
                if all_pages_loaded && self.available.len() < self.low_water_mark {
                    log::debug!("Returning {} to the pool", evicted.word);
                    self.available.push(evicted);
                } else {
                    self.retired.push(evicted);
                }
            }
        }
    }

    /// Puts shown cards back into the pool once the supply has run dry.
    ///
    /// Retired cards come back first and the recency buffer is left alone.
    /// With nothing retired the recency buffer itself is recycled, except
    /// the current card when there is any other, so the next draw is not an
    /// immediate repeat. Returns `false` if there was nothing to recycle.
    pub fn recycle(&mut self) -> bool {
        self.forward.clear();
        let mut returned: Vec<Card> = if self.retired.is_empty() {
            let mut shown: Vec<Card> = self.recent.drain(..).collect();
            if shown.len() > 1 {
                if let Some(current) = &self.current {
                    if let Some(pos) = shown.iter().position(|c| c.word == current.word) {
                        self.recent.push_back(shown.remove(pos));
                    }
                }
            }
            shown
        } else {
            self.retired.drain(..).collect()
        };

        returned.retain(|card| !self.available.iter().any(|a| a.word == card.word));
        if returned.is_empty() {
            return false;
        }

        log::info!("Recycling {} shown cards", returned.len());
        self.available.extend(returned);
        self.available.shuffle(&mut self.rng);
        true
    }

    /// Steps back to the previously shown card.
    pub fn go_back(&mut self) -> Result<Card, NoHistory> {
        if self.recent.len() < 2 {
            return Err(NoHistory);
        }
        let Some(undone) = self.recent.pop_back() else {
            return Err(NoHistory);
        };

        if !self.available.iter().any(|c| c.word == undone.word) {
            self.available.push(undone.clone());
        }
        self.forward.push(undone);

        let previous = self.recent.back().cloned().ok_or(NoHistory)?;
        self.remove_available(&previous.word);
        self.total_shown = self.total_shown.saturating_sub(1);
        self.current = Some(previous.clone());
        Ok(previous)
    }

    fn remove_available(&mut self, id: &CardId) {
        if let Some(pos) = self.available.iter().position(|c| &c.word == id) {
            self.available.swap_remove(pos);
        }
    }

    /// No card can be drawn or recycled. With pages left to load this is
    /// not terminal.
    pub fn is_drained(&self) -> bool {
        self.available.is_empty() && self.recent.is_empty() && self.retired.is_empty()
    }

    pub fn current(&self) -> Option<&Card> {
        self.current.as_ref()
    }

    pub fn all_cards(&self) -> &[Card] {
        &self.all
    }

    pub fn available_len(&self) -> usize {
        self.available.len()
    }

    pub fn recent(&self) -> impl Iterator<Item = &Card> {
        self.recent.iter()
    }

    pub fn recent_len(&self) -> usize {
        self.recent.len()
    }

    pub fn total_shown(&self) -> usize {
        self.total_shown
    }

    pub fn can_go_back(&self) -> bool {
        self.recent.len() > 1
    }

    #[cfg(test)]
    fn is_available(&self, id: &CardId) -> bool {
        self.available.iter().any(|c| &c.word == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cards(n: usize) -> Vec<Card> {
        (0..n).map(|i| Card::new(format!("wort{i}"))).collect()
    }

    fn pool(n: usize) -> CardPool {
        let mut pool = CardPool::seeded(&SelectionPolicy::default(), 7);
        pool.reset(cards(n));
        pool
    }

    fn assert_disjoint(pool: &CardPool) {
        for card in pool.recent() {
            assert!(!pool.is_available(&card.word), "{} in both", card.word);
        }
    }

    #[test]
    fn draw_moves_card_from_available_to_recent() {
        let mut pool = pool(3);
        let card = pool.draw_next(false).unwrap();
        assert_eq!(pool.current(), Some(&card));
        assert_eq!(pool.available_len(), 2);
        assert_eq!(pool.recent_len(), 1);
        assert_eq!(pool.total_shown(), 1);
        assert_disjoint(&pool);
    }

    #[test]
    fn empty_pool_reports_pool_empty() {
        let mut pool = pool(0);
        assert_eq!(pool.draw_next(true), Err(PoolEmpty));
        assert!(pool.is_drained());
    }

    #[test]
    fn duplicates_are_ignored_on_ingest() {
        let mut pool = pool(2);
        let added = pool.ingest(vec![Card::new("wort1"), Card::new("neu")]);
        assert_eq!(added, 1);
        assert_eq!(pool.all_cards().len(), 3);
    }

    #[test]
    fn no_repeat_within_recency_window() {
        let mut pool = pool(40);
        let mut history: Vec<CardId> = Vec::new();
        for _ in 0..200 {
            let card = match pool.draw_next(true) {
                Ok(card) => card,
                Err(PoolEmpty) => {
                    assert!(pool.recycle());
                    pool.draw_next(true).unwrap()
                }
            };
            let window = history.len().min(6);
            assert!(!history[history.len() - window..].contains(&card.word));
            history.push(card.word);
            assert_disjoint(&pool);
        }
    }

    #[test]
    fn eviction_retires_cards_while_pages_remain() {
        let mut pool = pool(8);
        for _ in 0..8 {
            pool.draw_next(false).unwrap();
        }
        assert_eq!(pool.recent_len(), 6);
        assert_eq!(pool.available_len(), 0);
        assert_eq!(pool.draw_next(false), Err(PoolEmpty));
        assert!(!pool.is_drained());
    }

    #[test]
    fn eviction_refills_low_pool_once_pages_are_loaded() {
        let mut pool = pool(8);
        for _ in 0..7 {
            pool.draw_next(true).unwrap();
        }
        // the seventh draw evicted the first card back into the pool
        assert_eq!(pool.available_len(), 2);
        assert_eq!(pool.recent_len(), 6);
        assert_disjoint(&pool);
    }

    #[test]
    fn recycle_keeps_current_out_of_the_pool() {
        let mut pool = pool(3);
        for _ in 0..3 {
            pool.draw_next(false).unwrap();
        }
        let current = pool.current().cloned().unwrap();
        assert!(pool.recycle());
        assert_eq!(pool.available_len(), 2);
        assert_eq!(pool.total_shown(), 3);
        let next = pool.draw_next(false).unwrap();
        assert_ne!(next, current);
    }

    #[test]
    fn recycle_prefers_retired_cards_over_recent_ones() {
        let mut pool = pool(8);
        let mut shown = Vec::new();
        for _ in 0..8 {
            shown.push(pool.draw_next(false).unwrap().word);
        }
        assert!(pool.recycle());
        assert_eq!(pool.available_len(), 2);
        assert_eq!(pool.recent_len(), 6);
        let next = pool.draw_next(false).unwrap();
        assert!(shown[..2].contains(&next.word));
        assert_disjoint(&pool);
    }

    #[test]
    fn single_card_session_recycles_itself() {
        let mut pool = pool(1);
        let first = pool.draw_next(false).unwrap();
        assert_eq!(pool.draw_next(false), Err(PoolEmpty));
        assert!(pool.recycle());
        assert_eq!(pool.draw_next(false).unwrap(), first);
    }

    #[test]
    fn recycle_with_nothing_shown_fails() {
        let mut pool = pool(0);
        assert!(!pool.recycle());
    }

    #[test]
    fn go_back_restores_previous_card() {
        let mut pool = pool(10);
        let first = pool.draw_next(false).unwrap();
        let second = pool.draw_next(false).unwrap();

        let back = pool.go_back().unwrap();
        assert_eq!(back, first);
        assert_eq!(pool.current(), Some(&first));
        assert_eq!(pool.total_shown(), 1);
        assert!(pool.is_available(&second.word));
        assert_disjoint(&pool);
    }

    #[test]
    fn draw_after_go_back_replays_the_undone_card() {
        let mut pool = pool(10);
        pool.draw_next(false).unwrap();
        pool.draw_next(false).unwrap();
        let third = pool.draw_next(false).unwrap();
        pool.go_back().unwrap();
        assert_eq!(pool.draw_next(false).unwrap(), third);
        assert_eq!(pool.total_shown(), 3);
        assert_disjoint(&pool);
    }

    #[test]
    fn go_back_needs_two_shown_cards() {
        let mut pool = pool(5);
        assert_eq!(pool.go_back(), Err(NoHistory));
        pool.draw_next(false).unwrap();
        assert_eq!(pool.go_back(), Err(NoHistory));
        assert_eq!(pool.total_shown(), 1);
    }

    #[test]
    fn repeated_go_back_never_underflows() {
        let mut pool = pool(10);
        for _ in 0..4 {
            pool.draw_next(false).unwrap();
        }
        while pool.go_back().is_ok() {}
        assert_eq!(pool.total_shown(), 1);
        assert_eq!(pool.recent_len(), 1);
    }

    #[test]
    fn ingest_clears_replay_history() {
        let mut pool = pool(10);
        pool.draw_next(false).unwrap();
        pool.draw_next(false).unwrap();
        pool.go_back().unwrap();
        pool.ingest(vec![Card::new("neu")]);
        assert!(pool.forward.is_empty());
    }

    #[test]
    fn reset_clears_counters_and_history() {
        let mut pool = pool(5);
        pool.draw_next(false).unwrap();
        pool.draw_next(false).unwrap();
        pool.reset(cards(3));
        assert_eq!(pool.total_shown(), 0);
        assert_eq!(pool.recent_len(), 0);
        assert!(pool.current().is_none());
        assert_eq!(pool.available_len(), 3);
    }
}
