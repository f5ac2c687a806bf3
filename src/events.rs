use crate::card::Card;
use crate::progress::Stats;

/// Notifications for whatever is presenting the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ModeChanged { mode: String, cards: usize },
    CardChanged { card: Card, shown: usize },
    /// Nothing left to draw, load or recycle.
    Exhausted,
    PagesLoaded {
        cards_added: usize,
        loaded_pages: usize,
        total_pages: usize,
    },
    StatsChanged(Stats),
}
