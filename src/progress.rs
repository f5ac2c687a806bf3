use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::card::CardId;
use crate::error::Result;
use crate::storage::{ExportSink, KeyValueStore};

pub const PROGRESS_KEY: &str = "flashcardProgress";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Known,
    Unknown,
    Review,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Known => "known",
            Status::Unknown => "unknown",
            Status::Review => "review",
        })
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "k" | "known" => Ok(Status::Known),
            "u" | "unknown" => Ok(Status::Unknown),
            "r" | "review" => Ok(Status::Review),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub known: usize,
    pub unknown: usize,
    pub review: usize,
}

impl StatusCounts {
    fn add(&mut self, status: Status) {
        match status {
            Status::Known => self.known += 1,
            Status::Unknown => self.unknown += 1,
            Status::Review => self.review += 1,
        }
    }
}

/// Study statistics over the cards of one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub known: usize,
    pub unknown: usize,
    pub review: usize,
    /// Percentage of cards marked known or review, rounded.
    pub completion: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredProgress {
    #[serde(default)]
    card_statuses: BTreeMap<CardId, Status>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredProgressRef<'a> {
    card_statuses: &'a BTreeMap<CardId, Status>,
    timestamp: DateTime<Utc>,
}

/// What `export` hands to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressExport {
    pub card_statuses: BTreeMap<CardId, Status>,
    pub timestamp: DateTime<Utc>,
    pub total_cards: usize,
    pub statistics: StatusCounts,
}

impl ProgressExport {
    pub fn filename(&self) -> String {
        format!("flashcard-progress-{}.json", self.timestamp.format("%Y-%m-%d"))
    }
}

/// Per-word study status, written through to a key-value store on every
/// change.
#[derive(Debug)]
pub struct ProgressStore<K> {
    store: K,
    statuses: BTreeMap<CardId, Status>,
}

impl<K: KeyValueStore> ProgressStore<K> {
    /// Loads saved progress. Unreadable data is logged and ignored.
    pub fn open(store: K) -> Self {
        let statuses = match store.get(PROGRESS_KEY) {
            Ok(Some(json)) => match serde_json::from_str::<StoredProgress>(&json) {
                Ok(saved) => saved.card_statuses,
                Err(e) => {
                    log::warn!("Error loading progress: {e}. Starting fresh.");
                    BTreeMap::new()
                }
            },
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                log::warn!("Error reading progress: {e}. Starting fresh.");
                BTreeMap::new()
            }
        };
        log::debug!("Loaded progress for {} words", statuses.len());
        Self { store, statuses }
    }

    pub fn mark(&mut self, word: &CardId, status: Status) -> Result<()> {
        self.statuses.insert(word.clone(), status);
        self.save()
    }

    fn save(&mut self) -> Result<()> {
        let stored = StoredProgressRef {
            card_statuses: &self.statuses,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&stored)?;
        self.store.set(PROGRESS_KEY, &json)
    }

    pub fn status(&self, word: &CardId) -> Option<Status> {
        self.statuses.get(word).copied()
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Counts over every recorded word.
    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for &status in self.statuses.values() {
            counts.add(status);
        }
        counts
    }

    /// Statistics for the given session cards; unmarked cards only count
    /// towards the total.
    pub fn stats<'a>(&self, cards: impl IntoIterator<Item = &'a CardId>) -> Stats {
        let mut total = 0;
        let mut counts = StatusCounts::default();
        for card in cards {
            total += 1;
            if let Some(status) = self.status(card) {
                counts.add(status);
            }
        }
        let completion = if total == 0 {
            0
        } else {
            ((counts.known + counts.review) as f64 * 100.0 / total as f64).round() as u32
        };
        Stats {
            total,
            known: counts.known,
            unknown: counts.unknown,
            review: counts.review,
            completion,
        }
    }

    pub fn export_payload(&self, total_cards: usize, now: DateTime<Utc>) -> ProgressExport {
        ProgressExport {
            card_statuses: self.statuses.clone(),
            timestamp: now,
            total_cards,
            statistics: self.counts(),
        }
    }

    pub fn export(&self, total_cards: usize, sink: &mut impl ExportSink) -> Result<PathBuf> {
        self.export_at(total_cards, Utc::now(), sink)
    }

    pub fn export_at(
        &self,
        total_cards: usize,
        now: DateTime<Utc>,
        sink: &mut impl ExportSink,
    ) -> Result<PathBuf> {
        let payload = self.export_payload(total_cards, now);
        let json = serde_json::to_string_pretty(&payload)?;
        sink.deliver(&payload.filename(), json.as_bytes())
    }

    /// Merges statuses from an export (or a saved progress blob) over the
    /// current ones. Returns how many words were imported.
    pub fn import(&mut self, json: &str) -> Result<usize> {
        let imported: StoredProgress = serde_json::from_str(json)?;
        let count = imported.card_statuses.len();
        self.statuses.extend(imported.card_statuses);
        self.save()?;
        log::info!("Imported progress for {count} words");
        Ok(count)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.statuses.clear();
        self.store.remove(PROGRESS_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::TimeZone;

    struct CaptureSink {
        delivered: Vec<(String, String)>,
    }

    impl ExportSink for CaptureSink {
        fn deliver(&mut self, filename: &str, payload: &[u8]) -> Result<PathBuf> {
            self.delivered
                .push((filename.to_string(), String::from_utf8_lossy(payload).into_owned()));
            Ok(PathBuf::from(filename))
        }
    }

    fn ids(n: usize) -> Vec<CardId> {
        (0..n).map(|i| CardId::new(format!("w{i}"))).collect()
    }

    #[test]
    fn completion_counts_known_and_review() {
        let mut progress = ProgressStore::open(MemoryStore::new());
        let cards = ids(10);
        for card in &cards[..3] {
            progress.mark(card, Status::Known).unwrap();
        }
        for card in &cards[3..5] {
            progress.mark(card, Status::Review).unwrap();
        }
        let stats = progress.stats(&cards);
        assert_eq!(
            stats,
            Stats {
                total: 10,
                known: 3,
                unknown: 0,
                review: 2,
                completion: 50
            }
        );
    }

    #[test]
    fn empty_session_has_zero_completion() {
        let progress = ProgressStore::open(MemoryStore::new());
        assert_eq!(progress.stats(&[]).completion, 0);
    }

    #[test]
    fn completion_is_rounded() {
        let mut progress = ProgressStore::open(MemoryStore::new());
        let cards = ids(3);
        progress.mark(&cards[0], Status::Known).unwrap();
        progress.mark(&cards[1], Status::Unknown).unwrap();
        assert_eq!(progress.stats(&cards).completion, 33);
        progress.mark(&cards[1], Status::Review).unwrap();
        assert_eq!(progress.stats(&cards).completion, 67);
    }

    #[test]
    fn marks_survive_reopening_the_store() {
        let mut progress = ProgressStore::open(MemoryStore::new());
        progress.mark(&CardId::new("der Hund"), Status::Review).unwrap();
        let store = progress.store.clone();

        let reopened = ProgressStore::open(store);
        assert_eq!(reopened.status(&CardId::new("der Hund")), Some(Status::Review));
        assert_eq!(reopened.status(&CardId::new("Hund")), None);
    }

    #[test]
    fn corrupt_saved_progress_starts_fresh() {
        let mut store = MemoryStore::new();
        store.set(PROGRESS_KEY, "not json").unwrap();
        assert!(ProgressStore::open(store).is_empty());
    }

    #[test]
    fn export_includes_counts_and_dated_filename() {
        let mut progress = ProgressStore::open(MemoryStore::new());
        progress.mark(&CardId::new("a"), Status::Known).unwrap();
        progress.mark(&CardId::new("b"), Status::Unknown).unwrap();

        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let mut sink = CaptureSink { delivered: Vec::new() };
        progress.export_at(42, now, &mut sink).unwrap();

        let (filename, json) = &sink.delivered[0];
        assert_eq!(filename, "flashcard-progress-2024-03-09.json");
        let payload: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(payload["totalCards"], 42);
        assert_eq!(payload["cardStatuses"]["a"], "known");
        assert_eq!(payload["statistics"]["unknown"], 1);
        assert_eq!(payload["statistics"]["review"], 0);
    }

    #[test]
    fn import_merges_exported_statuses() {
        let mut progress = ProgressStore::open(MemoryStore::new());
        progress.mark(&CardId::new("a"), Status::Unknown).unwrap();
        progress.mark(&CardId::new("c"), Status::Known).unwrap();

        let exported = r#"{
            "cardStatuses": {"a": "known", "b": "review"},
            "timestamp": "2024-03-09T12:00:00.000Z",
            "totalCards": 2,
            "statistics": {"known": 1, "unknown": 0, "review": 1}
        }"#;
        assert_eq!(progress.import(exported).unwrap(), 2);
        assert_eq!(progress.status(&CardId::new("a")), Some(Status::Known));
        assert_eq!(progress.status(&CardId::new("b")), Some(Status::Review));
        assert_eq!(progress.status(&CardId::new("c")), Some(Status::Known));
    }

    #[test]
    fn clear_erases_saved_progress() {
        let mut progress = ProgressStore::open(MemoryStore::new());
        progress.mark(&CardId::new("a"), Status::Known).unwrap();
        progress.clear().unwrap();
        assert!(progress.is_empty());
        assert_eq!(progress.store.get(PROGRESS_KEY).unwrap(), None);
    }

    #[test]
    fn status_parses_short_and_long_forms() {
        assert_eq!("k".parse::<Status>(), Ok(Status::Known));
        assert_eq!("Review".parse::<Status>(), Ok(Status::Review));
        assert!("maybe".parse::<Status>().is_err());
    }
}
