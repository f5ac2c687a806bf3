use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod card;
pub mod config;
pub mod error;
pub mod events;
pub mod flag;
pub mod links;
pub mod pages;
pub mod pool;
pub mod progress;
pub mod selection;
pub mod sources;
pub mod storage;
pub mod table;
pub mod trainer;
pub mod translate;
pub mod words;

pub use card::{Card, CardId};
pub use config::{Config, LinksConfig, SelectionPolicy};
pub use error::{Error, Result};
pub use events::SessionEvent;
pub use links::QuickLinks;
pub use pages::PageStore;
pub use pool::CardPool;
pub use progress::{ProgressStore, Stats, Status};
pub use selection::{Selection, SelectionController, SessionSnapshot};
pub use sources::PageSource;
pub use storage::{ExportSink, KeyValueStore};
pub use trainer::{StudyMode, Trainer};

/// Locks a mutex, carrying on with the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
