use thiserror::Error;

/// Why a page contributed no cards.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("page {page} not found")]
    NotFound { page: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("page {page} is not valid UTF-8")]
    Encoding { page: usize },
}

/// No card is left in the available pool.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no cards available to draw")]
pub struct PoolEmpty;

/// Back-navigation requested before the first shown card.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no earlier card to go back to")]
pub struct NoHistory;

#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("prefetch task failed: {0}")]
    Prefetch(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL {0}")]
    InvalidUrl(String),

    #[error("page {page} is out of range (1..={total})")]
    PageOutOfRange { page: usize, total: usize },

    #[error("no cards found")]
    NoCards,

    #[error("no study session selected")]
    NoSession,

    #[error("no card is being shown")]
    NoCurrentCard,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
