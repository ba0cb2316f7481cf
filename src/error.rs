use thiserror::Error;

/// Library error type for slideshow operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A session descriptor is missing required fields or is inconsistent.
    #[error("invalid session descriptor: {0}")]
    BadDescriptor(String),

    /// A session names neither folders nor a search query.
    #[error("session has no folders and no search query")]
    NoSource,

    /// The engine task is gone; commands can no longer be delivered.
    #[error("playback engine is no longer running")]
    EngineClosed,

    /// Remote search failure.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON session descriptor error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),
}

/// Why a page of remote search results could not be fetched.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Transport(String),

    #[error("search server returned HTTP {0}")]
    Status(u16),

    #[error("unreadable search response: {0}")]
    Parse(String),

    #[error("search server reported: {0}")]
    Server(String),
}
