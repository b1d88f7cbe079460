use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Database error: {0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Fetch(#[from] FetchError),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Unknown command '{0}'")]
    UnknownCommand(String),

    #[error("No user is logged in, run `gator login <name>` first")]
    NotLoggedIn,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failure to retrieve or decode a feed document.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("{url} is not a readable RSS document: {reason}")]
    Parse { url: String, reason: String },
}

impl FetchError {
    pub fn is_network(&self) -> bool {
        matches!(self, FetchError::Network { .. } | FetchError::Status { .. })
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("{0}")]
    Other(String),
}

impl From<tokio_rusqlite::Error> for StorageError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::Rusqlite(e) => e.into(),
            other => StorageError::Other(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        if is_unique_violation(&err) {
            return StorageError::ConstraintViolation(err.to_string());
        }
        match err {
            rusqlite::Error::QueryReturnedNoRows => StorageError::NotFound("row".to_string()),
            other => StorageError::Other(other.to_string()),
        }
    }
}

/// True when SQLite rejected a write because of a UNIQUE or PRIMARY KEY
/// constraint. Other constraint kinds (foreign keys, NOT NULL) are real
/// failures and are not reported here.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == rusqlite::ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("storing post {url} failed after {inserted} new post(s): {source}")]
    Storage {
        url: String,
        inserted: usize,
        #[source]
        source: StorageError,
    },
}

/// Why a single fetch cycle did not complete. None of these stop the loop.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("no feeds to fetch")]
    NoFeeds,

    #[error("could not select the next feed: {0}")]
    Select(#[source] StorageError),

    #[error("could not mark {url} as fetched: {source}")]
    MarkFetched {
        url: String,
        #[source]
        source: StorageError,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("ingesting {url}: {source}")]
    Ingest {
        url: String,
        #[source]
        source: IngestError,
    },
}
