use thiserror::Error;

use crate::models::Field;

/// Errors raised while crawling a single source.
///
/// `Fetch` and `Parse` are item-level and are always recovered by the
/// controller. `Session` and `Store` terminate only the source that
/// raised them.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("failed to parse {url}: {message}")]
    Parse { url: String, message: String },

    #[error("enrichment failed: {0}")]
    Enrichment(String),

    #[error("crawl session failed: {0}")]
    Session(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from the persistence sink.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the inference provider.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("inference provider rate limited the request")]
    RateLimited,

    #[error("inference provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("inference response had no content")]
    EmptyResponse,

    #[error("inference call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("inference response is not a JSON array: {0}")]
    Unparseable(String),
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },

    #[error("unknown LLM provider: {0}")]
    UnknownProvider(String),

    #[error("unknown fetch mode: {0}")]
    UnknownFetchMode(String),
}

/// Errors raised when constructing model values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid listing link: {0:?}")]
    InvalidLink(String),

    #[error("unparseable value {value:?} for field {field}")]
    UnparseableField { field: Field, value: String },
}
