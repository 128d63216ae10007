//! Error types for fetching, caching and looking up rates.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of a [`RateSource`](crate::core::rate::RateSource) fetch.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error: {status} from {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("unexpected rate table: {0}")]
    Parse(String),
}

/// Failures reading or writing the persisted rate files.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid data in {}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate and country files in {} disagree on currency codes", path.display())]
    Inconsistent { path: PathBuf },

    #[error("invalid rates in {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}

#[derive(Error, Debug)]
pub enum RateError {
    #[error("exchange rates unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    #[error("unknown currency code: {0}")]
    UnknownCode(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T, E = RateError> = std::result::Result<T, E>;
