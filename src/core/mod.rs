//! Core business logic abstractions

pub mod cache;
pub mod config;
pub mod error;
pub mod log;
pub mod rate;

// Re-export main types for cleaner imports
pub use cache::RateCache;
pub use error::{RateError, SourceError, StorageError};
pub use rate::{RateEntry, RateSnapshot, RateSource};
