//! Source traits and structured error types.
//!
//! Two boundaries: the exchange origin that publishes one bulk file per
//! trading day ([`BulkFileSource`]) and the secondary provider of adjusted
//! closes ([`AdjustedCloseSource`]). Both are traits so the range fetcher
//! and the reconciler can be exercised against in-memory fakes.

use crate::domain::AdjustedPricePoint;
use chrono::NaiveDate;
use thiserror::Error;

/// What the origin returned for one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayFile {
    /// Raw bytes of the single file inside the day's archive, still in the
    /// origin's single-byte encoding.
    Published(Vec<u8>),
    /// No file for this date (holiday, not yet published). Not an error.
    NotPublished,
}

/// Transport-level failure fetching a day file.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("expected a single-entry archive, found {entries} entries")]
    UnexpectedEntries { entries: usize },

    #[error("archive entry is {size} bytes, limit is {limit}")]
    EntryTooLarge { size: u64, limit: u64 },

    #[error("I/O error reading archive entry: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Exchange origin of daily bulk files.
pub trait BulkFileSource: Send + Sync {
    /// Human-readable name of this origin.
    fn name(&self) -> &str;

    /// Fetch the bulk file for one trading day.
    fn fetch_day(&self, date: NaiveDate) -> Result<DayFile, FetchError>;
}

/// Failure fetching an adjusted close series.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("HTTP {status} for {symbol}")]
    Status { symbol: String, status: u16 },

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Secondary provider of dividend/split adjusted closes.
pub trait AdjustedCloseSource: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Adjusted closes for `symbol` (secondary-source form) in `[start, end]`.
    fn fetch_adjusted(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AdjustedPricePoint>, SourceError>;
}
