//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over market-data sources so the runner can
//! swap Yahoo for a fixture provider in tests.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ingest::SeriesError;
use crate::domain::{FundamentalSnapshot, PointInTimeInfo};

/// Raw daily OHLCV bar as the provider reported it (before ingest).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("invalid price series: {0}")]
    Validation(#[from] SeriesError),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("no cached data for symbol '{symbol}', run `download {symbol}` first")]
    NoCachedData { symbol: String },

    #[error("data error: {0}")]
    Other(String),
}

/// Result of a successful price fetch for a single symbol.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    /// Instrument display name, when the provider reports one.
    pub name: Option<String>,
    pub bars: Vec<RawBar>,
    pub source: DataSource,
}

/// Where the price data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    YahooFinance,
    Cache,
    Synthetic,
}

/// Which statement set the fundamentals were drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundamentalsSource {
    QuarterlyBalanceSheet,
    AnnualBalanceSheet,
    #[default]
    NoneAvailable,
}

impl FundamentalsSource {
    pub fn as_str(self) -> &'static str {
        match self {
            FundamentalsSource::QuarterlyBalanceSheet => "quarterly_balance_sheet",
            FundamentalsSource::AnnualBalanceSheet => "annual_balance_sheet",
            FundamentalsSource::NoneAvailable => "none_available",
        }
    }
}

impl fmt::Display for FundamentalsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fundamentals for one symbol: dated snapshots plus the "now" info record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsFetch {
    pub snapshots: Vec<FundamentalSnapshot>,
    pub info: PointInTimeInfo,
    pub source: FundamentalsSource,
}

impl FundamentalsFetch {
    pub fn unavailable() -> Self {
        Self::default()
    }
}

/// Trait for market-data providers.
///
/// The cache layer sits above this trait; providers don't know about the cache.
pub trait DataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch daily OHLCV bars for a symbol over a date range.
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> Result<FetchResult, DataError>;

    /// Fetch balance-sheet snapshots and the point-in-time info record.
    ///
    /// `last_close` lets the provider derive a market cap from the share
    /// count when it reports none directly.
    fn fetch_fundamentals(
        &self,
        symbol: &str,
        last_close: Option<f64>,
    ) -> Result<FundamentalsFetch, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}

/// Progress callback for multi-symbol operations.
pub trait DownloadProgress: Send {
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    fn on_complete(&self, symbol: &str, index: usize, total: usize, result: &Result<(), DataError>);

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that emits `tracing` events.
pub struct LogProgress;

impl DownloadProgress for LogProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        tracing::info!("[{}/{}] fetching {symbol}", index + 1, total);
    }

    fn on_complete(
        &self,
        symbol: &str,
        _index: usize,
        _total: usize,
        result: &Result<(), DataError>,
    ) {
        match result {
            Ok(()) => tracing::info!(symbol, "download ok"),
            Err(e) => tracing::warn!(symbol, error = %e, "download failed"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        tracing::info!("download complete: {succeeded}/{total} succeeded, {failed} failed");
    }
}
