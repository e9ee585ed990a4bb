//! Data layer: providers, ingest, caching, and the provider field synonym table.

pub mod cache;
pub mod circuit_breaker;
pub mod download;
pub mod ingest;
pub mod provider;
pub mod synonyms;
pub mod yahoo;

pub use cache::{CacheMeta, CacheStatus, CoverageResult, ParquetCache};
pub use circuit_breaker::CircuitBreaker;
pub use download::{download_single, download_symbols, DownloadSummary};
pub use ingest::{check_series, ingest, IngestResult, SeriesError};
pub use provider::{
    DataError, DataProvider, DataSource, DownloadProgress, FetchResult, FundamentalsFetch,
    FundamentalsSource, LogProgress, RawBar,
};
pub use yahoo::YahooProvider;
