//! tickerlens runner: orchestration around `tickerlens-core`.
//!
//! - TOML application config
//! - Data loading with cache/download/synthetic fallback
//! - Per-ticker and multi-ticker runs
//! - SQLite persistence of metric rows and signal events
//! - Run summaries with JSON and CSV export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use data_loader::{load_ticker, LoadError, LoadOptions, LoadedTicker};
pub use runner::{
    analyze_loaded, run_ticker, run_tickers, RunContext, RunError, RunSummary, SummarySignal,
    TickerRun,
};
pub use store::{MetricsSink, PersistStats, SqliteStore, StoreError};
