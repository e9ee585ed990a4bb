//! Download orchestrator: multi-symbol fetch → ingest → cache, with progress.

use chrono::NaiveDate;

use super::cache::{CoverageResult, ParquetCache};
use super::ingest;
use super::provider::{DataError, DataProvider, DownloadProgress};

/// Download multiple symbols into the cache.
///
/// Symbols already covered for `[start, end]` are skipped unless `force`.
/// When the provider becomes unavailable mid-batch the remaining symbols
/// are marked failed without being requested.
pub fn download_symbols(
    provider: &dyn DataProvider,
    cache: &ParquetCache,
    symbols: &[&str],
    start: NaiveDate,
    end: NaiveDate,
    force: bool,
    progress: &dyn DownloadProgress,
) -> DownloadSummary {
    let total = symbols.len();
    let mut succeeded = 0;
    let mut errors: Vec<(String, DataError)> = Vec::new();

    for (i, symbol) in symbols.iter().enumerate() {
        progress.on_start(symbol, i, total);

        if !force && cache.covers_range(symbol, start, end) == CoverageResult::FullyCovered {
            tracing::debug!(symbol, "cache already covers range");
            progress.on_complete(symbol, i, total, &Ok(()));
            succeeded += 1;
            continue;
        }

        let result = download_single(provider, cache, symbol, start, end);
        progress.on_complete(symbol, i, total, &result);

        match result {
            Ok(()) => succeeded += 1,
            Err(e) => errors.push((symbol.to_string(), e)),
        }

        if !provider.is_available() {
            for sym in &symbols[(i + 1)..] {
                errors.push((sym.to_string(), DataError::CircuitBreakerTripped));
            }
            break;
        }
    }

    let failed = errors.len();
    progress.on_batch_complete(succeeded, failed, total);

    DownloadSummary {
        total,
        succeeded,
        failed,
        errors,
    }
}

/// Fetch, ingest and cache one symbol's bars, then its fundamentals.
///
/// A fundamentals failure is logged and leaves the bar cache in place.
pub fn download_single(
    provider: &dyn DataProvider,
    cache: &ParquetCache,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(), DataError> {
    let fetched = provider.fetch(symbol, start, end)?;
    let ingested = ingest::ingest(fetched.bars)?;
    if ingested.dropped_void > 0 {
        tracing::debug!(symbol, dropped = ingested.dropped_void, "dropped empty bars");
    }
    cache.write(symbol, fetched.name.as_deref(), &ingested.bars)?;

    let last_close = ingested.bars.iter().rev().find_map(|b| b.close());
    match provider.fetch_fundamentals(symbol, last_close) {
        Ok(fundamentals) => cache.write_fundamentals(symbol, &fundamentals)?,
        Err(e) => tracing::warn!(symbol, error = %e, "fundamentals fetch failed"),
    }
    Ok(())
}

#[derive(Debug)]
pub struct DownloadSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<(String, DataError)>,
}

impl DownloadSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::{
        DataSource, FetchResult, FundamentalsFetch, FundamentalsSource, RawBar,
    };
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FixtureProvider {
        calls: AtomicUsize,
        available: AtomicBool,
        trip_after_first: bool,
    }

    impl FixtureProvider {
        fn new(trip_after_first: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                available: AtomicBool::new(true),
                trip_after_first,
            }
        }
    }

    impl DataProvider for FixtureProvider {
        fn name(&self) -> &str {
            "fixture"
        }

        fn fetch(&self, symbol: &str, start: NaiveDate, _end: NaiveDate) -> Result<FetchResult, DataError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.trip_after_first {
                self.available.store(false, Ordering::Relaxed);
            }
            if symbol == "BAD" {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.into(),
                });
            }
            Ok(FetchResult {
                symbol: symbol.into(),
                name: Some(format!("{symbol} Inc")),
                bars: vec![RawBar {
                    date: start,
                    open: 10.0,
                    high: 11.0,
                    low: 9.0,
                    close: 10.5,
                    volume: 100,
                }],
                source: DataSource::YahooFinance,
            })
        }

        fn fetch_fundamentals(&self, _symbol: &str, _last_close: Option<f64>) -> Result<FundamentalsFetch, DataError> {
            Ok(FundamentalsFetch {
                source: FundamentalsSource::NoneAvailable,
                ..Default::default()
            })
        }

        fn is_available(&self) -> bool {
            self.available.load(Ordering::Relaxed)
        }
    }

    struct Silent;

    impl DownloadProgress for Silent {
        fn on_start(&self, _: &str, _: usize, _: usize) {}
        fn on_complete(&self, _: &str, _: usize, _: usize, _: &Result<(), DataError>) {}
        fn on_batch_complete(&self, _: usize, _: usize, _: usize) {}
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
    }

    #[test]
    fn downloads_and_caches_each_symbol() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let provider = FixtureProvider::new(false);

        let summary = download_symbols(&provider, &cache, &["NVDA", "BAD"], day(), day(), false, &Silent);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert!(!summary.all_succeeded());
        assert_eq!(cache.load("NVDA").unwrap().len(), 1);
        assert!(cache.load_fundamentals("NVDA").is_some());
    }

    #[test]
    fn covered_symbols_skip_the_provider() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let provider = FixtureProvider::new(false);

        download_symbols(&provider, &cache, &["NVDA"], day(), day(), false, &Silent);
        download_symbols(&provider, &cache, &["NVDA"], day(), day(), false, &Silent);
        assert_eq!(provider.calls.load(Ordering::Relaxed), 1);

        download_symbols(&provider, &cache, &["NVDA"], day(), day(), true, &Silent);
        assert_eq!(provider.calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn unavailable_provider_fails_remaining() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        let provider = FixtureProvider::new(true);

        let summary = download_symbols(&provider, &cache, &["A", "B", "C"], day(), day(), false, &Silent);
        assert_eq!(provider.calls.load(Ordering::Relaxed), 1);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 2);
        assert!(matches!(summary.errors[0].1, DataError::CircuitBreakerTripped));
    }
}
