//! Per-ticker data resolution for the runner.
//!
//! Fallback policy, in order:
//! 1. Cached bars (plus the cached fundamentals sidecar, if any), when the
//!    cache covers the requested range or no provider is reachable
//! 2. Download through the provider, then re-read from the cache
//! 3. Whatever the cache holds, if the refresh download failed
//! 4. Synthetic bars, only when `synthetic` is set (tagged in the summary)
//! 5. Otherwise fail for that ticker
//!
//! Synthetic data is a developer-only mode and never carries fundamentals.

use chrono::{Datelike, NaiveDate, Weekday};
use thiserror::Error;
use tickerlens_core::data::{
    download_single, CoverageResult, DataError, DataProvider, DataSource, FundamentalsFetch,
    ParquetCache,
};
use tickerlens_core::domain::PriceBar;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no cached data for '{symbol}' and no network access (use --synthetic for synthetic data)")]
    NoCachedDataOffline { symbol: String },

    #[error("no cached data for '{symbol}' and download failed: {reason}")]
    DownloadFailed { symbol: String, reason: String },

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

/// Days the cached range may fall short of the request at either end
/// before a refresh is attempted. Covers weekends and market holidays.
const COVERAGE_SLACK_DAYS: i64 = 4;

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Never make network requests.
    pub offline: bool,
    /// Generate synthetic bars when real data is unavailable.
    pub synthetic: bool,
    /// Re-download even if cached.
    pub force: bool,
}

/// Everything the pipeline needs for one ticker, plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedTicker {
    pub symbol: String,
    pub name: Option<String>,
    pub bars: Vec<PriceBar>,
    pub fundamentals: FundamentalsFetch,
    pub source: DataSource,
    /// BLAKE3 over the bars handed to the pipeline.
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

pub fn load_ticker(
    symbol: &str,
    cache: &ParquetCache,
    provider: Option<&dyn DataProvider>,
    opts: &LoadOptions,
) -> Result<LoadedTicker, LoadError> {
    let online = provider.filter(|p| !opts.offline && p.is_available());

    let mut cached = if opts.force { None } else { cached_bars(symbol, cache, opts) };
    if online.is_none() || covers_request(symbol, cache, opts) {
        if let Some(bars) = cached.take() {
            tracing::debug!(symbol, bars = bars.len(), "using cached bars");
            let fundamentals = cached_or_fetched_fundamentals(symbol, cache, online, &bars);
            return Ok(loaded(symbol, cache, bars, fundamentals, DataSource::Cache));
        }
    }

    let mut download_error = None;
    if let Some(prov) = online {
        tracing::info!(symbol, provider = prov.name(), "downloading");
        match download_single(prov, cache, symbol, opts.start, opts.end) {
            Ok(()) => {
                let bars = cached_bars(symbol, cache, opts).ok_or_else(|| LoadError::DownloadFailed {
                    symbol: symbol.to_string(),
                    reason: "provider returned no bars in the requested range".into(),
                })?;
                let fundamentals = cache
                    .load_fundamentals(symbol)
                    .unwrap_or_else(FundamentalsFetch::unavailable);
                return Ok(loaded(symbol, cache, bars, fundamentals, DataSource::YahooFinance));
            }
            Err(e) => {
                if let Some(bars) = cached.take() {
                    tracing::warn!(symbol, error = %e, "refresh failed, using cached bars");
                    let fundamentals = cache
                        .load_fundamentals(symbol)
                        .unwrap_or_else(FundamentalsFetch::unavailable);
                    return Ok(loaded(symbol, cache, bars, fundamentals, DataSource::Cache));
                }
                tracing::warn!(symbol, error = %e, "download failed");
                download_error = Some(e);
            }
        }
    }

    if opts.synthetic {
        tracing::warn!(symbol, "generating synthetic data; results will be tagged as synthetic");
        let bars = generate_synthetic_bars(symbol, opts.start, opts.end);
        let dataset_hash = compute_dataset_hash(symbol, &bars);
        return Ok(LoadedTicker {
            symbol: symbol.to_string(),
            name: None,
            bars,
            fundamentals: FundamentalsFetch::unavailable(),
            source: DataSource::Synthetic,
            dataset_hash,
            has_synthetic: true,
        });
    }

    match download_error {
        Some(e) => Err(LoadError::DownloadFailed {
            symbol: symbol.to_string(),
            reason: e.to_string(),
        }),
        None if opts.offline || provider.is_none() => Err(LoadError::NoCachedDataOffline {
            symbol: symbol.to_string(),
        }),
        None => Err(LoadError::DownloadFailed {
            symbol: symbol.to_string(),
            reason: "provider unavailable (circuit breaker open)".into(),
        }),
    }
}

/// Cached bars inside `[start, end]`, or `None` when nothing usable is cached.
fn cached_bars(symbol: &str, cache: &ParquetCache, opts: &LoadOptions) -> Option<Vec<PriceBar>> {
    let bars = match cache.load(symbol) {
        Ok(bars) => bars,
        Err(DataError::NoCachedData { .. }) => return None,
        Err(e) => {
            tracing::warn!(symbol, error = %e, "cache read failed");
            return None;
        }
    };
    let in_range: Vec<PriceBar> = bars
        .into_iter()
        .filter(|b| b.date >= opts.start && b.date <= opts.end)
        .collect();
    (!in_range.is_empty()).then_some(in_range)
}

fn covers_request(symbol: &str, cache: &ParquetCache, opts: &LoadOptions) -> bool {
    let slack = chrono::Duration::days(COVERAGE_SLACK_DAYS);
    match cache.covers_range(symbol, opts.start + slack, opts.end - slack) {
        CoverageResult::FullyCovered => true,
        CoverageResult::NotCached => false,
        CoverageResult::PartiallyCovered {
            cached_start,
            cached_end,
        } => {
            tracing::debug!(symbol, %cached_start, %cached_end, "cache does not cover request");
            false
        }
    }
}

fn cached_or_fetched_fundamentals(
    symbol: &str,
    cache: &ParquetCache,
    provider: Option<&dyn DataProvider>,
    bars: &[PriceBar],
) -> FundamentalsFetch {
    if let Some(f) = cache.load_fundamentals(symbol) {
        return f;
    }
    let Some(prov) = provider else {
        return FundamentalsFetch::unavailable();
    };
    let last_close = bars.iter().rev().find_map(PriceBar::close);
    match prov.fetch_fundamentals(symbol, last_close) {
        Ok(f) => {
            if let Err(e) = cache.write_fundamentals(symbol, &f) {
                tracing::warn!(symbol, error = %e, "could not cache fundamentals");
            }
            f
        }
        Err(e) => {
            tracing::warn!(symbol, error = %e, "fundamentals fetch failed");
            FundamentalsFetch::unavailable()
        }
    }
}

fn loaded(
    symbol: &str,
    cache: &ParquetCache,
    bars: Vec<PriceBar>,
    fundamentals: FundamentalsFetch,
    source: DataSource,
) -> LoadedTicker {
    let dataset_hash = compute_dataset_hash(symbol, &bars);
    LoadedTicker {
        symbol: symbol.to_string(),
        name: cache.get_meta(symbol).and_then(|m| m.name),
        bars,
        fundamentals,
        source,
        dataset_hash,
        has_synthetic: false,
    }
}

/// Deterministic BLAKE3 hash over the symbol and every bar's date and OHLCV.
pub fn compute_dataset_hash(symbol: &str, bars: &[PriceBar]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(symbol.as_bytes());
    for bar in bars {
        hasher.update(bar.date.to_string().as_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Random walk from 100.0 on weekdays, seeded by the symbol so repeated runs match.
pub fn generate_synthetic_bars(symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<PriceBar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut bars = Vec::new();
    let mut price = 100.0_f64;
    let mut current = start;

    while current <= end {
        if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            current += chrono::Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + daily_return);
        bars.push(PriceBar {
            date: current,
            open,
            high: open.max(close) * (1.0 + rng.gen_range(0.0..0.01)),
            low: open.min(close) * (1.0 - rng.gen_range(0.0..0.01)),
            close,
            volume: rng.gen_range(500_000..5_000_000u64),
        });

        price = close;
        current += chrono::Duration::days(1);
    }

    bars
}
