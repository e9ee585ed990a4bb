//! Per-ticker orchestration: load → compute → persist → summarize.
//!
//! - `analyze_loaded()`: pure compute over already-loaded data.
//! - `run_ticker()`: one ticker end to end.
//! - `run_tickers()`: many tickers; loading and persisting are sequential,
//!   the pipeline runs in parallel.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tickerlens_core::data::{DataProvider, DataSource, FundamentalsSource, ParquetCache};
use tickerlens_core::domain::{SignalEvent, SignalKind};
use tickerlens_core::{compute_metrics, MetricsConfig, MetricsOutput, PipelineError};

use crate::config::ConfigError;
use crate::data_loader::{load_ticker, LoadError, LoadOptions, LoadedTicker};
use crate::store::{MetricsSink, PersistStats, StoreError};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Current summary schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// One signal as it appears in the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarySignal {
    pub ticker: String,
    pub date: NaiveDate,
    pub signal: SignalKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<BTreeMap<String, f64>>,
}

impl From<&SignalEvent> for SummarySignal {
    fn from(e: &SignalEvent) -> Self {
        Self {
            ticker: e.ticker.clone(),
            date: e.date,
            signal: e.kind,
            meta: e.metadata.clone(),
        }
    }
}

/// Report record for one ticker run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub ticker: String,
    /// Where the prices came from.
    pub price_source: DataSource,
    /// Which balance-sheet statement fed the fundamentals.
    #[serde(default)]
    pub source_used: FundamentalsSource,
    pub metrics_count: usize,
    pub signals: Vec<SummarySignal>,
    pub config: MetricsConfig,
    #[serde(default)]
    pub diagnostics: Vec<String>,
    pub dataset_hash: String,
    #[serde(default)]
    pub has_synthetic: bool,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Full result of one ticker: the summary plus the table it describes.
#[derive(Debug, Clone)]
pub struct TickerRun {
    pub summary: RunSummary,
    pub output: MetricsOutput,
    pub name: Option<String>,
    /// `None` when the run was not persisted.
    pub persisted: Option<PersistStats>,
}

/// Shared inputs for a batch of runs.
pub struct RunContext<'a> {
    pub cache: &'a ParquetCache,
    pub provider: Option<&'a dyn DataProvider>,
    pub load: LoadOptions,
    pub metrics: MetricsConfig,
}

/// Run the pipeline over loaded data and build the summary.
pub fn analyze_loaded(loaded: &LoadedTicker, config: &MetricsConfig) -> Result<TickerRun, PipelineError> {
    let output = compute_metrics(
        &loaded.symbol,
        &loaded.bars,
        &loaded.fundamentals.snapshots,
        &loaded.fundamentals.info,
        config,
    )?;

    let summary = RunSummary {
        schema_version: SCHEMA_VERSION,
        ticker: loaded.symbol.clone(),
        price_source: loaded.source,
        source_used: loaded.fundamentals.source,
        metrics_count: output.rows.len(),
        signals: output.signals.iter().map(SummarySignal::from).collect(),
        config: output.config,
        diagnostics: output.diagnostics.messages(),
        dataset_hash: loaded.dataset_hash.clone(),
        has_synthetic: loaded.has_synthetic,
    };

    Ok(TickerRun {
        summary,
        output,
        name: loaded.name.clone(),
        persisted: None,
    })
}

/// Load, compute and optionally persist one ticker.
pub fn run_ticker(
    symbol: &str,
    ctx: &RunContext<'_>,
    sink: Option<&mut dyn MetricsSink>,
) -> Result<TickerRun, RunError> {
    let loaded = load_ticker(symbol, ctx.cache, ctx.provider, &ctx.load)?;
    let mut run = analyze_loaded(&loaded, &ctx.metrics)?;
    log_diagnostics(&run);
    if let Some(sink) = sink {
        run.persisted = persist(sink, &run)?;
    }
    Ok(run)
}

/// Run every symbol; one failure never stops the others.
///
/// Results come back in input order.
pub fn run_tickers(
    symbols: &[&str],
    ctx: &RunContext<'_>,
    mut sink: Option<&mut dyn MetricsSink>,
) -> Vec<(String, Result<TickerRun, RunError>)> {
    let loaded: Vec<Result<LoadedTicker, RunError>> = symbols
        .iter()
        .map(|sym| load_ticker(sym, ctx.cache, ctx.provider, &ctx.load).map_err(RunError::from))
        .collect();

    let computed: Vec<Result<TickerRun, RunError>> = loaded
        .into_par_iter()
        .map(|l| l.and_then(|l| analyze_loaded(&l, &ctx.metrics).map_err(RunError::from)))
        .collect();

    symbols
        .iter()
        .zip(computed)
        .map(|(sym, result)| {
            let result = result.and_then(|mut run| {
                log_diagnostics(&run);
                if let Some(sink) = sink.as_deref_mut() {
                    run.persisted = persist(sink, &run)?;
                }
                Ok(run)
            });
            match &result {
                Ok(run) => tracing::info!(
                    ticker = *sym,
                    rows = run.summary.metrics_count,
                    signals = run.summary.signals.len(),
                    "ticker done"
                ),
                Err(e) => tracing::error!(ticker = *sym, error = %e, "ticker failed"),
            }
            (sym.to_string(), result)
        })
        .collect()
}

/// Synthetic runs are never written under a real ticker.
fn persist(sink: &mut dyn MetricsSink, run: &TickerRun) -> Result<Option<PersistStats>, StoreError> {
    let ticker = &run.summary.ticker;
    if run.summary.has_synthetic {
        tracing::warn!(ticker = ticker.as_str(), "synthetic data, skipping persistence");
        return Ok(None);
    }
    sink.upsert_ticker(ticker, run.name.as_deref())?;
    sink.persist(ticker, &run.output.rows, &run.output.signals).map(Some)
}

fn log_diagnostics(run: &TickerRun) {
    let ticker = run.summary.ticker.as_str();
    if run.summary.has_synthetic {
        tracing::warn!(ticker, "metrics computed on synthetic data");
    }
    for notice in run.output.diagnostics.iter() {
        tracing::warn!(ticker, "{notice}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use tickerlens_core::data::FundamentalsFetch;
    use tickerlens_core::domain::PriceBar;

    fn loaded_with_closes(closes: &[f64]) -> LoadedTicker {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let bars: Vec<PriceBar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar {
                date: start + chrono::Duration::days(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: 100,
            })
            .collect();
        LoadedTicker {
            symbol: "TEST".into(),
            name: Some("Test Inc".into()),
            dataset_hash: crate::data_loader::compute_dataset_hash("TEST", &bars),
            bars,
            fundamentals: FundamentalsFetch::unavailable(),
            source: DataSource::Cache,
            has_synthetic: false,
        }
    }

    #[test]
    fn summary_counts_rows_and_signals() {
        let loaded = loaded_with_closes(&[10.0, 9.0, 8.0, 12.0, 15.0, 16.0]);
        let config = MetricsConfig {
            sma_short_window: 2,
            sma_long_window: 4,
            rolling_days_for_52week: 5,
        };
        let run = analyze_loaded(&loaded, &config).unwrap();

        assert_eq!(run.summary.metrics_count, 6);
        assert_eq!(run.summary.signals.len(), run.output.signals.len());
        assert_eq!(run.summary.config, config);
        assert_eq!(run.summary.source_used, FundamentalsSource::NoneAvailable);
        assert!(run
            .summary
            .diagnostics
            .iter()
            .any(|m| m.contains("fundamentals")));
    }

    #[test]
    fn zero_window_reports_clamped_config() {
        let loaded = loaded_with_closes(&[1.0, 2.0, 3.0]);
        let config = MetricsConfig {
            sma_short_window: 0,
            ..Default::default()
        };
        let run = analyze_loaded(&loaded, &config).unwrap();
        assert_eq!(run.summary.config.sma_short_window, 1);
    }

    #[test]
    fn persist_through_sink() {
        let loaded = loaded_with_closes(&[5.0, 5.0, 5.0, 6.0, 7.0]);
        let mut run = analyze_loaded(&loaded, &MetricsConfig::default()).unwrap();
        let mut store = SqliteStore::open_in_memory().unwrap();

        run.persisted = persist(&mut store, &run).unwrap();
        assert_eq!(run.persisted.unwrap().metrics_written, 5);
        assert_eq!(store.daily_metrics("TEST").unwrap(), run.output.rows);
        assert_eq!(store.ticker_name("TEST").unwrap().as_deref(), Some("Test Inc"));
    }

    #[test]
    fn synthetic_run_is_not_persisted() {
        let mut loaded = loaded_with_closes(&[5.0, 5.0, 5.0, 6.0, 7.0]);
        loaded.source = DataSource::Synthetic;
        loaded.has_synthetic = true;
        let run = analyze_loaded(&loaded, &MetricsConfig::default()).unwrap();
        let mut store = SqliteStore::open_in_memory().unwrap();

        assert!(persist(&mut store, &run).unwrap().is_none());
        assert_eq!(store.metric_count("TEST").unwrap(), 0);
        assert!(store.ticker_name("TEST").unwrap().is_none());
    }

    #[test]
    fn summary_json_uses_plain_dates() {
        let loaded = loaded_with_closes(&[7.0, 6.0, 6.0, 5.0, 5.0]);
        let config = MetricsConfig {
            sma_short_window: 1,
            sma_long_window: 5,
            rolling_days_for_52week: 5,
        };
        let run = analyze_loaded(&loaded, &config).unwrap();
        let json = serde_json::to_value(&run.summary).unwrap();
        assert_eq!(json["price_source"], "cache");
        assert_eq!(json["source_used"], "none_available");

        let signals = json["signals"].as_array().unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0]["date"], "2020-01-02");
        assert_eq!(signals[0]["signal"], "death_cross");
    }
}
