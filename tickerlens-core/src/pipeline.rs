//! Metrics pipeline: align → indicators → ratios → crossovers for one ticker.
//!
//! Pure function of its inputs. No I/O, no logging; data-quality findings
//! are returned as [`Diagnostics`].

use chrono::NaiveDate;
use thiserror::Error;

use crate::align::align_fundamentals;
use crate::config::MetricsConfig;
use crate::crossover::detect_crossovers;
use crate::data::ingest::{check_series, SeriesError};
use crate::diagnostics::{Diagnostics, Notice, LIMITED_HISTORY_BARS};
use crate::domain::{DailyMetricsRow, FundamentalSnapshot, PointInTimeInfo, PriceBar, SignalEvent};
use crate::indicators::{self, PCT_FROM_HIGH, ROLLING_HIGH, SMA_LONG, SMA_SHORT};
use crate::ratios::compute_ratios;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("{ticker}: {source}")]
    InvalidPrices {
        ticker: String,
        #[source]
        source: SeriesError,
    },
}

/// Everything one run produces for a ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsOutput {
    pub rows: Vec<DailyMetricsRow>,
    pub signals: Vec<SignalEvent>,
    pub diagnostics: Diagnostics,
    /// Windows actually used, after clamping.
    pub config: MetricsConfig,
}

/// Compute the daily metrics table and crossover events.
///
/// `bars` must be ascending, date-unique and satisfy the bar invariants;
/// anything else is an input-shape error and yields no rows. Missing
/// fundamentals or info only blank out the dependent columns.
pub fn compute_metrics(
    ticker: &str,
    bars: &[PriceBar],
    snapshots: &[FundamentalSnapshot],
    info: &PointInTimeInfo,
    config: &MetricsConfig,
) -> Result<MetricsOutput, PipelineError> {
    check_series(bars).map_err(|source| PipelineError::InvalidPrices {
        ticker: ticker.to_string(),
        source,
    })?;

    let (config, clamped) = config.normalized();
    let mut diagnostics = Diagnostics::new();
    diagnostics.extend(clamped);
    note_input_quality(&mut diagnostics, bars, snapshots, info, &config);

    let alignment = align_fundamentals(bars, snapshots);
    if !snapshots.is_empty() && alignment.unused_snapshots == snapshots.len() {
        diagnostics.push(Notice::SnapshotsAfterLastBar {
            count: alignment.unused_snapshots,
        });
    }

    let values = indicators::compute_all(bars, &config);

    let rows: Vec<DailyMetricsRow> = bars
        .iter()
        .zip(&alignment.rows)
        .enumerate()
        .map(|(i, (bar, aligned))| {
            let close = bar.close();
            let ratios = compute_ratios(close, &aligned.fields, info);
            DailyMetricsRow {
                ticker: ticker.to_string(),
                date: bar.date,
                close,
                sma_short: values.get(SMA_SHORT, i),
                sma_long: values.get(SMA_LONG, i),
                rolling_high: values.get(ROLLING_HIGH, i),
                pct_from_high: values.get(PCT_FROM_HIGH, i),
                bvps: ratios.bvps,
                pb_ratio: ratios.pb_ratio,
                enterprise_value: ratios.enterprise_value,
            }
        })
        .collect();

    let signals = signals_from_rows(ticker, &rows);

    Ok(MetricsOutput {
        rows,
        signals,
        diagnostics,
        config,
    })
}

/// Crossover events from the `sma_short` / `sma_long` columns of a table.
pub fn signals_from_rows(ticker: &str, rows: &[DailyMetricsRow]) -> Vec<SignalEvent> {
    let dates: Vec<NaiveDate> = rows.iter().map(|r| r.date).collect();
    let short: Vec<Option<f64>> = rows.iter().map(|r| r.sma_short).collect();
    let long: Vec<Option<f64>> = rows.iter().map(|r| r.sma_long).collect();
    detect_crossovers(ticker, &dates, &short, &long, SMA_SHORT, SMA_LONG)
}

fn note_input_quality(
    diagnostics: &mut Diagnostics,
    bars: &[PriceBar],
    snapshots: &[FundamentalSnapshot],
    info: &PointInTimeInfo,
    config: &MetricsConfig,
) {
    if snapshots.is_empty() {
        diagnostics.push(Notice::FundamentalsUnavailable);
    }
    if info.is_empty() {
        diagnostics.push(Notice::InfoUnavailable);
    }
    if info.market_cap.is_none() {
        diagnostics.push(Notice::MarketCapUnavailable);
    }

    let n = bars.len();
    if n < LIMITED_HISTORY_BARS {
        diagnostics.push(Notice::LimitedHistory { bars: n });
    }
    if n < config.sma_long_window {
        diagnostics.push(Notice::InsufficientHistory {
            bars: n,
            window: config.sma_long_window,
        });
    }

    let missing_closes = bars.iter().filter(|b| b.close().is_none()).count();
    if missing_closes > 0 {
        diagnostics.push(Notice::MissingCloses {
            count: missing_closes,
        });
    }
    let missing_highs = bars.iter().filter(|b| b.high().is_none()).count();
    if missing_highs > 0 {
        diagnostics.push(Notice::MissingHighs {
            count: missing_highs,
        });
    }
}
