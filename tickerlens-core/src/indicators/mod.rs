//! Trailing-window indicators over a bar series.
//!
//! Windows are adaptive: before a full window of history exists, the value is
//! taken over the rows seen so far. Every output at row t depends only on
//! rows ≤ t.

pub mod rolling_high;
pub mod sma;

use std::collections::HashMap;

use crate::config::MetricsConfig;
use crate::domain::PriceBar;

pub use rolling_high::RollingHigh;
pub use sma::Sma;

pub const SMA_SHORT: &str = "sma_short";
pub const SMA_LONG: &str = "sma_long";
pub const ROLLING_HIGH: &str = "rolling_high";
pub const PCT_FROM_HIGH: &str = "pct_from_high";

/// An indicator maps a bar series to one optional value per bar.
pub trait Indicator: Send + Sync {
    /// Output has the same length as `bars`; `None` where undefined.
    fn compute(&self, bars: &[PriceBar]) -> Vec<Option<f64>>;
}

/// Named indicator columns for one series.
#[derive(Debug, Clone, Default)]
pub struct IndicatorValues {
    series: HashMap<String, Vec<Option<f64>>>,
}

impl IndicatorValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) {
        self.series.insert(name.into(), values);
    }

    /// Value of `name` at `index`; `None` if the column or value is missing.
    pub fn get(&self, name: &str, index: usize) -> Option<f64> {
        self.series.get(name).and_then(|v| v.get(index).copied().flatten())
    }

    pub fn get_series(&self, name: &str) -> Option<&[Option<f64>]> {
        self.series.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// `(close − high) / high`, absent when either side is missing or high is 0.
pub fn pct_from_high(close: Option<f64>, rolling_high: Option<f64>) -> Option<f64> {
    match (close, rolling_high) {
        (Some(c), Some(h)) if h != 0.0 => Some((c - h) / h).filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Compute the four indicator columns the metrics table carries.
pub fn compute_all(bars: &[PriceBar], config: &MetricsConfig) -> IndicatorValues {
    let indicators: [(&str, Box<dyn Indicator>); 3] = [
        (SMA_SHORT, Box::new(Sma::new(config.sma_short_window))),
        (SMA_LONG, Box::new(Sma::new(config.sma_long_window))),
        (ROLLING_HIGH, Box::new(RollingHigh::new(config.rolling_days_for_52week))),
    ];

    let mut values = IndicatorValues::new();
    for (column, indicator) in indicators {
        values.insert(column, indicator.compute(bars));
    }

    let pct: Vec<Option<f64>> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| pct_from_high(bar.close(), values.get(ROLLING_HIGH, i)))
        .collect();
    values.insert(PCT_FROM_HIGH, pct);
    values
}

/// Bars with the given closes; high = close + 1, low = close − 1.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<PriceBar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar {
            date: base_date + chrono::Duration::days(i as i64),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000,
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("expected a value, got None");
    assert!(
        (actual - expected).abs() < 1e-10,
        "assert_approx failed: actual={actual}, expected={expected}"
    );
}
