//! PriceBar: one trading day of OHLCV for a ticker.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Daily OHLCV bar.
///
/// A non-finite price field means the provider had no value for that bar.
/// Downstream columns that depend on it come out absent rather than NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Why a bar was rejected at ingest.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("{date}: high {high} is below low {low}")]
    HighBelowLow { date: NaiveDate, high: f64, low: f64 },

    #[error("{date}: {field} {value} outside [low {low}, high {high}]")]
    OutsideRange {
        date: NaiveDate,
        field: &'static str,
        value: f64,
        low: f64,
        high: f64,
    },

    #[error("{date}: no price fields present")]
    Empty { date: NaiveDate },
}

impl PriceBar {
    /// Close price, if the provider supplied one.
    pub fn close(&self) -> Option<f64> {
        finite(self.close)
    }

    /// High price, if the provider supplied one.
    pub fn high(&self) -> Option<f64> {
        finite(self.high)
    }

    /// Returns true if every OHLC field is missing.
    pub fn is_void(&self) -> bool {
        [self.open, self.high, self.low, self.close]
            .iter()
            .all(|v| !v.is_finite())
    }

    /// Check the range invariants over whichever fields are present.
    ///
    /// low ≤ {open, close} ≤ high, and high ≥ low. Missing fields are skipped;
    /// a bar with no fields at all is rejected.
    pub fn validate(&self) -> Result<(), BarError> {
        if self.is_void() {
            return Err(BarError::Empty { date: self.date });
        }

        let low = finite(self.low);
        let high = finite(self.high);

        if let (Some(low), Some(high)) = (low, high) {
            if high < low {
                return Err(BarError::HighBelowLow {
                    date: self.date,
                    high,
                    low,
                });
            }
        }

        for (field, value) in [("open", self.open), ("close", self.close)] {
            let Some(value) = finite(value) else {
                continue;
            };
            let below = low.is_some_and(|l| value < l);
            let above = high.is_some_and(|h| value > h);
            if below || above {
                return Err(BarError::OutsideRange {
                    date: self.date,
                    field,
                    value,
                    low: self.low,
                    high: self.high,
                });
            }
        }

        Ok(())
    }
}

/// `Some(v)` for finite values, `None` for NaN and infinities.
pub fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}
