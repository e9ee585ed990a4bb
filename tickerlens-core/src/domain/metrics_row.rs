use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One computed day for a ticker. Natural key is `(ticker, date)`.
///
/// Derived fields are `None` when they could not be computed; `None` is never
/// written as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetricsRow {
    pub ticker: String,
    pub date: NaiveDate,
    pub close: Option<f64>,
    pub sma_short: Option<f64>,
    pub sma_long: Option<f64>,
    pub rolling_high: Option<f64>,
    pub pct_from_high: Option<f64>,
    pub bvps: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub enterprise_value: Option<f64>,
}

impl DailyMetricsRow {
    /// Row with only the identity and close filled in.
    pub fn new(ticker: impl Into<String>, date: NaiveDate, close: Option<f64>) -> Self {
        Self {
            ticker: ticker.into(),
            date,
            close,
            sma_short: None,
            sma_long: None,
            rolling_high: None,
            pct_from_high: None,
            bvps: None,
            pb_ratio: None,
            enterprise_value: None,
        }
    }
}
