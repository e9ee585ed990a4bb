//! Crossover signal events.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Direction of a moving-average crossover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Short average crosses above the long average.
    GoldenCross,
    /// Short average crosses below the long average.
    DeathCross,
}

impl SignalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::GoldenCross => "golden_cross",
            SignalKind::DeathCross => "death_cross",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "golden_cross" => Ok(SignalKind::GoldenCross),
            "death_cross" => Ok(SignalKind::DeathCross),
            other => Err(format!("unknown signal kind: {other}")),
        }
    }
}

/// A dated crossover. Natural key is `(ticker, date, kind)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub ticker: String,
    pub date: NaiveDate,
    #[serde(rename = "signal")]
    pub kind: SignalKind,
    /// Indicator values at the crossing bar, keyed by column name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, f64>>,
}
