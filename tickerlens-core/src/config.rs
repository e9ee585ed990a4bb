//! Metrics configuration.
//!
//! Every key is optional. Unknown keys are ignored so the same file can carry
//! settings for other layers.

use serde::{Deserialize, Serialize};

use crate::diagnostics::Notice;

pub const DEFAULT_SMA_SHORT: usize = 50;
pub const DEFAULT_SMA_LONG: usize = 200;
pub const DEFAULT_ROLLING_HIGH: usize = 252;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MetricsSettings")]
pub struct MetricsConfig {
    pub sma_short_window: usize,
    pub sma_long_window: usize,
    pub rolling_days_for_52week: usize,
}

/// Window keys as written in a config file, all optional.
///
/// `min_trading_days_for_sma` is the older name of `sma_long_window`; a file
/// may carry both, and `sma_long_window` wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sma_short_window: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sma_long_window: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_trading_days_for_sma: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rolling_days_for_52week: Option<usize>,
}

impl From<MetricsSettings> for MetricsConfig {
    fn from(s: MetricsSettings) -> Self {
        Self {
            sma_short_window: s.sma_short_window.unwrap_or(DEFAULT_SMA_SHORT),
            sma_long_window: s
                .sma_long_window
                .or(s.min_trading_days_for_sma)
                .unwrap_or(DEFAULT_SMA_LONG),
            rolling_days_for_52week: s.rolling_days_for_52week.unwrap_or(DEFAULT_ROLLING_HIGH),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            sma_short_window: DEFAULT_SMA_SHORT,
            sma_long_window: DEFAULT_SMA_LONG,
            rolling_days_for_52week: DEFAULT_ROLLING_HIGH,
        }
    }
}

impl MetricsConfig {
    /// Copy with zero-length windows raised to 1, plus a notice per change.
    pub fn normalized(&self) -> (Self, Vec<Notice>) {
        let mut out = *self;
        let mut notices = Vec::new();
        for (name, window) in [
            ("sma_short_window", &mut out.sma_short_window),
            ("sma_long_window", &mut out.sma_long_window),
            ("rolling_days_for_52week", &mut out.rolling_days_for_52week),
        ] {
            if *window == 0 {
                *window = 1;
                notices.push(Notice::WindowClamped { setting: name });
            }
        }
        (out, notices)
    }
}
