//! Simple Moving Average with an adaptive start.
//!
//! Mean of the defined closes among the last `window` bars. A bar with no
//! close has no SMA.

use super::Indicator;
use crate::domain::PriceBar;

#[derive(Debug, Clone)]
pub struct Sma {
    window: usize,
}

impl Sma {
    /// A zero window is treated as 1.
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }
}

impl Indicator for Sma {
    fn compute(&self, bars: &[PriceBar]) -> Vec<Option<f64>> {
        let closes: Vec<Option<f64>> = bars.iter().map(PriceBar::close).collect();

        // Sums are kept relative to the first defined close so a flat series
        // averages to exactly that close.
        let Some(anchor) = closes.iter().flatten().copied().next() else {
            return vec![None; bars.len()];
        };

        let mut sum = 0.0;
        let mut count = 0usize;
        let mut out = Vec::with_capacity(bars.len());

        for (i, close) in closes.iter().enumerate() {
            if let Some(c) = close {
                sum += c - anchor;
                count += 1;
            }
            if i >= self.window {
                if let Some(old) = closes[i - self.window] {
                    sum -= old - anchor;
                    count -= 1;
                }
            }
            out.push(match close {
                Some(_) if count > 0 => Some(anchor + sum / count as f64),
                _ => None,
            });
        }

        out
    }
}
