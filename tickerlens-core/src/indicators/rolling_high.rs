//! Trailing maximum of `high`.

use std::collections::VecDeque;

use super::Indicator;
use crate::domain::PriceBar;

/// Max of the defined highs among the last `window` bars (52-week high at
/// the default 252). A bar with no high has no value.
#[derive(Debug, Clone)]
pub struct RollingHigh {
    window: usize,
}

impl RollingHigh {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }
}

impl Indicator for RollingHigh {
    fn compute(&self, bars: &[PriceBar]) -> Vec<Option<f64>> {
        // Indices of candidate maxima, highs strictly decreasing front to back.
        let mut candidates: VecDeque<(usize, f64)> = VecDeque::new();
        let mut out = Vec::with_capacity(bars.len());

        for (i, bar) in bars.iter().enumerate() {
            while candidates
                .front()
                .is_some_and(|&(j, _)| j + self.window <= i)
            {
                candidates.pop_front();
            }

            let Some(high) = bar.high() else {
                out.push(None);
                continue;
            };

            while candidates.back().is_some_and(|&(_, h)| h <= high) {
                candidates.pop_back();
            }
            candidates.push_back((i, high));
            out.push(candidates.front().map(|&(_, h)| h));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    fn highs(bars: &mut [PriceBar], values: &[f64]) {
        for (bar, &h) in bars.iter_mut().zip(values) {
            bar.high = h;
        }
    }

    #[test]
    fn tracks_trailing_max() {
        let mut bars = make_bars(&[0.0; 6]);
        highs(&mut bars, &[5.0, 9.0, 7.0, 6.0, 4.0, 8.0]);
        let result = RollingHigh::new(3).compute(&bars);
        assert_eq!(
            result,
            vec![Some(5.0), Some(9.0), Some(9.0), Some(9.0), Some(7.0), Some(8.0)]
        );
    }

    #[test]
    fn missing_high_has_no_value_and_does_not_count() {
        let mut bars = make_bars(&[0.0; 4]);
        highs(&mut bars, &[5.0, f64::NAN, 3.0, 2.0]);
        let result = RollingHigh::new(2).compute(&bars);
        assert_eq!(result, vec![Some(5.0), None, Some(3.0), Some(3.0)]);
    }

    #[test]
    fn window_longer_than_series() {
        let bars = make_bars(&[10.0, 30.0, 20.0]);
        let result = RollingHigh::new(252).compute(&bars);
        assert_eq!(result, vec![Some(11.0), Some(31.0), Some(31.0)]);
    }
}
