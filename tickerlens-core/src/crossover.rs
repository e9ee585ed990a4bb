//! Moving-average crossover detection.
//!
//! - Golden cross at i: short[i] > long[i] and short[i−1] ≤ long[i−1]
//! - Death cross at i: short[i] < long[i] and short[i−1] ≥ long[i−1]
//!
//! A row is considered only when both series are defined at i and i−1.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::{SignalEvent, SignalKind};

/// Classify the move from `(short_prev, long_prev)` to `(short_cur, long_cur)`.
pub fn classify(short_prev: f64, long_prev: f64, short_cur: f64, long_cur: f64) -> Option<SignalKind> {
    if short_cur > long_cur && short_prev <= long_prev {
        Some(SignalKind::GoldenCross)
    } else if short_cur < long_cur && short_prev >= long_prev {
        Some(SignalKind::DeathCross)
    } else {
        None
    }
}

/// Scan two aligned series and emit one event per crossing, in date order.
///
/// `dates`, `short` and `long` must have equal length. Metadata records the
/// two averages at the crossing bar.
pub fn detect_crossovers(
    ticker: &str,
    dates: &[NaiveDate],
    short: &[Option<f64>],
    long: &[Option<f64>],
    short_name: &str,
    long_name: &str,
) -> Vec<SignalEvent> {
    let n = dates.len().min(short.len()).min(long.len());
    let mut events = Vec::new();

    for i in 1..n {
        let (Some(sp), Some(lp), Some(sc), Some(lc)) = (short[i - 1], long[i - 1], short[i], long[i])
        else {
            continue;
        };
        if let Some(kind) = classify(sp, lp, sc, lc) {
            let metadata = BTreeMap::from([(short_name.to_string(), sc), (long_name.to_string(), lc)]);
            events.push(SignalEvent {
                ticker: ticker.to_string(),
                date: dates[i],
                kind,
                metadata: Some(metadata),
            });
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        (0..n).map(|i| start + chrono::Duration::days(i as i64)).collect()
    }

    fn some(v: &[f64]) -> Vec<Option<f64>> {
        v.iter().copied().map(Some).collect()
    }

    fn run(short: &[Option<f64>], long: &[Option<f64>]) -> Vec<(NaiveDate, SignalKind)> {
        detect_crossovers("TEST", &dates(short.len()), short, long, "sma_short", "sma_long")
            .into_iter()
            .map(|e| (e.date, e.kind))
            .collect()
    }

    #[test]
    fn classify_cases() {
        assert_eq!(classify(5.0, 5.0, 6.0, 5.0), Some(SignalKind::GoldenCross));
        assert_eq!(classify(6.0, 5.0, 4.0, 5.0), Some(SignalKind::DeathCross));
        assert_eq!(classify(5.0, 5.0, 5.0, 5.0), None);
        assert_eq!(classify(6.0, 5.0, 7.0, 5.0), None);
    }

    #[test]
    fn rising_short_crosses_once() {
        let events = run(&some(&[1.0, 2.0, 3.0, 4.0]), &some(&[2.5, 2.5, 2.5, 2.5]));
        assert_eq!(events, vec![(dates(4)[2], SignalKind::GoldenCross)]);
    }

    #[test]
    fn undefined_neighbour_suppresses_event() {
        let short = vec![Some(1.0), None, Some(3.0), Some(4.0)];
        let long = some(&[2.0, 2.0, 2.0, 2.0]);
        assert!(run(&short, &long).is_empty());
    }

    #[test]
    fn metadata_carries_both_averages() {
        let events = detect_crossovers(
            "NVDA",
            &dates(2),
            &some(&[1.0, 3.0]),
            &some(&[2.0, 2.0]),
            "sma_short",
            "sma_long",
        );
        let meta = events[0].metadata.as_ref().unwrap();
        assert_eq!(meta["sma_short"], 3.0);
        assert_eq!(meta["sma_long"], 2.0);
        assert_eq!(events[0].ticker, "NVDA");
    }

    #[test]
    fn empty_and_single_row_inputs() {
        assert!(run(&[], &[]).is_empty());
        assert!(run(&some(&[1.0]), &some(&[0.0])).is_empty());
    }
}
