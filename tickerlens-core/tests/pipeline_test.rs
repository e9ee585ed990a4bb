//! End-to-end checks of the metrics pipeline on small hand-built inputs.

use chrono::NaiveDate;
use serde_json::json;
use tickerlens_core::data::synonyms::RawRecord;
use tickerlens_core::domain::{
    DailyMetricsRow, FundamentalSnapshot, PointInTimeInfo, PriceBar, SignalKind,
};
use tickerlens_core::pipeline::signals_from_rows;
use tickerlens_core::{compute_metrics, MetricsConfig, Notice};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn make_bars(start: NaiveDate, closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar {
            date: start + chrono::Duration::days(i as i64),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000,
        })
        .collect()
}

fn rows_with_smas(short: &[f64], long: &[f64]) -> Vec<DailyMetricsRow> {
    short
        .iter()
        .zip(long)
        .enumerate()
        .map(|(i, (&s, &l))| {
            let mut row = DailyMetricsRow::new("TEST", date(2020, 1, 1 + i as u32), None);
            row.sma_short = Some(s);
            row.sma_long = Some(l);
            row
        })
        .collect()
}

fn record(v: serde_json::Value) -> RawRecord {
    v.as_object().unwrap().clone()
}

#[test]
fn golden_cross_after_touch() {
    let rows = rows_with_smas(&[5.0, 5.0, 5.0, 6.0, 7.0], &[5.0, 5.0, 6.0, 6.0, 6.0]);
    let events = signals_from_rows("TEST", &rows);

    let golden: Vec<NaiveDate> = events
        .iter()
        .filter(|e| e.kind == SignalKind::GoldenCross)
        .map(|e| e.date)
        .collect();
    assert_eq!(golden, vec![date(2020, 1, 5)]);

    // The long average stepping above a flat short one is itself a crossing.
    let death: Vec<NaiveDate> = events
        .iter()
        .filter(|e| e.kind == SignalKind::DeathCross)
        .map(|e| e.date)
        .collect();
    assert_eq!(death, vec![date(2020, 1, 3)]);
}

#[test]
fn death_cross_after_touch() {
    let rows = rows_with_smas(&[7.0, 6.0, 6.0, 5.0, 5.0], &[6.0; 5]);
    let events = signals_from_rows("TEST", &rows);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, SignalKind::DeathCross);
    assert_eq!(events[0].date, date(2020, 1, 4));
}

#[test]
fn events_are_date_ordered_and_exclusive() {
    let rows = rows_with_smas(
        &[1.0, 3.0, 1.0, 3.0, 1.0, 3.0],
        &[2.0, 2.0, 2.0, 2.0, 2.0, 2.0],
    );
    let events = signals_from_rows("TEST", &rows);
    assert_eq!(events.len(), 5);
    for pair in events.windows(2) {
        assert!(pair[0].date < pair[1].date);
        assert_ne!(pair[0].kind, pair[1].kind);
    }
}

#[test]
fn empty_fundamentals_leave_ratio_columns_absent() {
    let bars = make_bars(date(2024, 1, 1), &[10.0, 11.0, 12.0, 13.0]);
    let out = compute_metrics(
        "NVDA",
        &bars,
        &[],
        &PointInTimeInfo::default(),
        &MetricsConfig::default(),
    )
    .unwrap();

    assert_eq!(out.rows.len(), 4);
    for row in &out.rows {
        assert!(row.sma_short.is_some());
        assert!(row.sma_long.is_some());
        assert!(row.rolling_high.is_some());
        assert!(row.pct_from_high.is_some());
        assert_eq!(row.bvps, None);
        assert_eq!(row.pb_ratio, None);
        assert_eq!(row.enterprise_value, None);
    }
    assert!(out.diagnostics.contains(&Notice::FundamentalsUnavailable));
    assert!(out.diagnostics.contains(&Notice::InfoUnavailable));
}

#[test]
fn raw_records_flow_through_synonyms() {
    let bars = make_bars(date(2024, 3, 28), &[50.0, 52.0, 54.0, 56.0]);
    let snapshots: Vec<FundamentalSnapshot> = [
        json!({
            "asOfDate": "2024-03-29",
            "Total Stockholder Equity": 1_000.0,
            "Ordinary Shares Number": 100.0,
            "Total Debt": 200.0,
        }),
        json!({ "asOfDate": "2023-12-31", "Cash And Cash Equivalents": 75.0 }),
        json!({ "Cash": 1.0 }),
    ]
    .into_iter()
    .filter_map(|v| FundamentalSnapshot::from_record(record(v)))
    .collect();
    assert_eq!(snapshots.len(), 2);

    let info = PointInTimeInfo::from_record(record(json!({ "marketCap": "5,000" })));
    let out = compute_metrics("NVDA", &bars, &snapshots, &info, &MetricsConfig::default()).unwrap();

    // 2024-03-28: only the December snapshot applies.
    assert_eq!(out.rows[0].bvps, None);
    assert_eq!(out.rows[0].enterprise_value, Some(5_000.0 - 75.0));
    // 2024-03-29 onward: equity, shares and debt from March, cash carried from December.
    assert_eq!(out.rows[1].bvps, Some(10.0));
    assert_eq!(out.rows[1].pb_ratio, Some(5.2));
    assert_eq!(out.rows[3].enterprise_value, Some(5_000.0 + 200.0 - 75.0));
}

#[test]
fn default_windows_on_a_long_series() {
    let closes: Vec<f64> = (0..300).map(|i| 100.0 + i as f64).collect();
    let bars = make_bars(date(2022, 1, 1), &closes);
    let out = compute_metrics(
        "LONG",
        &bars,
        &[],
        &PointInTimeInfo::default(),
        &MetricsConfig::default(),
    )
    .unwrap();

    let last = out.rows.last().unwrap();
    // mean of closes 250..=299 offset by 100
    assert!((last.sma_short.unwrap() - 374.5).abs() < 1e-9);
    // mean of closes 100..=299 offset by 100
    assert!((last.sma_long.unwrap() - 299.5).abs() < 1e-9);
    assert_eq!(last.rolling_high, Some(400.0));
    assert!(!out
        .diagnostics
        .iter()
        .any(|n| matches!(n, Notice::InsufficientHistory { .. })));
    // A strictly rising series keeps short above long after the first bar.
    assert!(out.signals.iter().all(|e| e.kind == SignalKind::GoldenCross));
}

#[test]
fn unsorted_prices_are_rejected() {
    let mut bars = make_bars(date(2024, 1, 1), &[10.0, 11.0, 12.0]);
    bars.swap(0, 2);
    let result = compute_metrics(
        "NVDA",
        &bars,
        &[],
        &PointInTimeInfo::default(),
        &MetricsConfig::default(),
    );
    assert!(result.is_err());
}
