//! End-to-end runs without network: synthetic data, cached data, and
//! persistence through the runner.

use chrono::NaiveDate;
use tickerlens_core::data::{DataSource, FundamentalsFetch, FundamentalsSource, ParquetCache};
use tickerlens_core::domain::{FundamentalFields, FundamentalSnapshot, PointInTimeInfo};
use tickerlens_core::MetricsConfig;
use tickerlens_runner::data_loader::generate_synthetic_bars;
use tickerlens_runner::export::{import_summaries, write_summary};
use tickerlens_runner::{run_ticker, run_tickers, LoadOptions, RunContext, RunError, SqliteStore};

fn opts(synthetic: bool) -> LoadOptions {
    LoadOptions {
        start: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
        end: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
        offline: true,
        synthetic,
        force: false,
    }
}

fn ctx(cache: &ParquetCache, synthetic: bool) -> RunContext<'_> {
    RunContext {
        cache,
        provider: None,
        load: opts(synthetic),
        metrics: MetricsConfig::default(),
    }
}

#[test]
fn synthetic_run_is_tagged_and_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ParquetCache::new(dir.path());
    let ctx = ctx(&cache, true);

    let a = run_ticker("SYNTH", &ctx, None).unwrap();
    let b = run_ticker("SYNTH", &ctx, None).unwrap();

    assert_eq!(a.summary.price_source, DataSource::Synthetic);
    assert_eq!(a.summary.source_used, FundamentalsSource::NoneAvailable);
    assert!(a.summary.has_synthetic);
    assert_eq!(a.summary, b.summary);
    assert_eq!(a.summary.metrics_count, a.output.rows.len());
    assert!(a.output.rows.iter().all(|r| r.bvps.is_none() && r.sma_short.is_some()));
    assert!(a.persisted.is_none());
}

#[test]
fn synthetic_batch_leaves_store_empty() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ParquetCache::new(dir.path());
    let mut store = SqliteStore::open(dir.path().join("runs.db")).unwrap();

    let results = run_tickers(&["NVDA"], &ctx(&cache, true), Some(&mut store));
    let run = results[0].1.as_ref().unwrap();
    assert!(run.summary.has_synthetic);
    assert!(!run.output.rows.is_empty());
    assert!(run.persisted.is_none());

    let single = run_ticker("NVDA", &ctx(&cache, true), Some(&mut store)).unwrap();
    assert!(single.persisted.is_none());

    assert_eq!(store.metric_count("NVDA").unwrap(), 0);
    assert!(store.signals("NVDA").unwrap().is_empty());
    assert!(store.ticker_name("NVDA").unwrap().is_none());
}

#[test]
fn cached_fundamentals_flow_into_ratios() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ParquetCache::new(dir.path());
    let o = opts(false);
    let bars = generate_synthetic_bars("CACHED", o.start, o.end);
    cache.write("CACHED", Some("Cached Co"), &bars).unwrap();
    cache
        .write_fundamentals(
            "CACHED",
            &FundamentalsFetch {
                snapshots: vec![FundamentalSnapshot::new(
                    NaiveDate::from_ymd_opt(2022, 6, 30).unwrap(),
                    FundamentalFields {
                        equity: Some(1_000.0),
                        total_liabilities: Some(300.0),
                        cash: Some(50.0),
                        shares_outstanding: Some(10.0),
                    },
                )],
                info: PointInTimeInfo {
                    market_cap: Some(5_000.0),
                    ..Default::default()
                },
                source: FundamentalsSource::QuarterlyBalanceSheet,
            },
        )
        .unwrap();

    let run = run_ticker("CACHED", &ctx(&cache, false), None).unwrap();
    assert_eq!(run.summary.price_source, DataSource::Cache);
    assert_eq!(run.summary.source_used, FundamentalsSource::QuarterlyBalanceSheet);
    assert_eq!(run.name.as_deref(), Some("Cached Co"));

    let before = run
        .output
        .rows
        .iter()
        .filter(|r| r.date < NaiveDate::from_ymd_opt(2022, 6, 30).unwrap());
    assert!(before.clone().count() > 0);
    assert!(before.clone().all(|r| r.bvps.is_none()));

    let last = run.output.rows.last().unwrap();
    assert_eq!(last.bvps, Some(100.0));
    assert_eq!(last.enterprise_value, Some(5_250.0));
}

#[test]
fn batch_keeps_going_after_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ParquetCache::new(dir.path());
    let o = opts(false);
    cache
        .write("GOOD", None, &generate_synthetic_bars("GOOD", o.start, o.end))
        .unwrap();

    let mut store = SqliteStore::open(dir.path().join("runs.db")).unwrap();
    let results = run_tickers(&["MISSING", "GOOD"], &ctx(&cache, false), Some(&mut store));

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "MISSING");
    assert!(matches!(results[0].1, Err(RunError::Data(_))));

    let good = results[1].1.as_ref().unwrap();
    let stats = good.persisted.unwrap();
    assert_eq!(stats.metrics_written, good.output.rows.len());
    assert_eq!(store.daily_metrics("GOOD").unwrap(), good.output.rows);

    let rerun = run_tickers(&["GOOD"], &ctx(&cache, false), Some(&mut store));
    let again = rerun[0].1.as_ref().unwrap();
    assert_eq!(again.persisted.unwrap().signals_inserted, 0);
    assert_eq!(store.signals("GOOD").unwrap().len(), good.output.signals.len());

    let path = dir.path().join("summary.json");
    write_summary(&path, &[good.summary.clone(), again.summary.clone()]).unwrap();
    let back = import_summaries(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(back, vec![good.summary.clone(), again.summary.clone()]);
}
