//! Parquet cache layer with Hive-style partitioning.
//!
//! Layout:
//! - `{cache_dir}/symbol={SYMBOL}/{year}.parquet` for bars
//! - `{cache_dir}/symbol={SYMBOL}/meta.json` (date range, count, hash, name)
//! - `{cache_dir}/symbol={SYMBOL}/fundamentals.json` (snapshots + info)
//!
//! Writes go to a `.tmp` file and are renamed into place. Year files that
//! fail to read are renamed to `.quarantined` and skipped.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::provider::{DataError, FundamentalsFetch};
use crate::domain::PriceBar;

const BAR_COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub bar_count: usize,
    pub data_hash: String,
    pub cached_at: chrono::NaiveDateTime,
}

pub struct ParquetCache {
    cache_dir: PathBuf,
}

impl ParquetCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn symbol_dir(&self, symbol: &str) -> PathBuf {
        self.cache_dir.join(format!("symbol={symbol}"))
    }

    fn year_path(&self, symbol: &str, year: i32) -> PathBuf {
        self.symbol_dir(symbol).join(format!("{year}.parquet"))
    }

    fn meta_path(&self, symbol: &str) -> PathBuf {
        self.symbol_dir(symbol).join("meta.json")
    }

    fn fundamentals_path(&self, symbol: &str) -> PathBuf {
        self.symbol_dir(symbol).join("fundamentals.json")
    }

    /// Write bars for a symbol, one Parquet file per year, plus the sidecar.
    pub fn write(&self, symbol: &str, name: Option<&str>, bars: &[PriceBar]) -> Result<(), DataError> {
        let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
            return Err(DataError::CacheError("no bars to cache".into()));
        };

        let sym_dir = self.symbol_dir(symbol);
        fs::create_dir_all(&sym_dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let mut by_year: BTreeMap<i32, Vec<&PriceBar>> = BTreeMap::new();
        for bar in bars {
            by_year.entry(bar.date.year()).or_default().push(bar);
        }

        for (year, year_bars) in &by_year {
            let df = bars_to_dataframe(year_bars)?;
            let path = self.year_path(symbol, *year);
            let tmp_path = path.with_extension("parquet.tmp");
            write_parquet(&df, &tmp_path)?;
            rename_into_place(&tmp_path, &path)?;
        }

        let bytes = serde_json::to_vec(bars)
            .map_err(|e| DataError::CacheError(format!("hash serialization: {e}")))?;
        let meta = CacheMeta {
            symbol: symbol.to_string(),
            name: name.map(str::to_string),
            start_date: first.date,
            end_date: last.date,
            bar_count: bars.len(),
            data_hash: blake3::hash(&bytes).to_hex().to_string(),
            cached_at: chrono::Local::now().naive_local(),
        };
        write_json_atomic(&self.meta_path(symbol), &meta)?;
        tracing::debug!(symbol, bars = bars.len(), years = by_year.len(), "cached bars");
        Ok(())
    }

    /// Load all cached bars for a symbol, sorted by date ascending.
    pub fn load(&self, symbol: &str) -> Result<Vec<PriceBar>, DataError> {
        let sym_dir = self.symbol_dir(symbol);
        if !sym_dir.exists() {
            return Err(DataError::NoCachedData {
                symbol: symbol.to_string(),
            });
        }

        let entries =
            fs::read_dir(&sym_dir).map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;

        let mut all_bars = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DataError::CacheError(format!("dir entry: {e}")))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }

            match load_and_validate_parquet(&path) {
                Ok(bars) => all_bars.extend(bars),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "quarantining corrupt cache file");
                    let _ = fs::rename(&path, path.with_extension("parquet.quarantined"));
                }
            }
        }

        if all_bars.is_empty() {
            return Err(DataError::NoCachedData {
                symbol: symbol.to_string(),
            });
        }

        all_bars.sort_by_key(|b| b.date);
        Ok(all_bars)
    }

    pub fn write_fundamentals(&self, symbol: &str, fundamentals: &FundamentalsFetch) -> Result<(), DataError> {
        fs::create_dir_all(self.symbol_dir(symbol))
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;
        write_json_atomic(&self.fundamentals_path(symbol), fundamentals)
    }

    /// Cached fundamentals, if present and readable.
    pub fn load_fundamentals(&self, symbol: &str) -> Option<FundamentalsFetch> {
        let content = fs::read_to_string(self.fundamentals_path(symbol)).ok()?;
        match serde_json::from_str(&content) {
            Ok(f) => Some(f),
            Err(e) => {
                tracing::warn!(symbol, error = %e, "unreadable fundamentals sidecar");
                None
            }
        }
    }

    pub fn get_meta(&self, symbol: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(symbol)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Symbols with a cache directory, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.cache_dir) else {
            return Vec::new();
        };
        let mut out: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|n| n.strip_prefix("symbol="))
                    .map(str::to_string)
            })
            .collect();
        out.sort();
        out
    }

    pub fn status(&self, symbols: &[&str]) -> Vec<CacheStatus> {
        symbols
            .iter()
            .map(|sym| {
                let meta = self.get_meta(sym);
                CacheStatus {
                    symbol: sym.to_string(),
                    cached: meta.is_some(),
                    start_date: meta.as_ref().map(|m| m.start_date),
                    end_date: meta.as_ref().map(|m| m.end_date),
                    bar_count: meta.as_ref().map(|m| m.bar_count),
                    has_fundamentals: self.fundamentals_path(sym).exists(),
                }
            })
            .collect()
    }

    pub fn covers_range(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> CoverageResult {
        match self.get_meta(symbol) {
            None => CoverageResult::NotCached,
            Some(meta) if meta.start_date <= start && meta.end_date >= end => {
                CoverageResult::FullyCovered
            }
            Some(meta) => CoverageResult::PartiallyCovered {
                cached_start: meta.start_date,
                cached_end: meta.end_date,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub symbol: String,
    pub cached: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub bar_count: Option<usize>,
    pub has_fundamentals: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoverageResult {
    NotCached,
    FullyCovered,
    PartiallyCovered {
        cached_start: NaiveDate,
        cached_end: NaiveDate,
    },
}

// ── file helpers ────────────────────────────────────────────────────

fn rename_into_place(tmp: &Path, dest: &Path) -> Result<(), DataError> {
    fs::rename(tmp, dest).map_err(|e| {
        let _ = fs::remove_file(tmp);
        DataError::CacheError(format!("atomic rename failed: {e}"))
    })
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), DataError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| DataError::CacheError(format!("json serialization: {e}")))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| DataError::CacheError(format!("write {}: {e}", tmp.display())))?;
    rename_into_place(&tmp, path)
}

// ── Parquet I/O ─────────────────────────────────────────────────────

// NaiveDate::default() is 1970-01-01; Polars stores Date as days since then.
fn days_since_epoch(date: NaiveDate) -> i32 {
    (date - NaiveDate::default()).num_days() as i32
}

fn bars_to_dataframe(bars: &[&PriceBar]) -> Result<DataFrame, DataError> {
    let dates: Vec<i32> = bars.iter().map(|b| days_since_epoch(b.date)).collect();
    let opens: Vec<f64> = bars.iter().map(|b| b.open).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> Result<Vec<PriceBar>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::ParquetError("empty parquet file".into()));
    }
    for col_name in BAR_COLUMNS {
        if df.column(col_name).is_err() {
            return Err(DataError::ParquetError(format!("missing column '{col_name}'")));
        }
    }

    dataframe_to_bars(&df)
}

fn dataframe_to_bars(df: &DataFrame) -> Result<Vec<PriceBar>, DataError> {
    let col = |name: &str| {
        df.column(name)
            .map_err(|e| DataError::ParquetError(format!("column read: {e}")))
    };
    let type_err = |name: &str, e: PolarsError| DataError::ParquetError(format!("{name} column type: {e}"));

    let date_ca = col("date")?.date().map_err(|e| type_err("date", e))?;
    let open_ca = col("open")?.f64().map_err(|e| type_err("open", e))?;
    let high_ca = col("high")?.f64().map_err(|e| type_err("high", e))?;
    let low_ca = col("low")?.f64().map_err(|e| type_err("low", e))?;
    let close_ca = col("close")?.f64().map_err(|e| type_err("close", e))?;
    let vol_ca = col("volume")?.u64().map_err(|e| type_err("volume", e))?;

    let epoch = NaiveDate::default();
    let n = df.height();
    let mut bars = Vec::with_capacity(n);

    for i in 0..n {
        let days = date_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
        bars.push(PriceBar {
            date: epoch + chrono::Duration::days(days as i64),
            open: open_ca.get(i).unwrap_or(f64::NAN),
            high: high_ca.get(i).unwrap_or(f64::NAN),
            low: low_ca.get(i).unwrap_or(f64::NAN),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            volume: vol_ca.get(i).unwrap_or(0),
        });
    }

    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::FundamentalsSource;
    use crate::domain::{FundamentalFields, FundamentalSnapshot, PointInTimeInfo};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample_bars() -> Vec<PriceBar> {
        vec![
            PriceBar {
                date: d(2023, 12, 29),
                open: 99.0,
                high: 100.5,
                low: 98.0,
                close: 100.0,
                volume: 900,
            },
            PriceBar {
                date: d(2024, 1, 2),
                open: 100.0,
                high: 102.0,
                low: 99.0,
                close: 101.0,
                volume: 1000,
            },
            PriceBar {
                date: d(2024, 1, 3),
                open: 101.0,
                high: 103.0,
                low: 100.0,
                close: f64::NAN,
                volume: 1100,
            },
        ]
    }

    #[test]
    fn write_and_load_across_year_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());

        cache.write("NVDA", Some("NVIDIA Corporation"), &sample_bars()).unwrap();
        assert!(dir.path().join("symbol=NVDA/2023.parquet").exists());
        assert!(dir.path().join("symbol=NVDA/2024.parquet").exists());

        let loaded = cache.load("NVDA").unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].date, d(2023, 12, 29));
        assert_eq!(loaded[1].open, 100.0);
        assert!(loaded[2].close.is_nan());
    }

    #[test]
    fn load_missing_symbol_errors() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        assert!(matches!(
            cache.load("NONE"),
            Err(DataError::NoCachedData { .. })
        ));
    }

    #[test]
    fn corrupt_file_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache.write("NVDA", None, &sample_bars()).unwrap();

        let bad = dir.path().join("symbol=NVDA/2023.parquet");
        fs::write(&bad, b"not parquet").unwrap();

        let loaded = cache.load("NVDA").unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(dir.path().join("symbol=NVDA/2023.parquet.quarantined").exists());
    }

    #[test]
    fn meta_and_coverage() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache.write("NVDA", Some("NVIDIA Corporation"), &sample_bars()).unwrap();

        let meta = cache.get_meta("NVDA").unwrap();
        assert_eq!(meta.bar_count, 3);
        assert_eq!(meta.name.as_deref(), Some("NVIDIA Corporation"));

        assert_eq!(
            cache.covers_range("NVDA", d(2023, 12, 29), d(2024, 1, 3)),
            CoverageResult::FullyCovered
        );
        assert!(matches!(
            cache.covers_range("NVDA", d(2023, 1, 1), d(2024, 1, 3)),
            CoverageResult::PartiallyCovered { .. }
        ));
        assert_eq!(
            cache.covers_range("AAPL", d(2024, 1, 1), d(2024, 1, 2)),
            CoverageResult::NotCached
        );
    }

    #[test]
    fn fundamentals_sidecar_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        assert!(cache.load_fundamentals("NVDA").is_none());

        let fetched = FundamentalsFetch {
            snapshots: vec![FundamentalSnapshot::new(
                d(2023, 10, 31),
                FundamentalFields {
                    equity: Some(33.0e9),
                    ..Default::default()
                },
            )],
            info: PointInTimeInfo {
                market_cap: Some(1.2e12),
                ..Default::default()
            },
            source: FundamentalsSource::QuarterlyBalanceSheet,
        };
        cache.write_fundamentals("NVDA", &fetched).unwrap();
        assert_eq!(cache.load_fundamentals("NVDA"), Some(fetched));
    }

    #[test]
    fn status_and_symbol_listing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ParquetCache::new(dir.path());
        cache.write("NVDA", None, &sample_bars()).unwrap();
        cache.write("AAPL", None, &sample_bars()).unwrap();

        assert_eq!(cache.symbols(), vec!["AAPL".to_string(), "NVDA".to_string()]);

        let statuses = cache.status(&["NVDA", "MSFT"]);
        assert!(statuses[0].cached);
        assert!(!statuses[0].has_fundamentals);
        assert!(!statuses[1].cached);
    }
}
