//! SQLite persistence for metric rows and signal events.
//!
//! - `daily_metrics` is keyed by `(ticker_id, date)`; writes overwrite.
//! - `signal_events` is keyed by `(ticker_id, date, signal)`; writes are
//!   insert-or-ignore, so re-running never duplicates an event.
//!
//! Dates are stored as `YYYY-MM-DD` text.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use tickerlens_core::domain::{DailyMetricsRow, SignalEvent, SignalKind};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("create database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("signal metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("corrupt row in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },
}

/// Counts written by one persist call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistStats {
    pub metrics_written: usize,
    /// Events newly inserted; already-present events are not counted.
    pub signals_inserted: usize,
}

/// Destination for a ticker's computed output.
pub trait MetricsSink {
    fn upsert_ticker(&mut self, ticker: &str, name: Option<&str>) -> Result<i64, StoreError>;

    fn persist(
        &mut self,
        ticker: &str,
        rows: &[DailyMetricsRow],
        signals: &[SignalEvent],
    ) -> Result<PersistStats, StoreError>;
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS tickers (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    ticker  TEXT NOT NULL UNIQUE,
    name    TEXT
);

CREATE TABLE IF NOT EXISTS daily_metrics (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    ticker_id         INTEGER NOT NULL REFERENCES tickers(id),
    date              TEXT NOT NULL,
    close             REAL,
    sma_short         REAL,
    sma_long          REAL,
    rolling_high      REAL,
    pct_from_high     REAL,
    bvps              REAL,
    pb_ratio          REAL,
    enterprise_value  REAL,
    UNIQUE (ticker_id, date)
);

CREATE TABLE IF NOT EXISTS signal_events (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    ticker_id  INTEGER NOT NULL REFERENCES tickers(id),
    date       TEXT NOT NULL,
    signal     TEXT NOT NULL,
    meta       TEXT,
    UNIQUE (ticker_id, date, signal)
);

CREATE INDEX IF NOT EXISTS idx_daily_metrics_ticker_date ON daily_metrics (ticker_id, date);
"#;

const METRIC_COLUMNS: &str = "t.ticker, m.date, m.close, m.sma_short, m.sma_long, m.rolling_high, \
     m.pct_from_high, m.bvps, m.pb_ratio, m.enterprise_value";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create the database at `path` and ensure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = Self {
            conn: Connection::open(path)?,
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(SCHEMA_SQL)?;
        tracing::debug!("database schema ready");
        Ok(())
    }

    fn ticker_id(&self, ticker: &str) -> Result<Option<i64>, StoreError> {
        Ok(self
            .conn
            .query_row("SELECT id FROM tickers WHERE ticker = ?1", [ticker], |r| r.get(0))
            .optional()?)
    }

    pub fn ticker_name(&self, ticker: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .conn
            .query_row("SELECT name FROM tickers WHERE ticker = ?1", [ticker], |r| r.get(0))
            .optional()?
            .flatten())
    }

    pub fn daily_metric(&self, ticker: &str, date: NaiveDate) -> Result<Option<DailyMetricsRow>, StoreError> {
        let sql = format!(
            "SELECT {METRIC_COLUMNS} FROM daily_metrics m JOIN tickers t ON t.id = m.ticker_id \
             WHERE t.ticker = ?1 AND m.date = ?2"
        );
        let raw = self
            .conn
            .query_row(&sql, params![ticker, date.to_string()], read_metric_row)
            .optional()?;
        raw.map(RawMetricRow::into_row).transpose()
    }

    /// All rows for a ticker, oldest first.
    pub fn daily_metrics(&self, ticker: &str) -> Result<Vec<DailyMetricsRow>, StoreError> {
        let sql = format!(
            "SELECT {METRIC_COLUMNS} FROM daily_metrics m JOIN tickers t ON t.id = m.ticker_id \
             WHERE t.ticker = ?1 ORDER BY m.date"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let raws = stmt
            .query_map([ticker], read_metric_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawMetricRow::into_row).collect()
    }

    /// All events for a ticker, by date then kind.
    pub fn signals(&self, ticker: &str) -> Result<Vec<SignalEvent>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT t.ticker, s.date, s.signal, s.meta FROM signal_events s \
             JOIN tickers t ON t.id = s.ticker_id WHERE t.ticker = ?1 ORDER BY s.date, s.signal",
        )?;
        let raws = stmt
            .query_map([ticker], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raws.into_iter()
            .map(|(ticker, date, signal, meta)| {
                let kind: SignalKind = signal.parse().map_err(|detail| StoreError::Corrupt {
                    table: "signal_events",
                    detail,
                })?;
                let metadata: Option<BTreeMap<String, f64>> =
                    meta.as_deref().map(serde_json::from_str).transpose()?;
                Ok(SignalEvent {
                    ticker,
                    date: parse_date("signal_events", &date)?,
                    kind,
                    metadata,
                })
            })
            .collect()
    }

    pub fn metric_count(&self, ticker: &str) -> Result<usize, StoreError> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM daily_metrics m JOIN tickers t ON t.id = m.ticker_id WHERE t.ticker = ?1",
            [ticker],
            |r| r.get(0),
        )?;
        Ok(n as usize)
    }
}

impl MetricsSink for SqliteStore {
    /// Insert the ticker or refresh its name; returns its id.
    fn upsert_ticker(&mut self, ticker: &str, name: Option<&str>) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO tickers (ticker, name) VALUES (?1, ?2) \
             ON CONFLICT(ticker) DO UPDATE SET name = COALESCE(excluded.name, tickers.name)",
            params![ticker, name],
        )?;
        self.ticker_id(ticker)?.ok_or_else(|| StoreError::Corrupt {
            table: "tickers",
            detail: format!("{ticker} missing after upsert"),
        })
    }

    fn persist(
        &mut self,
        ticker: &str,
        rows: &[DailyMetricsRow],
        signals: &[SignalEvent],
    ) -> Result<PersistStats, StoreError> {
        let ticker_id = match self.ticker_id(ticker)? {
            Some(id) => id,
            None => self.upsert_ticker(ticker, None)?,
        };

        let tx = self.conn.transaction()?;
        let mut stats = PersistStats::default();
        {
            let mut upsert = tx.prepare(
                "INSERT INTO daily_metrics \
                 (ticker_id, date, close, sma_short, sma_long, rolling_high, pct_from_high, bvps, pb_ratio, enterprise_value) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
                 ON CONFLICT(ticker_id, date) DO UPDATE SET \
                 close = excluded.close, sma_short = excluded.sma_short, sma_long = excluded.sma_long, \
                 rolling_high = excluded.rolling_high, pct_from_high = excluded.pct_from_high, \
                 bvps = excluded.bvps, pb_ratio = excluded.pb_ratio, enterprise_value = excluded.enterprise_value",
            )?;
            for row in rows {
                stats.metrics_written += upsert.execute(params![
                    ticker_id,
                    row.date.to_string(),
                    row.close,
                    row.sma_short,
                    row.sma_long,
                    row.rolling_high,
                    row.pct_from_high,
                    row.bvps,
                    row.pb_ratio,
                    row.enterprise_value,
                ])?;
            }

            let mut insert = tx.prepare(
                "INSERT OR IGNORE INTO signal_events (ticker_id, date, signal, meta) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for event in signals {
                let meta = event.metadata.as_ref().map(serde_json::to_string).transpose()?;
                stats.signals_inserted += insert.execute(params![
                    ticker_id,
                    event.date.to_string(),
                    event.kind.as_str(),
                    meta,
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(
            ticker,
            metrics = stats.metrics_written,
            new_signals = stats.signals_inserted,
            "persisted"
        );
        Ok(stats)
    }
}

struct RawMetricRow {
    ticker: String,
    date: String,
    values: [Option<f64>; 8],
}

fn read_metric_row(r: &Row<'_>) -> rusqlite::Result<RawMetricRow> {
    let mut values = [None; 8];
    for (i, slot) in values.iter_mut().enumerate() {
        *slot = r.get(i + 2)?;
    }
    Ok(RawMetricRow {
        ticker: r.get(0)?,
        date: r.get(1)?,
        values,
    })
}

impl RawMetricRow {
    fn into_row(self) -> Result<DailyMetricsRow, StoreError> {
        let [close, sma_short, sma_long, rolling_high, pct_from_high, bvps, pb_ratio, enterprise_value] =
            self.values;
        Ok(DailyMetricsRow {
            ticker: self.ticker,
            date: parse_date("daily_metrics", &self.date)?,
            close,
            sma_short,
            sma_long,
            rolling_high,
            pct_from_high,
            bvps,
            pb_ratio,
            enterprise_value,
        })
    }
}

fn parse_date(table: &'static str, s: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| StoreError::Corrupt {
        table,
        detail: format!("date '{s}': {e}"),
    })
}
