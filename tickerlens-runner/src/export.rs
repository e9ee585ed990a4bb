//! Summary and table export.
//!
//! - **JSON**: `RunSummary` with schema versioning. A file holds one object
//!   for a single ticker or an array for several.
//! - **CSV**: the daily metrics table, absent values as empty cells.
//!
//! Newer schema versions are rejected on load.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tickerlens_core::domain::DailyMetricsRow;

use crate::runner::{RunSummary, SCHEMA_VERSION};

pub fn export_json(summary: &RunSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("failed to serialize RunSummary to JSON")
}

/// Deserialize a `RunSummary`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<RunSummary> {
    let summary: RunSummary =
        serde_json::from_str(json).context("failed to deserialize RunSummary from JSON")?;
    check_version(&summary)?;
    Ok(summary)
}

/// Read a summary file written by [`write_summary`], single object or array.
pub fn import_summaries(json: &str) -> Result<Vec<RunSummary>> {
    let value: serde_json::Value = serde_json::from_str(json).context("summary file is not JSON")?;
    let summaries: Vec<RunSummary> = if value.is_array() {
        serde_json::from_value(value).context("failed to deserialize summary array")?
    } else {
        vec![serde_json::from_value(value).context("failed to deserialize RunSummary")?]
    };
    for s in &summaries {
        check_version(s)?;
    }
    Ok(summaries)
}

fn check_version(summary: &RunSummary) -> Result<()> {
    if summary.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            summary.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(())
}

/// Write the summaries to `path`, creating parent directories.
pub fn write_summary(path: &Path, summaries: &[RunSummary]) -> Result<()> {
    let json = match summaries {
        [single] => export_json(single)?,
        many => serde_json::to_string_pretty(many).context("failed to serialize summaries")?,
    };
    write_file(path, &json)?;
    tracing::info!(path = %path.display(), tickers = summaries.len(), "summary written");
    Ok(())
}

/// Columns: ticker, date, close, sma_short, sma_long, rolling_high,
/// pct_from_high, bvps, pb_ratio, enterprise_value
pub fn export_metrics_csv(rows: &[DailyMetricsRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "ticker",
        "date",
        "close",
        "sma_short",
        "sma_long",
        "rolling_high",
        "pct_from_high",
        "bvps",
        "pb_ratio",
        "enterprise_value",
    ])?;

    for r in rows {
        wtr.write_record([
            r.ticker.clone(),
            r.date.to_string(),
            cell(r.close),
            cell(r.sma_short),
            cell(r.sma_long),
            cell(r.rolling_high),
            cell(r.pct_from_high),
            cell(r.bvps),
            cell(r.pb_ratio),
            cell(r.enterprise_value),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn write_metrics_csv(path: &Path, rows: &[DailyMetricsRow]) -> Result<()> {
    write_file(path, &export_metrics_csv(rows)?)
}

fn cell(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}
