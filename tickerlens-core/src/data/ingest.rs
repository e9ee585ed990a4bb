//! Ingest: raw provider bars → validated, ascending `PriceBar` series.

use chrono::NaiveDate;
use thiserror::Error;

use super::provider::RawBar;
use crate::domain::{BarError, PriceBar};

/// Shape problems that make a price series unusable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("no price data")]
    Empty,

    #[error("duplicate bar for {date}")]
    DuplicateDate { date: NaiveDate },

    #[error("bars out of order: {next} follows {prev}")]
    NotAscending { prev: NaiveDate, next: NaiveDate },

    #[error("malformed bar: {0}")]
    Bar(#[from] BarError),
}

/// Check that `bars` is non-empty, strictly ascending by date, and that every
/// bar satisfies its range invariants.
pub fn check_series(bars: &[PriceBar]) -> Result<(), SeriesError> {
    if bars.is_empty() {
        return Err(SeriesError::Empty);
    }
    for pair in bars.windows(2) {
        let (prev, next) = (pair[0].date, pair[1].date);
        if next == prev {
            return Err(SeriesError::DuplicateDate { date: next });
        }
        if next < prev {
            return Err(SeriesError::NotAscending { prev, next });
        }
    }
    for bar in bars {
        bar.validate()?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct IngestResult {
    pub bars: Vec<PriceBar>,
    /// Bars with no price fields at all (holidays, halted sessions).
    pub dropped_void: usize,
}

/// Sort, drop void bars, and validate.
pub fn ingest(raw: Vec<RawBar>) -> Result<IngestResult, SeriesError> {
    let mut bars: Vec<PriceBar> = raw
        .into_iter()
        .map(|r| PriceBar {
            date: r.date,
            open: r.open,
            high: r.high,
            low: r.low,
            close: r.close,
            volume: r.volume,
        })
        .collect();

    let before = bars.len();
    bars.retain(|b| !b.is_void());
    let dropped_void = before - bars.len();

    bars.sort_by_key(|b| b.date);
    check_series(&bars)?;

    Ok(IngestResult { bars, dropped_void })
}
