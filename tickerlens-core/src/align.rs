//! Temporal alignment of fundamental snapshots onto the daily price timeline.
//!
//! Backward as-of join: each price date carries the latest snapshot dated on
//! or before it, and each field keeps its last known value until a later
//! snapshot supplies a new one. Nothing is filled backward.

use chrono::NaiveDate;

use crate::domain::{FundamentalFields, FundamentalSnapshot, PriceBar};

/// Fundamentals in effect on one price date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedRow {
    pub date: NaiveDate,
    /// Date of the most recent snapshot applied, if any.
    pub as_of: Option<NaiveDate>,
    pub fields: FundamentalFields,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    /// One row per bar, same order.
    pub rows: Vec<AlignedRow>,
    /// Snapshots dated after the last bar.
    pub unused_snapshots: usize,
}

/// Align `snapshots` onto `bars`.
///
/// `bars` must be ascending by date. Snapshots may arrive in any order; ties
/// on date are applied in input order, so the later one wins per field.
pub fn align_fundamentals(bars: &[PriceBar], snapshots: &[FundamentalSnapshot]) -> Alignment {
    let mut ordered: Vec<&FundamentalSnapshot> = snapshots.iter().collect();
    ordered.sort_by_key(|s| s.as_of_date);

    let mut rows = Vec::with_capacity(bars.len());
    let mut carried = FundamentalFields::default();
    let mut as_of = None;
    let mut j = 0;

    for bar in bars {
        while j < ordered.len() && ordered[j].as_of_date <= bar.date {
            carried.carry_forward(&ordered[j].fields);
            as_of = Some(ordered[j].as_of_date);
            j += 1;
        }
        rows.push(AlignedRow {
            date: bar.date,
            as_of,
            fields: carried,
        });
    }

    Alignment {
        rows,
        unused_snapshots: ordered.len() - j,
    }
}
