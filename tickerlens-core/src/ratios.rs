//! Valuation ratios from aligned fundamentals and the info record.
//!
//! Precedence: the row's aligned value first, the info record as fallback.
//! Market cap only ever comes from the info record.

use crate::domain::{FundamentalFields, PointInTimeInfo};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Ratios {
    pub bvps: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub enterprise_value: Option<f64>,
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

/// Book value per share: row equity over shares (row, then info). Requires
/// shares > 0.
pub fn book_value_per_share(fields: &FundamentalFields, info: &PointInTimeInfo) -> Option<f64> {
    let equity = fields.equity?;
    let shares = fields.shares_outstanding.or(info.shares_outstanding)?;
    if shares <= 0.0 {
        return None;
    }
    finite(equity / shares)
}

pub fn price_to_book(close: Option<f64>, bvps: Option<f64>) -> Option<f64> {
    match (close, bvps) {
        (Some(c), Some(b)) if b != 0.0 => finite(c / b),
        _ => None,
    }
}

/// `market_cap + liabilities − cash`.
///
/// Missing liabilities or cash count as zero; a missing market cap makes the
/// whole value absent.
pub fn enterprise_value(fields: &FundamentalFields, info: &PointInTimeInfo) -> Option<f64> {
    let market_cap = info.market_cap?;
    let liabilities = fields
        .total_liabilities
        .or(info.total_liabilities)
        .unwrap_or(0.0);
    let cash = fields.cash.or(info.total_cash).unwrap_or(0.0);
    finite(market_cap + liabilities - cash)
}

pub fn compute_ratios(close: Option<f64>, fields: &FundamentalFields, info: &PointInTimeInfo) -> Ratios {
    let bvps = book_value_per_share(fields, info);
    Ratios {
        bvps,
        pb_ratio: price_to_book(close, bvps),
        enterprise_value: enterprise_value(fields, info),
    }
}
