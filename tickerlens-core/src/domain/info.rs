//! Point-in-time info: one "as of now" snapshot, not time-indexed.

use serde::{Deserialize, Serialize};

use crate::data::synonyms::{self, InfoField, RawRecord};

/// Latest company-level figures. Only used as fallback for ratio components
/// and as the sole source of market capitalisation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointInTimeInfo {
    pub market_cap: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub total_cash: Option<f64>,
    pub total_liabilities: Option<f64>,
    pub book_value: Option<f64>,
    #[serde(default)]
    pub raw: RawRecord,
}

impl PointInTimeInfo {
    pub fn from_record(record: RawRecord) -> Self {
        let get = |field: InfoField| synonyms::resolve_number(&record, field.synonyms());
        Self {
            market_cap: get(InfoField::MarketCap),
            shares_outstanding: get(InfoField::SharesOutstanding),
            total_cash: get(InfoField::TotalCash),
            total_liabilities: get(InfoField::TotalLiabilities),
            book_value: get(InfoField::BookValue),
            raw: record,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.market_cap.is_none()
            && self.shares_outstanding.is_none()
            && self.total_cash.is_none()
            && self.total_liabilities.is_none()
            && self.book_value.is_none()
    }
}
