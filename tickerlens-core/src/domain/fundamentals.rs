//! Fundamental snapshots and the canonical field set carried onto daily rows.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::synonyms::{self, FundamentalField, RawRecord, SNAPSHOT_DATE};

/// Canonical balance-sheet values. Every field is optional: statements are sparse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalFields {
    pub equity: Option<f64>,
    pub total_liabilities: Option<f64>,
    pub cash: Option<f64>,
    pub shares_outstanding: Option<f64>,
}

impl FundamentalFields {
    pub fn get(&self, field: FundamentalField) -> Option<f64> {
        match field {
            FundamentalField::Equity => self.equity,
            FundamentalField::TotalLiabilities => self.total_liabilities,
            FundamentalField::Cash => self.cash,
            FundamentalField::SharesOutstanding => self.shares_outstanding,
        }
    }

    fn slot(&mut self, field: FundamentalField) -> &mut Option<f64> {
        match field {
            FundamentalField::Equity => &mut self.equity,
            FundamentalField::TotalLiabilities => &mut self.total_liabilities,
            FundamentalField::Cash => &mut self.cash,
            FundamentalField::SharesOutstanding => &mut self.shares_outstanding,
        }
    }

    /// Overwrite every field `newer` carries; keep the rest.
    pub fn carry_forward(&mut self, newer: &FundamentalFields) {
        for field in FundamentalField::ALL {
            if let Some(v) = newer.get(field) {
                *self.slot(field) = Some(v);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        FundamentalField::ALL.iter().all(|f| self.get(*f).is_none())
    }

    /// Resolve the canonical fields from a raw provider record.
    pub fn from_record(record: &RawRecord) -> Self {
        let mut fields = Self::default();
        for field in FundamentalField::ALL {
            *fields.slot(field) = synonyms::resolve_number(record, field.synonyms());
        }
        fields
    }
}

/// One published statement: its effective date, resolved fields, and the raw record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalSnapshot {
    pub as_of_date: NaiveDate,
    pub fields: FundamentalFields,
    /// Everything the provider sent, including fields with no canonical name.
    #[serde(default)]
    pub raw: RawRecord,
}

impl FundamentalSnapshot {
    /// Build a snapshot from a raw record.
    ///
    /// Returns `None` when no date alias resolves; such a record cannot be
    /// placed on the timeline.
    pub fn from_record(record: RawRecord) -> Option<Self> {
        let as_of_date = synonyms::resolve_date(&record, SNAPSHOT_DATE)?;
        Some(Self {
            as_of_date,
            fields: FundamentalFields::from_record(&record),
            raw: record,
        })
    }

    /// Snapshot with known fields and no raw payload.
    pub fn new(as_of_date: NaiveDate, fields: FundamentalFields) -> Self {
        Self {
            as_of_date,
            fields,
            raw: RawRecord::new(),
        }
    }
}
