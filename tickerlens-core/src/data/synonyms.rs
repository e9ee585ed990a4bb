//! Synonym table for provider field names.
//!
//! Providers have used several spellings for the same balance-sheet concept
//! over the years. Each canonical field maps to a fixed, ordered alias list;
//! resolution takes the first alias present in a record (ASCII
//! case-insensitive) and yields `None` when nothing matches.

use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value};

/// A raw provider record: field name → JSON value.
pub type RawRecord = Map<String, Value>;

/// Aliases for a snapshot's effective date, highest priority first.
pub const SNAPSHOT_DATE: &[&str] = &[
    "end_date",
    "as_of_date",
    "asOfDate",
    "fiscalDateEnding",
    "period_ending",
    "date",
];

/// Canonical balance-sheet fields carried onto daily rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FundamentalField {
    Equity,
    TotalLiabilities,
    Cash,
    SharesOutstanding,
}

impl FundamentalField {
    pub const ALL: [FundamentalField; 4] = [
        FundamentalField::Equity,
        FundamentalField::TotalLiabilities,
        FundamentalField::Cash,
        FundamentalField::SharesOutstanding,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FundamentalField::Equity => "equity",
            FundamentalField::TotalLiabilities => "total_liabilities",
            FundamentalField::Cash => "cash",
            FundamentalField::SharesOutstanding => "shares_outstanding",
        }
    }

    pub fn synonyms(self) -> &'static [&'static str] {
        match self {
            FundamentalField::Equity => &[
                "TotalStockholdersEquity",
                "totalStockholderEquity",
                "Total Stockholder Equity",
                "Stockholders' Equity",
                "Stockholders Equity",
                "StockholdersEquity",
                "total_stockholder_equity",
                "equity",
            ],
            // Debt spellings sit below the liability ones: older statement
            // sets only report debt.
            FundamentalField::TotalLiabilities => &[
                "Total Liabilities Net Minority Interest",
                "TotalLiabilitiesNetMinorityInterest",
                "totalLiabilities",
                "Total Liabilities",
                "total_liabilities",
                "Total Debt",
                "totalDebt",
                "total_debt",
                "Long Term Debt",
            ],
            FundamentalField::Cash => &[
                "Cash And Cash Equivalents",
                "CashAndCashEquivalents",
                "cash_and_equivalents",
                "Cash",
                "cash",
                "totalCash",
            ],
            FundamentalField::SharesOutstanding => &[
                "commonStockSharesOutstanding",
                "Shares Outstanding",
                "sharesOutstanding",
                "Ordinary Shares Number",
                "OrdinarySharesNumber",
                "Share Issued",
                "shares_outstanding",
                "Common Stock",
            ],
        }
    }
}

/// Canonical fields of the point-in-time info snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoField {
    MarketCap,
    SharesOutstanding,
    TotalCash,
    TotalLiabilities,
    BookValue,
}

impl InfoField {
    pub fn synonyms(self) -> &'static [&'static str] {
        match self {
            InfoField::MarketCap => &["marketCap", "market_cap", "trailingMarketCap"],
            InfoField::SharesOutstanding => {
                &["sharesOutstanding", "shares_outstanding", "floatShares"]
            }
            InfoField::TotalCash => &["totalCash", "total_cash", "cash"],
            InfoField::TotalLiabilities => &[
                "totalLiabilities",
                "total_liabilities",
                "totalDebt",
                "total_debt",
            ],
            InfoField::BookValue => &["bookValue", "book_value"],
        }
    }
}

/// First value whose key matches an alias, in alias priority order.
pub fn resolve<'a>(record: &'a RawRecord, synonyms: &[&str]) -> Option<&'a Value> {
    synonyms.iter().find_map(|alias| {
        record
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(alias))
            .map(|(_, value)| value)
    })
}

/// Resolve an alias list to a finite number.
///
/// The first matching key decides: if its value is not numeric the field is
/// absent, lower-priority aliases are not consulted.
pub fn resolve_number(record: &RawRecord, synonyms: &[&str]) -> Option<f64> {
    resolve(record, synonyms).and_then(value_as_f64)
}

/// Resolve an alias list to a calendar date.
pub fn resolve_date(record: &RawRecord, synonyms: &[&str]) -> Option<NaiveDate> {
    resolve(record, synonyms).and_then(value_as_date)
}

/// Numeric coercion for provider values.
///
/// Accepts JSON numbers, numeric strings (thousands separators allowed) and
/// Yahoo-style `{"raw": n, "fmt": "..."}` objects. Non-finite results are `None`.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok()?,
        Value::Object(obj) => return obj.get("raw").and_then(value_as_f64),
        _ => return None,
    };
    v.is_finite().then_some(v)
}

/// Date coercion for provider values.
///
/// Strings are read from their leading `YYYY-MM-DD`; integers are Unix
/// timestamps in seconds (or milliseconds when too large to be seconds).
pub fn value_as_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            let head = s.get(..10).unwrap_or(s);
            NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
        }
        Value::Number(n) => {
            let ts = n.as_i64()?;
            let secs = if ts.abs() > 100_000_000_000 { ts / 1000 } else { ts };
            DateTime::from_timestamp(secs, 0).map(|dt| dt.date_naive())
        }
        _ => None,
    }
}
