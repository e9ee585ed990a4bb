//! Yahoo Finance data provider.
//!
//! Daily bars come from the v8 chart API. Balance-sheet fields come from the
//! fundamentals-timeseries API, quarterly first and annual as fallback. Both
//! go through the same retry loop and circuit breaker.
//!
//! Yahoo has no official API and changes formats without notice; parsing is
//! kept lenient and degrades to `none_available` for fundamentals.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::circuit_breaker::CircuitBreaker;
use super::provider::{
    DataError, DataProvider, DataSource, FetchResult, FundamentalsFetch, FundamentalsSource,
    RawBar,
};
use super::synonyms::{value_as_f64, FundamentalField, RawRecord};
use crate::domain::{FundamentalSnapshot, PointInTimeInfo};

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    long_name: Option<String>,
    short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

/// Balance-sheet series requested from the timeseries API, without the
/// `quarterly`/`annual` prefix.
const BALANCE_SHEET_TYPES: &[&str] = &[
    "StockholdersEquity",
    "TotalLiabilitiesNetMinorityInterest",
    "TotalDebt",
    "CashAndCashEquivalents",
    "OrdinarySharesNumber",
];

const MARKET_CAP_TYPE: &str = "trailingMarketCap";

// Earliest period the timeseries endpoint accepts without complaint.
const TIMESERIES_PERIOD_START: i64 = 493_590_046;

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(NaiveTime::MIN).and_utc().timestamp();
        let end_ts = end.and_time(NaiveTime::MIN).and_utc().timestamp() + 86_399;
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d&events=div%2Csplits"
        )
    }

    fn timeseries_url(symbol: &str, prefix: &str) -> String {
        let mut types: Vec<String> = BALANCE_SHEET_TYPES
            .iter()
            .map(|t| format!("{prefix}{t}"))
            .collect();
        types.push(MARKET_CAP_TYPE.to_string());
        let now = Utc::now().timestamp();
        format!(
            "https://query2.finance.yahoo.com/ws/fundamentals-timeseries/v1/finance/timeseries/{symbol}\
             ?symbol={symbol}&type={}&period1={TIMESERIES_PERIOD_START}&period2={now}",
            types.join(",")
        )
    }

    fn parse_chart(symbol: &str, resp: ChartResponse) -> Result<(Option<String>, Vec<RawBar>), DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        let name = data
            .meta
            .and_then(|m| m.long_name.or(m.short_name));

        let timestamps = data
            .timestamp
            .ok_or_else(|| DataError::ResponseFormatChanged("no timestamps".into()))?;

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.date_naive())
                .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();

            if open.is_none() && high.is_none() && low.is_none() && close.is_none() {
                continue;
            }

            bars.push(RawBar {
                date,
                open: open.unwrap_or(f64::NAN),
                high: high.unwrap_or(f64::NAN),
                low: low.unwrap_or(f64::NAN),
                close: close.unwrap_or(f64::NAN),
                volume: volume.unwrap_or(0),
            });
        }

        if bars.is_empty() {
            return Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            });
        }

        Ok((name, bars))
    }

    /// Timeseries payload → one raw record per `asOfDate`, keyed by the
    /// unprefixed series name. `trailingMarketCap` points are returned apart.
    fn parse_timeseries(body: &Value, prefix: &str) -> (Vec<RawRecord>, Option<f64>) {
        let mut by_date: BTreeMap<String, RawRecord> = BTreeMap::new();
        let mut market_cap: Option<(String, f64)> = None;

        let results = body
            .pointer("/timeseries/result")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for series in results {
            let Some(kind) = series.pointer("/meta/type/0").and_then(Value::as_str) else {
                continue;
            };
            let Some(points) = series.get(kind).and_then(Value::as_array) else {
                continue;
            };

            for point in points {
                let Some(as_of) = point.get("asOfDate").and_then(Value::as_str) else {
                    continue;
                };
                let Some(reported) = point.get("reportedValue") else {
                    continue;
                };

                if kind == MARKET_CAP_TYPE {
                    if let Some(v) = value_as_f64(reported) {
                        if market_cap.as_ref().map_or(true, |(d, _)| as_of > d.as_str()) {
                            market_cap = Some((as_of.to_string(), v));
                        }
                    }
                    continue;
                }

                let Some(field) = kind.strip_prefix(prefix) else {
                    continue;
                };
                let record = by_date.entry(as_of.to_string()).or_insert_with(|| {
                    let mut r = RawRecord::new();
                    r.insert("asOfDate".into(), Value::String(as_of.to_string()));
                    r
                });
                record.insert(field.to_string(), reported.clone());
            }
        }

        (by_date.into_values().collect(), market_cap.map(|(_, v)| v))
    }

    /// Info record from the latest statement values.
    ///
    /// Market cap comes from the trailing series, else last close × shares.
    fn build_info(
        snapshots: &[FundamentalSnapshot],
        latest_total_debt: Option<f64>,
        market_cap: Option<f64>,
        last_close: Option<f64>,
    ) -> PointInTimeInfo {
        let latest = |field: FundamentalField| {
            snapshots.iter().rev().find_map(|s| s.fields.get(field))
        };

        let shares = latest(FundamentalField::SharesOutstanding);
        let market_cap = market_cap.or_else(|| match (last_close, shares) {
            (Some(c), Some(s)) if s > 0.0 => Some(c * s),
            _ => None,
        });

        let mut record = RawRecord::new();
        let mut put = |key: &str, v: Option<f64>| {
            if let Some(v) = v {
                record.insert(key.to_string(), json!(v));
            }
        };
        put("marketCap", market_cap);
        put("sharesOutstanding", shares);
        put("totalCash", latest(FundamentalField::Cash));
        put("totalLiabilities", latest(FundamentalField::TotalLiabilities));
        put("totalDebt", latest_total_debt);

        PointInTimeInfo::from_record(record)
    }

    /// GET `url` and decode JSON, with retry and circuit-breaker handling.
    fn get_json<T: DeserializeOwned>(&self, symbol: &str, url: &str) -> Result<T, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                tracing::debug!(symbol, attempt, ?delay, "retrying request");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let resp = match self.client.get(url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();

            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                tracing::warn!(symbol, retry_after, "rate limited");
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }

            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(DataError::AuthenticationRequired(
                    "Yahoo Finance requires authentication".into(),
                ));
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }

            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                continue;
            }

            let body: T = resp.json().map_err(|e| {
                DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
            })?;
            self.circuit_breaker.record_success();
            return Ok(body);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }

    fn fetch_statement_set(
        &self,
        symbol: &str,
        prefix: &str,
    ) -> Result<(Vec<FundamentalSnapshot>, Option<f64>, Option<f64>), DataError> {
        let body: Value = self.get_json(symbol, &Self::timeseries_url(symbol, prefix))?;
        let (records, market_cap) = Self::parse_timeseries(&body, prefix);

        let total_debt = records
            .iter()
            .rev()
            .find_map(|r| r.get("TotalDebt").and_then(value_as_f64));

        let snapshots = records
            .into_iter()
            .filter_map(FundamentalSnapshot::from_record)
            .filter(|s| !s.fields.is_empty())
            .collect();

        Ok((snapshots, total_debt, market_cap))
    }
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<FetchResult, DataError> {
        let resp: ChartResponse = self.get_json(symbol, &Self::chart_url(symbol, start, end))?;
        let (name, bars) = Self::parse_chart(symbol, resp)?;
        tracing::debug!(symbol, bars = bars.len(), "fetched chart");
        Ok(FetchResult {
            symbol: symbol.to_string(),
            name,
            bars,
            source: DataSource::YahooFinance,
        })
    }

    fn fetch_fundamentals(
        &self,
        symbol: &str,
        last_close: Option<f64>,
    ) -> Result<FundamentalsFetch, DataError> {
        let attempts = [
            ("quarterly", FundamentalsSource::QuarterlyBalanceSheet),
            ("annual", FundamentalsSource::AnnualBalanceSheet),
        ];

        let mut market_cap = None;
        for (prefix, source) in attempts {
            let (snapshots, total_debt, cap) = self.fetch_statement_set(symbol, prefix)?;
            market_cap = market_cap.or(cap);
            if snapshots.is_empty() {
                tracing::debug!(symbol, prefix, "no balance-sheet snapshots");
                continue;
            }
            let info = Self::build_info(&snapshots, total_debt, market_cap, last_close);
            return Ok(FundamentalsFetch {
                snapshots,
                info,
                source,
            });
        }

        tracing::warn!(symbol, "no balance sheet available");
        let info = Self::build_info(&[], None, market_cap, last_close);
        Ok(FundamentalsFetch {
            snapshots: Vec::new(),
            info,
            source: FundamentalsSource::NoneAvailable,
        })
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
