//! Domain types: bars, fundamentals, info, metric rows, signals.

pub mod bar;
pub mod fundamentals;
pub mod info;
pub mod metrics_row;
pub mod signal;

pub use bar::{BarError, PriceBar};
pub use fundamentals::{FundamentalFields, FundamentalSnapshot};
pub use info::PointInTimeInfo;
pub use metrics_row::DailyMetricsRow;
pub use signal::{SignalEvent, SignalKind};
