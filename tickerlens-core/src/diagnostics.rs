//! Data-quality notices returned alongside the metrics table.
//!
//! None of these stop a run. The caller decides whether to log, persist or
//! surface them.

use std::fmt;

use serde::Serialize;

/// Below this many bars the history is flagged as limited.
pub const LIMITED_HISTORY_BARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// No fundamental snapshots were supplied.
    FundamentalsUnavailable,
    /// The point-in-time info record resolved no fields.
    InfoUnavailable,
    /// No market cap in the info record, so enterprise value is absent.
    MarketCapUnavailable,
    /// Fewer bars than the long SMA window; early averages are adaptive.
    InsufficientHistory { bars: usize, window: usize },
    /// Fewer than [`LIMITED_HISTORY_BARS`] bars.
    LimitedHistory { bars: usize },
    MissingCloses { count: usize },
    MissingHighs { count: usize },
    /// Every snapshot is dated after the last bar; none was applied.
    SnapshotsAfterLastBar { count: usize },
    WindowClamped { setting: &'static str },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::FundamentalsUnavailable => write!(f, "fundamentals unavailable"),
            Notice::InfoUnavailable => write!(f, "point-in-time info unavailable"),
            Notice::MarketCapUnavailable => {
                write!(f, "market cap unavailable, enterprise value omitted")
            }
            Notice::InsufficientHistory { bars, window } => {
                write!(f, "insufficient history: {bars} bars for a {window}-day average")
            }
            Notice::LimitedHistory { bars } => write!(f, "limited history: only {bars} bars"),
            Notice::MissingCloses { count } => write!(f, "{count} bars missing close"),
            Notice::MissingHighs { count } => write!(f, "{count} bars missing high"),
            Notice::SnapshotsAfterLastBar { count } => {
                write!(f, "{count} fundamental snapshots dated after the last bar")
            }
            Notice::WindowClamped { setting } => write!(f, "{setting} was 0, using 1"),
        }
    }
}

/// Ordered notice list for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    notices: Vec<Notice>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn extend(&mut self, notices: impl IntoIterator<Item = Notice>) {
        self.notices.extend(notices);
    }

    pub fn contains(&self, notice: &Notice) -> bool {
        self.notices.contains(notice)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }

    /// Human-readable messages, in order.
    pub fn messages(&self) -> Vec<String> {
        self.notices.iter().map(ToString::to_string).collect()
    }
}
