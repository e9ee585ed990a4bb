//! TickerLens core: domain types, fundamentals alignment, indicators,
//! valuation ratios, crossover signals, and the market-data layer.

pub mod align;
pub mod config;
pub mod crossover;
pub mod data;
pub mod diagnostics;
pub mod domain;
pub mod indicators;
pub mod pipeline;
pub mod ratios;

pub use config::{MetricsConfig, MetricsSettings};
pub use diagnostics::{Diagnostics, Notice};
pub use pipeline::{compute_metrics, MetricsOutput, PipelineError};
