//! Application configuration loaded from TOML.
//!
//! ```toml
//! [data_settings]
//! historical_period = "5y"
//! sma_short_window = 50
//! min_trading_days_for_sma = 200
//! rolling_days_for_52week = 252
//!
//! [storage]
//! db_path = "financial_data.db"
//!
//! [cache]
//! cache_dir = "data"
//! ```
//!
//! Every section and key is optional.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tickerlens_core::{MetricsConfig, MetricsSettings};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid historical_period '{0}' (expected e.g. 5y, 6mo, 30d)")]
    InvalidPeriod(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_settings: DataSettings,
    pub storage: StorageSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// How far back to fetch prices: `<n>y`, `<n>mo` or `<n>d`.
    pub historical_period: String,
    /// Window keys; unset ones take the metrics defaults.
    #[serde(flatten)]
    pub windows: MetricsSettings,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            historical_period: "5y".into(),
            windows: MetricsSettings::default(),
        }
    }
}

impl DataSettings {
    pub fn metrics(&self) -> MetricsConfig {
        MetricsConfig::from(self.windows)
    }

    pub fn period_days(&self) -> Result<i64, ConfigError> {
        parse_period(&self.historical_period)
    }

    /// First date of the history window ending at `end`.
    pub fn start_date(&self, end: NaiveDate) -> Result<NaiveDate, ConfigError> {
        Ok(end - chrono::Duration::days(self.period_days()?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub db_path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("financial_data.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub cache_dir: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("data"),
        }
    }
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.data_settings.period_days()?;
        Ok(config)
    }

    /// Load `path`, or fall back to defaults with a warning when the file is
    /// missing or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            return Self::default();
        }
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not load config, using defaults");
                Self::default()
            }
        }
    }
}

fn parse_period(raw: &str) -> Result<i64, ConfigError> {
    let s = raw.trim().to_ascii_lowercase();
    let invalid = || ConfigError::InvalidPeriod(raw.to_string());

    let (digits, per_unit) = if let Some(n) = s.strip_suffix("mo") {
        (n, 30)
    } else if let Some(n) = s.strip_suffix('y') {
        (n, 365)
    } else if let Some(n) = s.strip_suffix('d') {
        (n, 1)
    } else {
        return Err(invalid());
    };

    let n: i64 = digits.parse().map_err(|_| invalid())?;
    if n <= 0 {
        return Err(invalid());
    }
    Ok(n * per_unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_toml_is_default() {
        let cfg = AppConfig::from_toml("").unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.data_settings.period_days().unwrap(), 5 * 365);
        assert_eq!(cfg.storage.db_path, PathBuf::from("financial_data.db"));
    }

    #[test]
    fn data_settings_carry_metric_windows() {
        let cfg = AppConfig::from_toml(
            r#"
            [data_settings]
            historical_period = "2y"
            sma_short_window = 20
            min_trading_days_for_sma = 100
            something_else = true

            [cache]
            cache_dir = "/tmp/tl"
            "#,
        )
        .unwrap();
        let metrics = cfg.data_settings.metrics();
        assert_eq!(metrics.sma_short_window, 20);
        assert_eq!(metrics.sma_long_window, 100);
        assert_eq!(metrics.rolling_days_for_52week, 252);
        assert_eq!(cfg.data_settings.period_days().unwrap(), 730);
        assert_eq!(cfg.cache.cache_dir, PathBuf::from("/tmp/tl"));
    }

    #[test]
    fn periods_parse() {
        assert_eq!(parse_period("6mo").unwrap(), 180);
        assert_eq!(parse_period(" 30D ").unwrap(), 30);
        assert!(parse_period("max").is_err());
        assert!(parse_period("0y").is_err());
        assert!(AppConfig::from_toml("[data_settings]\nhistorical_period = \"soon\"").is_err());
    }

    #[test]
    fn missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::load_or_default(&dir.path().join("absent.toml"));
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn both_long_window_spellings_parse() {
        let cfg = AppConfig::from_toml(
            "[data_settings]\nsma_long_window = 180\nmin_trading_days_for_sma = 200",
        )
        .unwrap();
        assert_eq!(cfg.data_settings.metrics().sma_long_window, 180);

        let legacy_only = AppConfig::from_toml("[data_settings]\nmin_trading_days_for_sma = 120").unwrap();
        assert_eq!(legacy_only.data_settings.metrics().sma_long_window, 120);
    }

    #[test]
    fn unparsable_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[data_settings\nsma_short_window = ").unwrap();
        assert!(AppConfig::from_file(&path).is_err());
        assert_eq!(AppConfig::load_or_default(&path), AppConfig::default());
    }

    #[test]
    fn start_date_counts_back() {
        let settings = DataSettings {
            historical_period: "10d".into(),
            ..Default::default()
        };
        let end = NaiveDate::from_ymd_opt(2024, 1, 11).unwrap();
        assert_eq!(settings.start_date(end).unwrap(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    proptest! {
        #[test]
        fn period_units_scale(n in 1i64..500) {
            prop_assert_eq!(parse_period(&format!("{n}d")).unwrap(), n);
            prop_assert_eq!(parse_period(&format!("{n}mo")).unwrap(), n * 30);
            prop_assert_eq!(parse_period(&format!("{n}Y")).unwrap(), n * 365);
        }
    }
}
