//! tickerlens CLI: analyze, download, signals and cache commands.
//!
//! Commands:
//! - `analyze`: compute daily metrics and crossover signals, persist, write a summary
//! - `download`: fetch bars and fundamentals from Yahoo Finance into the Parquet cache
//! - `signals`: list persisted crossover events for a ticker
//! - `cache status`: report cached symbols, date ranges and fundamentals

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tickerlens_core::data::{
    download_symbols, CircuitBreaker, DataProvider, LogProgress, ParquetCache, YahooProvider,
};
use tickerlens_runner::export::{write_metrics_csv, write_summary};
use tickerlens_runner::{
    run_tickers, AppConfig, LoadOptions, MetricsSink, RunContext, RunSummary, SqliteStore,
    TickerRun,
};

#[derive(Parser)]
#[command(
    name = "tickerlens",
    about = "Daily stock metrics, valuation ratios and moving-average crossover signals"
)]
struct Cli {
    /// Debug-level logging (RUST_LOG takes precedence).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute metrics and signals for one or more tickers.
    Analyze {
        /// Ticker symbol (e.g. NVDA or RELIANCE.NS). Repeat for several.
        #[arg(short, long = "ticker", required = true)]
        tickers: Vec<String>,

        /// Output JSON path for the run summary.
        #[arg(short, long)]
        output: PathBuf,

        /// Path to the TOML config file.
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,

        /// SQLite database path. Overrides `[storage] db_path`.
        #[arg(short, long)]
        db: Option<PathBuf>,

        /// Cache directory. Overrides `[cache] cache_dir`.
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Offline mode: no network access.
        #[arg(long, default_value_t = false)]
        offline: bool,

        /// Use synthetic data as fallback. Synthetic runs are never persisted.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Re-download even when the cache covers the requested range.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Also write the metrics table as CSV (one file per ticker when several).
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Skip writing to the database.
        #[arg(long, default_value_t = false)]
        no_persist: bool,
    },
    /// Download market data from Yahoo Finance and cache as Parquet.
    Download {
        /// Symbols to download (e.g., NVDA AAPL MSFT).
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Start date (YYYY-MM-DD). Defaults to 5 years ago.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Force re-download even if cached.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
    /// List persisted crossover events for a ticker.
    Signals {
        #[arg(short, long)]
        ticker: String,

        /// SQLite database path.
        #[arg(short, long, default_value = "financial_data.db")]
        db: PathBuf,

        /// Print as JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached symbols, date ranges and fundamentals.
    Status {
        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Analyze {
            tickers,
            output,
            config,
            db,
            cache_dir,
            offline,
            synthetic,
            force,
            csv,
            no_persist,
        } => run_analyze(AnalyzeArgs {
            tickers,
            output,
            config,
            db,
            cache_dir,
            offline,
            synthetic,
            force,
            csv,
            no_persist,
        }),
        Commands::Download {
            symbols,
            start,
            end,
            force,
            cache_dir,
        } => run_download(symbols, start, end, force, cache_dir),
        Commands::Signals { ticker, db, json } => run_signals(&ticker, &db, json),
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => run_cache_status(&cache_dir),
        },
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

struct AnalyzeArgs {
    tickers: Vec<String>,
    output: PathBuf,
    config: PathBuf,
    db: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    offline: bool,
    synthetic: bool,
    force: bool,
    csv: Option<PathBuf>,
    no_persist: bool,
}

fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let app = AppConfig::load_or_default(&args.config);
    let db_path = args.db.unwrap_or_else(|| app.storage.db_path.clone());
    let cache_dir = args.cache_dir.unwrap_or_else(|| app.cache.cache_dir.clone());

    let end = chrono::Local::now().date_naive();
    let start = app.data_settings.start_date(end)?;
    tracing::debug!(
        %start,
        %end,
        db = %db_path.display(),
        cache = %cache_dir.display(),
        "analyze settings"
    );

    let cache = ParquetCache::new(&cache_dir);
    let provider = if args.offline {
        None
    } else {
        Some(YahooProvider::new(Arc::new(CircuitBreaker::default_provider()))?)
    };
    let provider_ref = provider.as_ref().map(|p| p as &dyn DataProvider);

    let ctx = RunContext {
        cache: &cache,
        provider: provider_ref,
        load: LoadOptions {
            start,
            end,
            offline: args.offline,
            synthetic: args.synthetic,
            force: args.force,
        },
        metrics: app.data_settings.metrics(),
    };

    let mut store = if args.no_persist {
        None
    } else {
        Some(
            SqliteStore::open(&db_path)
                .with_context(|| format!("failed to open database {}", db_path.display()))?,
        )
    };
    let sink = store.as_mut().map(|s| s as &mut dyn MetricsSink);

    let symbols: Vec<&str> = args.tickers.iter().map(String::as_str).collect();
    let results = run_tickers(&symbols, &ctx, sink);

    let runs: Vec<&TickerRun> = results.iter().filter_map(|(_, r)| r.as_ref().ok()).collect();
    print_table(&runs);

    if !runs.is_empty() {
        let summaries: Vec<RunSummary> = runs.iter().map(|r| r.summary.clone()).collect();
        write_summary(&args.output, &summaries)?;
        println!("Summary saved to: {}", args.output.display());
    }

    if let Some(csv_path) = &args.csv {
        for run in &runs {
            let path = if runs.len() == 1 {
                csv_path.clone()
            } else {
                per_ticker_path(csv_path, &run.summary.ticker)
            };
            write_metrics_csv(&path, &run.output.rows)?;
            println!("Metrics CSV saved to: {}", path.display());
        }
    }

    let failed: Vec<_> = results.iter().filter(|(_, r)| r.is_err()).collect();
    if !failed.is_empty() {
        for (sym, err) in &failed {
            if let Err(e) = err {
                eprintln!("Error for {sym}: {e}");
            }
        }
        bail!("{} of {} ticker(s) failed", failed.len(), results.len());
    }
    Ok(())
}

/// `metrics.csv` + `NVDA` → `metrics_NVDA.csv`
fn per_ticker_path(base: &Path, ticker: &str) -> PathBuf {
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("metrics");
    let ext = base.extension().and_then(|s| s.to_str()).unwrap_or("csv");
    base.with_file_name(format!("{stem}_{ticker}.{ext}"))
}

fn print_table(runs: &[&TickerRun]) {
    if runs.is_empty() {
        return;
    }
    println!();
    println!(
        "{:<12} {:<14} {:>6} {:>8} {:<28} {:>6}",
        "Ticker", "Prices", "Rows", "Signals", "Last Signal", "Notes"
    );
    println!("{}", "-".repeat(79));
    for run in runs {
        let s = &run.summary;
        let last = s
            .signals
            .last()
            .map(|e| format!("{} {}", e.date, e.signal))
            .unwrap_or_else(|| "-".into());
        let source = serde_json::to_value(s.price_source)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        println!(
            "{:<12} {:<14} {:>6} {:>8} {:<28} {:>6}",
            s.ticker,
            source,
            s.metrics_count,
            s.signals.len(),
            last,
            s.diagnostics.len()
        );
    }
    for run in runs {
        if run.summary.has_synthetic {
            println!("WARNING: {} results based on SYNTHETIC data", run.summary.ticker);
        }
    }
    println!();
}

fn parse_date_arg(arg: Option<&str>, default: NaiveDate) -> Result<NaiveDate> {
    arg.map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'")))
        .transpose()
        .map(|d| d.unwrap_or(default))
}

fn run_download(
    symbols: Vec<String>,
    start: Option<String>,
    end: Option<String>,
    force: bool,
    cache_dir: PathBuf,
) -> Result<()> {
    let today = chrono::Local::now().date_naive();
    let end_date = parse_date_arg(end.as_deref(), today)?;
    let start_date = parse_date_arg(start.as_deref(), end_date - chrono::Duration::days(365 * 5))?;
    if start_date > end_date {
        bail!("--start {start_date} is after --end {end_date}");
    }

    let provider = YahooProvider::new(Arc::new(CircuitBreaker::default_provider()))?;
    let cache = ParquetCache::new(cache_dir);
    let sym_refs: Vec<&str> = symbols.iter().map(String::as_str).collect();

    let summary = download_symbols(
        &provider,
        &cache,
        &sym_refs,
        start_date,
        end_date,
        force,
        &LogProgress,
    );

    if !summary.all_succeeded() {
        for (sym, err) in &summary.errors {
            eprintln!("Error for {sym}: {err}");
        }
        bail!("{} of {} download(s) failed", summary.failed, summary.total);
    }
    Ok(())
}

fn run_signals(ticker: &str, db: &Path, json: bool) -> Result<()> {
    if !db.exists() {
        bail!("database does not exist: {}", db.display());
    }
    let store = SqliteStore::open(db)?;
    let events = store.signals(ticker)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }
    if events.is_empty() {
        println!("No signals stored for {ticker}.");
        return Ok(());
    }

    println!("{:<12} {:<12} {:<14} {:>12} {:>12}", "Ticker", "Date", "Signal", "Short", "Long");
    println!("{}", "-".repeat(66));
    for e in &events {
        let meta = |key: &str| {
            e.metadata
                .as_ref()
                .and_then(|m| m.get(key))
                .map(|v| format!("{v:.2}"))
                .unwrap_or_else(|| "-".into())
        };
        println!(
            "{:<12} {:<12} {:<14} {:>12} {:>12}",
            e.ticker,
            e.date.to_string(),
            e.kind.as_str(),
            meta("sma_short"),
            meta("sma_long")
        );
    }
    Ok(())
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cache = ParquetCache::new(cache_dir);
    let symbols = cache.symbols();
    if symbols.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    let refs: Vec<&str> = symbols.iter().map(String::as_str).collect();
    let statuses = cache.status(&refs);
    let total_size: u64 = symbols
        .iter()
        .map(|s| dir_size(&cache_dir.join(format!("symbol={s}"))))
        .sum();

    println!("Cache: {}", cache_dir.display());
    println!("Symbols: {}", symbols.len());
    println!("Total size: {}", format_size(total_size));
    println!();
    println!("{:<10} {:<25} {:<12} {:<13}", "Symbol", "Date Range", "Bars", "Fundamentals");
    println!("{}", "-".repeat(62));
    for st in &statuses {
        let range = match (st.start_date, st.end_date) {
            (Some(a), Some(b)) => format!("{a} to {b}"),
            _ => "(no meta)".into(),
        };
        let bars = st
            .bar_count
            .map(|n| format!("{n} bars"))
            .unwrap_or_else(|| "-".into());
        let fundamentals = if st.has_fundamentals { "yes" } else { "no" };
        println!("{:<10} {:<25} {:<12} {:<13}", st.symbol, range, bars, fundamentals);
    }
    Ok(())
}

fn dir_size(path: &Path) -> u64 {
    std::fs::read_dir(path)
        .map(|entries| {
            entries
                .flatten()
                .filter_map(|e| e.metadata().ok())
                .map(|m| m.len())
                .sum()
        })
        .unwrap_or(0)
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
