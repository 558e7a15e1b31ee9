//! Forecast backtesting CLI
//!
//! # Usage
//!
//! ```bash
//! # Backtest every column of a file with the configured models
//! forecast-backtest run --config config/default.toml --data data/sales.csv
//!
//! # Same, writing all results as JSON
//! forecast-backtest run --data data/sales.csv --output results/sales.json
//!
//! # Lead/lag analysis of one column against the others
//! forecast-backtest xcorr --data data/sales.csv --target revenue --max-lags 30
//!
//! # Check a configuration file
//! forecast-backtest validate-config --config config/default.toml
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use forecast_backtest::analytics::{autocorrelation, CorrelationMode, CrossCorrelationAnalyzer};
use forecast_backtest::data::DataLoader;
use forecast_backtest::scenario::{AppConfig, ScenarioRunner};

const SEPARATOR: &str = "============================================================";

/// Forecast backtesting CLI.
#[derive(Parser)]
#[command(name = "forecast-backtest")]
#[command(about = "Rolling-origin backtesting and cross-correlation of time series")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest every column of a data file
    Run {
        /// Path to configuration file (defaults are used when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// CSV or Parquet data file
        #[arg(short, long)]
        data: PathBuf,

        /// Date column (first column by default)
        #[arg(long)]
        date_column: Option<String>,

        /// Comma-separated list of columns to backtest
        #[arg(long)]
        columns: Option<String>,

        /// Write all results as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Cross-correlate one column against the others
    Xcorr {
        /// CSV or Parquet data file
        #[arg(short, long)]
        data: PathBuf,

        /// Target column
        #[arg(short, long)]
        target: String,

        /// Date column (first column by default)
        #[arg(long)]
        date_column: Option<String>,

        /// Largest lag in both directions
        #[arg(long, default_value_t = 120)]
        max_lags: usize,

        /// Comma-separated correlation modes
        #[arg(long, default_value = "pearson,kendall,spearman,matlab_normalized")]
        modes: String,

        /// Only print peaks above this absolute correlation
        #[arg(long, default_value_t = 0.0)]
        threshold: f64,

        /// Also print the target's significant autocorrelation lags
        #[arg(long)]
        acf: bool,
    },

    /// Parse and validate a configuration file
    ValidateConfig {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("Invalid configuration {}", path.display())),
        None => Ok(AppConfig::default()),
    }
}

fn loader(data: &Path, date_column: Option<&str>) -> Result<DataLoader> {
    let path = data.to_str().context("Data path is not valid UTF-8")?;
    let mut loader = DataLoader::new(path);
    if let Some(column) = date_column {
        loader = loader.with_date_column(column);
    }
    Ok(loader)
}

fn cmd_run(
    config: Option<PathBuf>,
    data: PathBuf,
    date_column: Option<String>,
    columns: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config.as_deref())?;
    let mut frame = loader(&data, date_column.as_deref())?
        .load()
        .with_context(|| format!("Failed to load {}", data.display()))?;

    if let Some(columns) = columns {
        let names: Vec<&str> = columns.split(',').map(|s| s.trim()).collect();
        frame = frame.select(&names).context("Unknown column")?;
    }

    info!(
        "Loaded {} rows x {} columns from {}",
        frame.len(),
        frame.width(),
        data.display()
    );

    let passes = if config.regressor_selection().is_some() { 2 } else { 1 };
    let pb = ProgressBar::new((frame.width() * passes) as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let runner = ScenarioRunner::new(config);
    let outcomes = runner.run_with_progress(&frame, |scenario| {
        pb.set_message(scenario.to_string());
        pb.inc(1);
    });
    pb.finish_with_message("done");

    println!("{}", SEPARATOR);
    for outcome in &outcomes {
        println!("{}", outcome.summary());
        if let Some(best) = outcome.best_model() {
            println!("Best model for '{}': {}", outcome.scenario, best.model);
        }
        println!("{}", SEPARATOR);
    }

    if let Some(output) = output {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&outcomes)?;
        fs::write(&output, json).with_context(|| format!("Failed to write {}", output.display()))?;
        println!("Results written to {}", output.display());
    }

    let failed = outcomes
        .iter()
        .filter(|o| o.models.iter().all(|m| m.result.is_none()))
        .count();
    if failed == outcomes.len() && !outcomes.is_empty() {
        bail!("Every scenario failed");
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_xcorr(
    data: PathBuf,
    target: String,
    date_column: Option<String>,
    max_lags: usize,
    modes: String,
    threshold: f64,
    acf: bool,
) -> Result<()> {
    let modes = modes
        .split(',')
        .map(|s| s.parse::<CorrelationMode>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(anyhow::Error::msg)?;

    let frame = loader(&data, date_column.as_deref())?
        .load()
        .with_context(|| format!("Failed to load {}", data.display()))?;

    let result = CrossCorrelationAnalyzer::compute(&target, &frame, max_lags, &modes)
        .with_context(|| format!("Cannot cross-correlate '{}'", target))?;

    println!("{}", SEPARATOR);
    println!("{}", result.summary());
    println!("{}", SEPARATOR);

    let edges = result.edges(threshold);
    if edges.is_empty() {
        println!("No correlations above {:.2}", threshold);
    }
    for (mode, peak) in edges {
        println!(
            "{:<18} {:<20} lag {:>5}  r = {:>7.4}",
            mode.as_str(), peak.column, peak.lag, peak.correlation
        );
    }

    if acf {
        let values = frame.values(&target)?;
        let acf = autocorrelation(values);
        println!();
        println!(
            "Autocorrelation of '{}': 95% band ±{:.4}, 99% band ±{:.4}",
            target, acf.band_95, acf.band_99
        );
        let significant: Vec<String> = acf
            .significant_lags()
            .iter()
            .take(20)
            .map(|l| l.to_string())
            .collect();
        println!("Significant lags: {}", significant.join(", "));
    }

    Ok(())
}

fn cmd_validate_config(config: PathBuf) -> Result<()> {
    let config = load_config(Some(config.as_path()))?;
    println!("Configuration OK");
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("forecast_backtest=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            data,
            date_column,
            columns,
            output,
        } => cmd_run(config, data, date_column, columns, output)?,
        Commands::Xcorr {
            data,
            target,
            date_column,
            max_lags,
            modes,
            threshold,
            acf,
        } => cmd_xcorr(data, target, date_column, max_lags, modes, threshold, acf)?,
        Commands::ValidateConfig { config } => cmd_validate_config(config)?,
    }

    Ok(())
}
