//! Cross-asset signal CLI.
//!
//! # Usage
//!
//! ```bash
//! # Latest z-scores, volatilities and target positions
//! mahler-signals signals --config config/default.toml --data data/prices
//!
//! # Replay the policy over the full history
//! mahler-signals backtest --config config/default.toml --data data/prices
//!
//! # Grid search over the [sweep] section of the config
//! mahler-signals optimize --config config/default.toml --data data/prices --top 5
//!
//! # Integrity checks on the raw files and spliced series
//! mahler-signals validate --config config/default.toml --data data/prices
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use mahler_signals::data::{Granularity, PriceFileLoader};
use mahler_signals::pipeline::{self, SplicedData};
use mahler_signals::report::ReportFormatter;
use mahler_signals::sweep::ParameterSweep;
use mahler_signals::validation::SeriesValidator;
use mahler_signals::PipelineConfig;

const SEPARATOR: &str = "============================================================";

#[derive(Parser)]
#[command(name = "mahler-signals")]
#[command(about = "Cross-asset z-score signals and volatility-targeted futures positions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the latest signals and target positions
    Signals {
        /// Path to configuration file
        #[arg(short, long, default_value = "config/default.toml")]
        config: PathBuf,

        /// Path to data directory
        #[arg(short, long, default_value = "data/prices")]
        data: PathBuf,

        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Backtest the policy over the full history
    Backtest {
        /// Path to configuration file
        #[arg(short, long, default_value = "config/default.toml")]
        config: PathBuf,

        /// Path to data directory
        #[arg(short, long, default_value = "data/prices")]
        data: PathBuf,

        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Run the parameter sweep from the config's [sweep] section
    Optimize {
        /// Path to configuration file
        #[arg(short, long, default_value = "config/default.toml")]
        config: PathBuf,

        /// Path to data directory
        #[arg(short, long, default_value = "data/prices")]
        data: PathBuf,

        /// Number of ranked results to print
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },

    /// Check raw price files and spliced series
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "config/default.toml")]
        config: PathBuf,

        /// Path to data directory
        #[arg(short, long, default_value = "data/prices")]
        data: PathBuf,

        /// Largest allowed calendar gap between observations, in days
        #[arg(long, default_value_t = SeriesValidator::DEFAULT_MAX_GAP_DAYS)]
        max_gap_days: i64,
    },
}

fn load_config(path: &Path) -> Result<PipelineConfig> {
    PipelineConfig::from_file(path)
        .with_context(|| format!("Failed to load config {}", path.display()))
}

fn load_data(config: &PipelineConfig, data: &Path) -> Result<SplicedData> {
    let loader = PriceFileLoader::new(data);
    pipeline::load_spliced(config, &loader)
        .with_context(|| format!("Failed to load prices from {}", data.display()))
}

fn cmd_signals(config: PathBuf, data: PathBuf, json: bool) -> Result<()> {
    let config = load_config(&config)?;
    let spliced = load_data(&config, &data)?;
    let report = pipeline::run_signals(&config, &spliced).context("Signal run failed")?;

    let formatter = ReportFormatter::default();
    if json {
        println!("{}", formatter.to_json(&report)?);
    } else {
        println!("{}", SEPARATOR);
        print!("{}", formatter.signal_text(&report));
        println!("{}", SEPARATOR);
    }
    Ok(())
}

fn cmd_backtest(config: PathBuf, data: PathBuf, json: bool) -> Result<()> {
    let config = load_config(&config)?;
    let spliced = load_data(&config, &data)?;
    let report = pipeline::run_backtest(&config, &spliced).context("Backtest failed")?;

    let formatter = ReportFormatter::default();
    if json {
        println!("{}", formatter.to_json(&report)?);
    } else {
        println!("{}", SEPARATOR);
        print!("{}", formatter.backtest_text(&report));
        println!("{}", SEPARATOR);
    }
    Ok(())
}

fn cmd_optimize(config: PathBuf, data: PathBuf, top: usize, json: bool) -> Result<()> {
    let config = load_config(&config)?;
    if config.sweep.is_none() {
        info!("No [sweep] section, evaluating the base parameters only");
    }
    let spliced = load_data(&config, &data)?;
    let sweep = ParameterSweep::from_config(config);

    let pb = ProgressBar::new(sweep.total_combinations() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );
    pb.set_message("backtests");

    let result = sweep
        .run_with_progress(&spliced, |done, _| pb.set_position(done as u64))
        .context("Parameter sweep failed")?;
    pb.finish_and_clear();

    if json {
        let ranked: Vec<_> = result.entries.iter().take(top).collect();
        println!("{}", ReportFormatter::default().to_json(&ranked)?);
        return Ok(());
    }

    println!("{}", SEPARATOR);
    println!("{}", result.summary());
    println!("{}", SEPARATOR);
    println!(
        "{:>4}  {:<40} {:>8} {:>14} {:>14}",
        "rank", "parameters", "IR", "pnl mean", "max drawdown"
    );
    for (i, entry) in result.entries.iter().take(top).enumerate() {
        println!(
            "{:>4}  {:<40} {:>8.3} {:>14.2} {:>14.2}",
            i + 1,
            entry.params.key(),
            entry.metrics.information_ratio,
            entry.metrics.pnl_mean,
            entry.metrics.max_drawdown,
        );
    }
    Ok(())
}

fn cmd_validate(config: PathBuf, data: PathBuf, max_gap_days: i64) -> Result<()> {
    let config = load_config(&config)?;
    let loader = PriceFileLoader::new(&data);
    let validator = SeriesValidator::new(max_gap_days);

    let mut reports = Vec::new();
    for symbol in config.instruments.monitored() {
        for granularity in [Granularity::Daily, Granularity::Intraday] {
            if granularity == Granularity::Intraday
                && !loader.csv_path(&symbol, granularity).exists()
            {
                continue;
            }
            let report = validator
                .validate_file(&loader, &symbol, granularity)
                .with_context(|| format!("Failed to validate {} {:?}", symbol, granularity))?;
            reports.push(report);
        }
    }

    let spliced = load_data(&config, &data)?;
    reports.extend(spliced.values().map(|s| validator.validate_series(s)));

    print!("{}", ReportFormatter::default().validation_text(&reports));

    let failed = reports.iter().filter(|r| !r.all_passed()).count();
    if failed > 0 {
        bail!("{} of {} series failed validation", failed, reports.len());
    }
    println!("All {} series passed", reports.len());
    Ok(())
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mahler_signals=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Signals { config, data, json } => cmd_signals(config, data, json)?,
        Commands::Backtest { config, data, json } => cmd_backtest(config, data, json)?,
        Commands::Optimize {
            config,
            data,
            top,
            json,
        } => cmd_optimize(config, data, top, json)?,
        Commands::Validate {
            config,
            data,
            max_gap_days,
        } => cmd_validate(config, data, max_gap_days)?,
    }

    Ok(())
}
