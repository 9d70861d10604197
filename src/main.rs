//! CLI entry point for the outbreak statistics tool.
//!
//! Provides subcommands for the full analysis run, a standalone dataset
//! summary, and writing filtered subsets of a cleaned table.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use outbreak_stats::{
    analysis::{
        aggregate::top_countries,
        clean::clean,
        filter::{filter_by_country, filter_by_threshold},
        summary::summarize,
    },
    config::Config,
    loader::load_records,
    output::write_records,
    pipeline::Pipeline,
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "outbreak_stats")]
#[command(about = "Per-country and global statistics for outbreak case tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean, aggregate, risk-score and summarize a dataset
    Run {
        /// Input CSV file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory for the result tables (overrides config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Cases per million above which a country is high-risk (overrides config)
        #[arg(long)]
        risk_threshold: Option<f64>,

        /// CSV of `country,population` rows (overrides config)
        #[arg(long)]
        population: Option<PathBuf>,

        /// Log the N countries with the most confirmed cases
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Print dataset-wide statistics as JSON
    Summary {
        /// Input CSV file
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },
    /// Write the cleaned rows matching a country or case threshold
    #[command(group(ArgGroup::new("criterion").required(true).args(["country", "min_confirmed"])))]
    Filter {
        /// Input CSV file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Keep rows for this country (exact match)
        #[arg(long)]
        country: Option<String>,

        /// Keep rows with more confirmed cases than this
        #[arg(long)]
        min_confirmed: Option<u64>,

        /// CSV file to write the subset to
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let _file_guard = init_tracing()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            config,
            output_dir,
            risk_threshold,
            population,
            top,
        } => {
            let mut config = Config::load_or_default(config.as_deref())
                .context("failed to load configuration")?;
            if let Some(dir) = output_dir {
                config.output.dir = dir;
            }
            if let Some(threshold) = risk_threshold {
                config.risk.high_risk_cases_per_million = threshold;
            }
            if let Some(path) = population {
                config.population.file = Some(path);
            }

            let pipeline = Pipeline::from_config(&config)
                .context("failed to load population reference")?;
            let report = pipeline
                .run_file(&input)
                .with_context(|| format!("analysis of {} failed", input.display()))?;

            for (rank, agg) in top_countries(&report.aggregates, top).iter().enumerate() {
                info!(
                    rank = rank + 1,
                    country = %agg.country,
                    total_confirmed = agg.total_confirmed,
                    "Top country"
                );
            }
            for record in report.risk.iter().filter(|r| r.high_risk) {
                warn!(
                    country = %record.country,
                    cases_per_million = record.cases_per_million,
                    "High-risk country"
                );
            }
            info!(summary = ?report.summary, "Run finished");
        }
        Commands::Summary { input } => {
            let cleaned = clean(&load_records(&input)?);
            let summary = summarize(&cleaned).context("summary step failed")?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Filter {
            input,
            country,
            min_confirmed,
            output,
        } => {
            let cleaned = clean(&load_records(&input)?);
            let subset = match (country, min_confirmed) {
                (Some(name), _) => filter_by_country(&cleaned, &name),
                (None, Some(threshold)) => filter_by_threshold(&cleaned, threshold),
                (None, None) => anyhow::bail!("one of --country or --min-confirmed is required"),
            };
            let path = write_records(&output, &subset)
                .with_context(|| format!("failed to write {}", output.display()))?;
            info!(rows = subset.len(), path = %path.display(), "Filtered subset written");
        }
    }

    Ok(())
}

/// Logging setup: colored stderr plus a JSON daily-rolling log file.
fn init_tracing() -> Result<WorkerGuard> {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/outbreak_stats.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("outbreak_stats.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    Ok(guard)
}
