//! Chenfuel CLI - Command line interface for ledger analysis.
//!
//! Prints JSON on stdout for the dashboard build; logs go to stderr.

use anyhow::{Context, Result};
use chenfuel_core::{
    run_analysis, AnalysisConfig, AnalysisReport, ApiResponse, JsonFileSink, JsonLedgerSource,
    ResultSink, StaticMarketData, TransactionSource,
};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "chenfuel")]
#[command(about = "Chenfuel portfolio analysis - performance, risk and opportunity cost")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis
    Analyze {
        #[command(flatten)]
        input: InputArgs,
        /// Also write the report to this JSON file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Print only the summary statistics
    Summary {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Ledger file (JSON array of transaction rows)
    #[arg(short, long)]
    ledger: PathBuf,
    /// Market snapshot with tickers, prices and FX quotes
    #[arg(short, long)]
    market: Option<PathBuf>,
    /// Config file (defaults to ~/.chenfuel/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Date stamped on the report (YYYY-MM-DD)
    #[arg(long)]
    as_of: Option<NaiveDate>,
}

impl InputArgs {
    fn run(&self) -> Result<AnalysisReport> {
        let config = match &self.config {
            Some(path) => AnalysisConfig::load_from_path(path),
            None => AnalysisConfig::load(),
        }
        .context("loading config")?;

        let market = match &self.market {
            Some(path) => StaticMarketData::load_from_path(path)
                .with_context(|| format!("loading market snapshot {}", path.display()))?,
            None => {
                tracing::warn!(
                    "No market snapshot given; FX uses defaults and opportunities are skipped"
                );
                StaticMarketData::new()
            }
        };

        let batch = JsonLedgerSource::new(&self.ledger)
            .load(&config)
            .with_context(|| format!("loading ledger {}", self.ledger.display()))?;

        Ok(run_analysis(&batch, &market, &config, self.as_of))
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let output = match cli.command {
        Commands::Analyze { input, out } => handle_analyze(&input, out),
        Commands::Summary { input } => handle_summary(&input),
    };

    println!("{}", output?);
    Ok(())
}

fn handle_analyze(input: &InputArgs, out: Option<PathBuf>) -> Result<String> {
    let report = match input.run() {
        Ok(report) => report,
        Err(e) => return error_response(e),
    };

    if let Some(path) = out {
        if let Err(e) = JsonFileSink::new(path).publish(&report) {
            return Ok(serde_json::to_string_pretty(&ApiResponse::<()>::err(e.to_string()))?);
        }
    }

    Ok(serde_json::to_string_pretty(&ApiResponse::ok(report))?)
}

fn handle_summary(input: &InputArgs) -> Result<String> {
    match input.run() {
        Ok(report) => Ok(serde_json::to_string_pretty(&ApiResponse::ok(json!({
            "summary": report.summary,
            "data_quality": report.data_quality,
            "row_count": report.metadata.row_count,
        })))?),
        Err(e) => error_response(e),
    }
}

fn error_response(e: anyhow::Error) -> Result<String> {
    tracing::error!("{:#}", e);
    Ok(serde_json::to_string_pretty(&ApiResponse::<()>::err(format!("{e:#}")))?)
}
