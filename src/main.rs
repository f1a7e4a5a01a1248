//! RKI Report - command line entry point

use anyhow::{Context, Result};
use clap::Parser;
use rki_report::logging::init_logging;
use rki_report::{run, Config, RunOptions};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "rki-report",
    version,
    about = "Normalize the RKI COVID-19 CSV exports and render the report charts"
)]
struct Args {
    /// TOML config file (default: ./rki-report.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the source CSV files
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Output directory for charts, tables and summary.json
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Normalize and analyse only
    #[arg(long)]
    skip_charts: bool,

    /// Also write every normalized table as CSV
    #[arg(long)]
    export_tables: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = Config::resolve(args.config.as_deref()).context("loading configuration")?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(results_dir) = args.results_dir {
        config.results_dir = results_dir;
    }
    info!(
        data_dir = %config.data_dir.display(),
        results_dir = %config.results_dir.display(),
        "starting report"
    );

    let options = RunOptions {
        skip_charts: args.skip_charts,
        export_tables: args.export_tables,
    };
    let summary = run(&config, &options).context("report run failed")?;

    println!(
        "{} cases, {} charts, summary in {}",
        summary.total_cases,
        summary.charts.len(),
        config.results_dir.join(rki_report::pipeline::SUMMARY_FILE).display()
    );
    Ok(())
}
