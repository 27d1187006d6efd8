//! Runs the sample data update against a SQLite database

use clap::Parser;
use rusqlite::Connection;
use std::path::PathBuf;
use std::process::ExitCode;

use sample_data_update::utils::{ProgressLog, SqliteStorage};
use sample_data_update::{
    LoanVariant, LookupAttribute, ReconcileResult, RunReport, UpdateConfig, UpdateRunner,
};

#[derive(Parser, Debug)]
#[command(
    name = "sample-data-update",
    about = "Update underwriter name and underwriting group sample data"
)]
struct Args {
    /// SQLite database holding the lookup, sample and import tables
    #[arg(long, short = 'd')]
    database: PathBuf,

    /// TOML config file (defaults apply when omitted)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Log file to write instead of the configured output file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match run(&args).await {
        Ok(report) => {
            print_report(&report, args.json);
            if report.succeeded() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            tracing::error!(error = %err, "sample data update could not complete");
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> ReconcileResult<RunReport> {
    let config = match &args.config {
        Some(path) => UpdateConfig::load(path)?,
        None => UpdateConfig::default(),
    };

    let storage =
        SqliteStorage::with_layout(Connection::open(&args.database)?, config.tables.clone())?;
    let mut runner = UpdateRunner::new(storage, config);
    if let Some(log_file) = &args.log_file {
        runner = runner.with_log_path(log_file);
    }

    let progress = ProgressLog::new();
    runner.run(&progress).await
}

fn print_report(report: &RunReport, json: bool) {
    if json {
        match serde_json::to_string_pretty(report) {
            Ok(text) => println!("{}", text),
            Err(err) => eprintln!("error: cannot serialize report: {}", err),
        }
        return;
    }

    for variant in LoanVariant::ALL {
        match report.counts(variant) {
            Some(c) => println!(
                "{} ({}): {} updated, {} not found, {} skipped, {} update errors",
                variant.label(),
                variant,
                c.updated,
                c.failed,
                c.skipped,
                c.errors
            ),
            None => println!("{} ({}): not processed", variant.label(), variant),
        }
    }

    for attribute in LookupAttribute::ALL {
        match report.pruned(attribute) {
            Some(n) => println!("{} values removed: {}", attribute, n),
            None => println!("{} values removed: not run", attribute),
        }
    }

    if let Some(error) = &report.error {
        println!("Run stopped early: {}", error);
    }
}
