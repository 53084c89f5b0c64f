//! Reconciler binary.
//!
//! Loads the layered configuration, applies command line overrides, and runs one reconciliation
//! of the remote directory against the relational user table. The end-of-run summary is printed
//! to stdout. Failures print a categorized report to stderr and exit non-zero.

use std::process::ExitCode;

use chrono::NaiveDate;
use clap::Parser;
use reconcile_config::shared::ReconcilerConfig;
use reconcile_telemetry::tracing::init_tracing;
use tracing::{error, info};

use crate::config::load_reconciler_config;
use crate::core::run_reconciler;
use crate::error::{ReconcilerError, ReconcilerResult};

mod config;
mod core;
mod error;
mod migrations;

/// Reconciles the remote user directory against the relational user table.
#[derive(Parser, Debug)]
#[command(name = "reconciler")]
#[command(about = "Matches directory users to relational users and writes comparison records")]
pub struct Args {
    /// Debug output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Match and count without writing to the sink database
    #[arg(long)]
    dry_run: bool,

    /// Delete this worker's rows for the report date before loading
    #[arg(long)]
    delete_existing: bool,

    /// (YYYY-MM-DD) Date stored with every record and compared to last active dates
    #[arg(long)]
    report_date: Option<NaiveDate>,

    /// Worker id stored with every record written
    #[arg(long)]
    worker_id: Option<u16>,

    /// First directory page to fetch
    #[arg(long)]
    start_page: Option<u32>,

    /// Last directory page to fetch
    #[arg(long)]
    end_page: Option<u32>,

    /// Seconds to wait on an empty queue before treating its source as exhausted
    #[arg(long)]
    timeout: Option<u64>,

    /// Number of match records per bulk insert
    #[arg(long)]
    output_batch_size: Option<usize>,

    /// Print the DDL of the match table and exit
    #[arg(long)]
    print_ddl: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.print_ddl {
        println!("{}", migrations::MATCH_TABLE_DDL);
        return ExitCode::SUCCESS;
    }

    match try_main(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

fn try_main(args: &Args) -> ReconcilerResult<()> {
    init_tracing(args.verbose).map_err(ReconcilerError::config)?;

    let config = load_reconciler_config(args)?;

    // We start the runtime.
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(config))
}

async fn async_main(config: ReconcilerConfig) -> ReconcilerResult<()> {
    let summary = run_reconciler(config).await?;

    println!("{}", summary.collector.render_summary()?);
    info!("job complete");

    Ok(())
}
