use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Args;

use crate::args::BaseArgs;
use crate::backfill::{
    format_duration, ConsoleReporter, NullSink, Orchestrator, ProgressSink, RunOptions,
    RunSummary, TableStatus, DEFAULT_STEP_SIZE,
};
use crate::catalog;
use crate::config::DbConfig;
use crate::db::{ping, HttpClient};
use crate::ui::{header, styled_table, with_spinner};

const DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Comma-separated table keys to backfill
    #[arg(long, conflicts_with = "all")]
    pub tables: Option<String>,

    /// Backfill every table in the catalog
    #[arg(long)]
    pub all: bool,

    /// First block to backfill (default: resume past the target's max)
    #[arg(long)]
    pub start_block: Option<u64>,

    /// Last block to backfill, inclusive (default: highest block every
    /// source table has)
    #[arg(long)]
    pub end_block: Option<u64>,

    /// Blocks per chunk
    #[arg(long, default_value_t = DEFAULT_STEP_SIZE)]
    pub step_size: u64,

    /// Create missing target tables before backfilling
    #[arg(long)]
    pub create_tables: bool,

    /// Extra attempts for a failed chunk before recording the failure
    #[arg(long, default_value_t = 0)]
    pub max_retries: u32,

    /// Per-statement execution limit in seconds
    #[arg(long, default_value_t = DEFAULT_STATEMENT_TIMEOUT_SECS)]
    pub statement_timeout: u64,
}

/// Returns whether the run was clean: no aborts, no failed chunks, no
/// interrupt. The caller maps that onto the process exit status.
pub async fn run(base: BaseArgs, args: RunArgs) -> Result<bool> {
    let selected = catalog::select(args.tables.as_deref(), args.all)?;
    // Reject bad knobs before opening any connection.
    if args.step_size == 0 {
        bail!("step size must be a positive number of blocks");
    }

    let config = DbConfig::from_env();
    let timeout = Duration::from_secs(args.statement_timeout);
    let source = HttpClient::new(&config.source, Some(timeout))?;
    let target = HttpClient::new(&config.target, Some(timeout))?;

    with_spinner("Connecting to source ClickHouse", ping(&source, "source")).await?;
    with_spinner("Connecting to target ClickHouse", ping(&target, "target")).await?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupt received, finishing the current chunk...");
            flag.store(true, Ordering::Relaxed);
        }
    });

    let options = RunOptions {
        start_override: args.start_block,
        end_override: args.end_block,
        step_size: args.step_size,
        create_tables: args.create_tables,
        max_retries: args.max_retries,
    };
    let orchestrator = Orchestrator::new(&source, &target, options).with_shutdown(shutdown);

    let mut console = ConsoleReporter::new();
    let mut null = NullSink;
    let sink: &mut dyn ProgressSink = if base.json { &mut null } else { &mut console };

    let summary = orchestrator.run(&selected, sink).await?;

    if base.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(summary.is_clean())
}

fn print_summary(summary: &RunSummary) {
    let mut table = styled_table();
    table.set_header(vec![
        header("TABLE"),
        header("STATUS"),
        header("CHUNKS OK"),
        header("FAILED"),
        header("ROWS"),
        header("DURATION"),
    ]);
    for report in &summary.reports {
        let status = match report.status {
            TableStatus::Completed => "completed",
            TableStatus::CompletedWithFailures => "completed with failures",
            TableStatus::Aborted => "aborted",
        };
        table.add_row(vec![
            report.table_key.clone(),
            status.to_string(),
            format!("{}/{}", report.succeeded_chunks, report.total_chunks),
            report.failed_chunks.to_string(),
            report
                .total_rows
                .map(|rows| rows.to_string())
                .unwrap_or_else(|| "?".to_string()),
            format_duration(report.total_duration.as_secs()),
        ]);
    }
    println!();
    println!("{table}");
    if summary.interrupted {
        eprintln!("Run interrupted before all tables completed.");
    }
}
