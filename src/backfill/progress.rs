use std::io::IsTerminal;
use std::time::{Duration, Instant};

use dialoguer::console;
use indicatif::{ProgressBar, ProgressStyle};

use crate::backfill::executor::ChunkResult;
use crate::backfill::orchestrator::{TableReport, TableStatus};
use crate::backfill::range::BlockRange;
use crate::catalog::TableSpec;

/// Observational events emitted by the orchestrator. They never affect
/// control flow.
pub enum BackfillEvent<'a> {
    /// Non-fatal problem while resolving a table's block range, e.g. a
    /// source table whose bounds could not be read.
    ResolutionWarning {
        table: &'a str,
        detail: String,
    },
    TableStarted {
        spec: &'a TableSpec,
        range: BlockRange,
        total_chunks: u64,
        step_size: u64,
    },
    ChunkStarted {
        chunk: BlockRange,
    },
    ChunkCompleted {
        result: &'a ChunkResult,
        note: Option<&'static str>,
    },
    TableCompleted {
        report: &'a TableReport,
    },
}

pub trait ProgressSink {
    fn on_event(&mut self, event: BackfillEvent<'_>);
}

/// Sink that drops everything; the orchestrator's correctness never depends
/// on reporting.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_event(&mut self, _event: BackfillEvent<'_>) {}
}

/// Renders per-chunk progress, throughput, and an ETA from the cumulative
/// average rate observed so far.
pub struct ConsoleReporter {
    bar: Option<ProgressBar>,
    started: Instant,
    total_blocks: u64,
    blocks_done: u64,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        ConsoleReporter {
            bar: None,
            started: Instant::now(),
            total_blocks: 0,
            blocks_done: 0,
        }
    }

    fn println(&self, line: &str) {
        match &self.bar {
            Some(bar) => bar.println(line),
            None => println!("{line}"),
        }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleReporter {
    fn on_event(&mut self, event: BackfillEvent<'_>) {
        match event {
            BackfillEvent::ResolutionWarning { table, detail } => {
                self.println(&format!(
                    "{} {table}: {detail}",
                    console::style("!").dim()
                ));
            }
            BackfillEvent::TableStarted {
                spec,
                range,
                total_chunks,
                step_size,
            } => {
                self.started = Instant::now();
                self.total_blocks = range.blocks();
                self.blocks_done = 0;

                println!();
                println!("{}", console::style(spec.description).bold());
                println!("  Target table:  {}", spec.target_table);
                println!("  Source tables: {}", spec.source_tables.join(", "));
                println!(
                    "  Block range:   {} to {} ({} blocks, {} chunks of {})",
                    range.start_block,
                    range.end_block,
                    range.blocks(),
                    total_chunks,
                    step_size
                );

                if std::io::stderr().is_terminal() {
                    let bar = ProgressBar::new(self.total_blocks);
                    bar.set_style(
                        ProgressStyle::default_bar()
                            .template("{bar:40.cyan/blue} {pos}/{len} blocks {msg}")
                            .unwrap(),
                    );
                    self.bar = Some(bar);
                }
            }
            BackfillEvent::ChunkStarted { .. } => {}
            BackfillEvent::ChunkCompleted { result, note } => {
                self.blocks_done += result.chunk.blocks();
                if let Some(bar) = &self.bar {
                    bar.set_position(self.blocks_done);
                }

                let elapsed = self.started.elapsed().as_secs_f64().max(0.001);
                let rate = self.blocks_done as f64 / elapsed;
                let remaining = self.total_blocks.saturating_sub(self.blocks_done);
                let eta = Duration::from_secs_f64(remaining as f64 / rate.max(0.001));

                let note = note.map(|n| format!(" ({n})")).unwrap_or_default();
                let line = match &result.outcome {
                    super::executor::ChunkOutcome::Success { rows_written } => {
                        let rows = rows_written
                            .map(|r| r.to_string())
                            .unwrap_or_else(|| "?".to_string());
                        format!(
                            "Processed blocks {:>10} - {:>10}{note} | {:>6.2}s | {rows:>12} rows | {:>9.0} blocks/s | ETA {}",
                            result.chunk.start_block,
                            result.chunk.end_block,
                            result.duration.as_secs_f64(),
                            rate,
                            format_duration(eta.as_secs()),
                        )
                    }
                    super::executor::ChunkOutcome::Failure { error } => format!(
                        "{} blocks {:>10} - {:>10}{note}: {error}",
                        console::style("✗ failed").red(),
                        result.chunk.start_block,
                        result.chunk.end_block,
                    ),
                };
                self.println(&line);

                if let Some(bar) = &self.bar {
                    bar.set_message(format!("{rate:.0} blocks/s"));
                }
            }
            BackfillEvent::TableCompleted { report } => {
                if let Some(bar) = self.bar.take() {
                    bar.finish_and_clear();
                }

                let status = match report.status {
                    TableStatus::Completed => console::style("✓ completed").green().to_string(),
                    TableStatus::CompletedWithFailures => {
                        console::style("! completed with failures").yellow().to_string()
                    }
                    TableStatus::Aborted => console::style("✗ aborted").red().to_string(),
                };
                let elapsed = report.total_duration.as_secs_f64();
                let blocks = report.range.map(|r| r.blocks()).unwrap_or(0);

                println!(
                    "{status} {}: {}/{} chunks ok, {} failed, {} in {}",
                    report.table_key,
                    report.succeeded_chunks,
                    report.total_chunks,
                    report.failed_chunks,
                    match report.total_rows {
                        Some(rows) => format!("{rows} rows"),
                        None => "? rows".to_string(),
                    },
                    format_duration(elapsed as u64),
                );
                if blocks > 0 && elapsed > 0.0 {
                    println!("  Average speed: {:.2} blocks/s", blocks as f64 / elapsed);
                }
                if let Some(error) = &report.error {
                    println!("  {}", console::style(error).red());
                }
            }
        }
    }
}

pub fn format_duration(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}
