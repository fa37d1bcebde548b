use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use serde::Serialize;

use crate::backfill::chunks::{chunk_count, plan};
use crate::backfill::executor::{execute_chunk, ChunkResult};
use crate::backfill::progress::{BackfillEvent, ProgressSink};
use crate::backfill::range::{resolve_range, BlockRange, ResolvedRange};
use crate::catalog::TableSpec;
use crate::db::ClickHouse;
use crate::error::BackfillError;
use crate::schema::{ensure_database, ensure_table, TARGET_DATABASE};

pub const DEFAULT_STEP_SIZE: u64 = 10_000;

const RETRY_BASE_DELAY_MS: u64 = 300;
const RETRY_MAX_BACKOFF_SECS: u64 = 8;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub start_override: Option<u64>,
    pub end_override: Option<u64>,
    pub step_size: u64,
    pub create_tables: bool,
    /// Extra attempts per failed chunk. 0 means a chunk gets exactly one try.
    pub max_retries: u32,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            start_override: None,
            end_override: None,
            step_size: DEFAULT_STEP_SIZE,
            create_tables: false,
            max_retries: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    /// Every planned chunk ran and succeeded (including the zero-chunk
    /// empty-range case).
    Completed,
    /// Every planned chunk ran, at least one failed.
    CompletedWithFailures,
    /// The table stopped before all chunks ran (setup failure or interrupt).
    Aborted,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub table_key: String,
    pub status: TableStatus,
    pub range: Option<BlockRange>,
    pub total_chunks: u64,
    pub succeeded_chunks: u64,
    pub failed_chunks: u64,
    /// Sum of reported row counts; `None` when any succeeded chunk had an
    /// unknown count.
    pub total_rows: Option<u64>,
    #[serde(serialize_with = "serialize_secs")]
    pub total_duration: Duration,
    pub chunks: Vec<ChunkResult>,
    pub error: Option<String>,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl TableReport {
    fn aborted(spec: &TableSpec, error: String, total_duration: Duration) -> Self {
        TableReport {
            table_key: spec.key.to_string(),
            status: TableStatus::Aborted,
            range: None,
            total_chunks: 0,
            succeeded_chunks: 0,
            failed_chunks: 0,
            total_rows: Some(0),
            total_duration,
            chunks: Vec::new(),
            error: Some(error),
        }
    }

    fn empty(spec: &TableSpec, total_duration: Duration) -> Self {
        TableReport {
            table_key: spec.key.to_string(),
            status: TableStatus::Completed,
            range: None,
            total_chunks: 0,
            succeeded_chunks: 0,
            failed_chunks: 0,
            total_rows: Some(0),
            total_duration,
            chunks: Vec::new(),
            error: None,
        }
    }

    fn from_chunks(
        spec: &TableSpec,
        range: BlockRange,
        total_chunks: u64,
        chunks: Vec<ChunkResult>,
        total_duration: Duration,
        interrupted: bool,
    ) -> Self {
        let succeeded_chunks = chunks.iter().filter(|c| c.is_success()).count() as u64;
        let failed_chunks = chunks.len() as u64 - succeeded_chunks;
        let total_rows = sum_rows(&chunks);
        let status = if interrupted {
            TableStatus::Aborted
        } else if failed_chunks > 0 {
            TableStatus::CompletedWithFailures
        } else {
            TableStatus::Completed
        };
        TableReport {
            table_key: spec.key.to_string(),
            status,
            range: Some(range),
            total_chunks,
            succeeded_chunks,
            failed_chunks,
            total_rows,
            total_duration,
            chunks,
            error: interrupted.then(|| "interrupted before completion".to_string()),
        }
    }
}

fn sum_rows(chunks: &[ChunkResult]) -> Option<u64> {
    let mut total = 0u64;
    for chunk in chunks.iter().filter(|c| c.is_success()) {
        total += chunk.rows_written()?;
    }
    Some(total)
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub reports: Vec<TableReport>,
    pub interrupted: bool,
}

impl RunSummary {
    /// True only when every table completed with zero failed chunks and the
    /// run was not interrupted. Drives the process exit status.
    pub fn is_clean(&self) -> bool {
        !self.interrupted
            && self
                .reports
                .iter()
                .all(|report| report.status == TableStatus::Completed)
    }
}

/// Drives backfills table by table: resolve the range, plan chunks, execute
/// them strictly sequentially in ascending order, and keep going past
/// failed chunks. One table's abort never stops the rest of the batch.
pub struct Orchestrator<'a> {
    source: &'a dyn ClickHouse,
    target: &'a dyn ClickHouse,
    options: RunOptions,
    shutdown: Arc<AtomicBool>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(source: &'a dyn ClickHouse, target: &'a dyn ClickHouse, options: RunOptions) -> Self {
        Orchestrator {
            source,
            target,
            options,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A set flag stops the run before the *next* chunk; an in-flight
    /// statement is never cancelled.
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub async fn run(
        &self,
        tables: &[&TableSpec],
        sink: &mut dyn ProgressSink,
    ) -> Result<RunSummary, BackfillError> {
        // Bad configuration is fatal to the whole request before any chunk
        // work starts.
        if self.options.step_size == 0 {
            return Err(BackfillError::Configuration(
                "step size must be a positive number of blocks".to_string(),
            ));
        }

        // On a fresh target instance the database has to exist before any
        // table DDL can run.
        if self.options.create_tables {
            ensure_database(self.target, TARGET_DATABASE).await?;
        }

        let mut reports = Vec::new();
        for spec in tables {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            reports.push(self.run_table(spec, sink).await);
        }
        Ok(RunSummary {
            reports,
            interrupted: self.shutdown.load(Ordering::Relaxed),
        })
    }

    async fn run_table(&self, spec: &TableSpec, sink: &mut dyn ProgressSink) -> TableReport {
        let started = Instant::now();

        if self.options.create_tables {
            if let Err(err) = ensure_table(self.target, spec).await {
                return TableReport::aborted(spec, err.to_string(), started.elapsed());
            }
        }

        let resolved = match resolve_range(
            self.source,
            self.target,
            spec,
            self.options.start_override,
            self.options.end_override,
            sink,
        )
        .await
        {
            Ok(resolved) => resolved,
            Err(err) => return TableReport::aborted(spec, err.to_string(), started.elapsed()),
        };

        let range = match resolved {
            ResolvedRange::Empty => {
                let report = TableReport::empty(spec, started.elapsed());
                sink.on_event(BackfillEvent::TableCompleted { report: &report });
                return report;
            }
            ResolvedRange::Bounded(range) => range,
        };

        let chunks = match plan(range, self.options.step_size) {
            Ok(chunks) => chunks,
            Err(err) => return TableReport::aborted(spec, err.to_string(), started.elapsed()),
        };
        let total_chunks = chunk_count(range, self.options.step_size);

        sink.on_event(BackfillEvent::TableStarted {
            spec,
            range,
            total_chunks,
            step_size: self.options.step_size,
        });

        let mut results = Vec::new();
        let mut interrupted = false;
        for chunk in chunks {
            if self.shutdown.load(Ordering::Relaxed) {
                interrupted = true;
                break;
            }
            sink.on_event(BackfillEvent::ChunkStarted { chunk });
            let result = self.execute_with_retry(spec, chunk).await;
            sink.on_event(BackfillEvent::ChunkCompleted {
                result: &result,
                note: spec.note_for(chunk.start_block, chunk.end_block),
            });
            results.push(result);
        }

        let report = TableReport::from_chunks(
            spec,
            range,
            total_chunks,
            results,
            started.elapsed(),
            interrupted,
        );
        sink.on_event(BackfillEvent::TableCompleted { report: &report });
        report
    }

    async fn execute_with_retry(&self, spec: &TableSpec, chunk: BlockRange) -> ChunkResult {
        let mut result = execute_chunk(self.target, spec, chunk).await;
        if self.options.max_retries == 0 {
            return result;
        }

        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(RETRY_BASE_DELAY_MS))
            .with_max_interval(Duration::from_secs(RETRY_MAX_BACKOFF_SECS))
            .with_max_elapsed_time(None)
            .build();

        for _ in 0..self.options.max_retries {
            if result.is_success() || self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            let delay = backoff
                .next_backoff()
                .unwrap_or(Duration::from_secs(RETRY_MAX_BACKOFF_SECS));
            tokio::time::sleep(delay).await;
            result = execute_chunk(self.target, spec, chunk).await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backfill::progress::NullSink;
    use crate::backfill::range::max_block_sql;
    use crate::backfill::testutil::{test_spec, FakeDb};
    use crate::db::QueryStats;
    use crate::error::QueryError;
    use crate::schema::table_exists_sql;

    fn ok_rows(rows: u64) -> Result<QueryStats, QueryError> {
        Ok(QueryStats {
            rows_written: Some(rows),
        })
    }

    fn fail() -> Result<QueryStats, QueryError> {
        Err(QueryError::failed("Code: 241. MEMORY_LIMIT_EXCEEDED"))
    }

    /// Source with both source tables maxing at `max`, empty target table.
    fn fresh_databases(max: u64) -> (FakeDb, FakeDb) {
        let spec = test_spec();
        let source = FakeDb::new();
        source.scalar(&max_block_sql("src_a"), Some(&max.to_string()));
        source.scalar(&max_block_sql("src_b"), Some(&max.to_string()));
        let target = FakeDb::new();
        target.scalar(&table_exists_sql(spec.target_table), None);
        (source, target)
    }

    #[tokio::test]
    async fn continues_past_a_failed_chunk() {
        let spec = test_spec();
        let (source, target) = fresh_databases(49);
        for result in [ok_rows(10), ok_rows(10), fail(), ok_rows(10), ok_rows(10)] {
            target.push_exec(result);
        }

        let options = RunOptions {
            step_size: 10,
            ..RunOptions::default()
        };
        let orchestrator = Orchestrator::new(&source, &target, options);
        let summary = orchestrator
            .run(&[&spec], &mut NullSink)
            .await
            .unwrap();

        let report = &summary.reports[0];
        assert_eq!(report.status, TableStatus::CompletedWithFailures);
        assert_eq!(report.total_chunks, 5);
        assert_eq!(report.succeeded_chunks, 4);
        assert_eq!(report.failed_chunks, 1);
        // Chunks after the failure were still attempted.
        assert_eq!(target.executed().len(), 5);
        assert!(!summary.is_clean());
    }

    #[tokio::test]
    async fn chunk_sequence_is_ascending_and_clipped() {
        let spec = test_spec();
        let (source, target) = fresh_databases(12);

        let options = RunOptions {
            step_size: 5,
            ..RunOptions::default()
        };
        let orchestrator = Orchestrator::new(&source, &target, options);
        orchestrator.run(&[&spec], &mut NullSink).await.unwrap();

        let executed = target.executed();
        assert_eq!(
            executed,
            vec![
                "INSERT INTO mainnet.int_test SELECT 0..4",
                "INSERT INTO mainnet.int_test SELECT 5..9",
                "INSERT INTO mainnet.int_test SELECT 10..12",
            ]
        );
    }

    #[tokio::test]
    async fn empty_range_counts_as_success_with_zero_chunks() {
        let spec = test_spec();
        let source = FakeDb::new();
        let target = FakeDb::new();

        let options = RunOptions {
            start_override: Some(500),
            end_override: Some(100),
            ..RunOptions::default()
        };
        let orchestrator = Orchestrator::new(&source, &target, options);
        let summary = orchestrator.run(&[&spec], &mut NullSink).await.unwrap();

        let report = &summary.reports[0];
        assert_eq!(report.status, TableStatus::Completed);
        assert_eq!(report.total_chunks, 0);
        assert!(target.executed().is_empty());
        assert!(summary.is_clean());
    }

    #[tokio::test]
    async fn one_tables_abort_does_not_stop_the_batch() {
        let broken = test_spec();
        let healthy = test_spec();
        // Nothing registered on source/target for resolution of the first
        // run; the orchestrator sees a RangeResolution abort, then the
        // overrides let the second run through.
        let source = FakeDb::new();
        let target = FakeDb::new();

        let orchestrator = Orchestrator::new(
            &source,
            &target,
            RunOptions {
                step_size: 10,
                ..RunOptions::default()
            },
        );
        let aborted = orchestrator.run_table(&broken, &mut NullSink).await;
        assert_eq!(aborted.status, TableStatus::Aborted);
        assert!(aborted.error.is_some());

        let options = RunOptions {
            start_override: Some(0),
            end_override: Some(9),
            step_size: 10,
            ..RunOptions::default()
        };
        let orchestrator = Orchestrator::new(&source, &target, options);
        let summary = orchestrator.run(&[&healthy], &mut NullSink).await.unwrap();
        assert_eq!(summary.reports[0].status, TableStatus::Completed);
    }

    #[tokio::test]
    async fn create_tables_provisions_the_database_before_any_ddl() {
        let spec = test_spec();
        let (source, target) = fresh_databases(9);

        let options = RunOptions {
            step_size: 10,
            create_tables: true,
            ..RunOptions::default()
        };
        let orchestrator = Orchestrator::new(&source, &target, options);
        let summary = orchestrator.run(&[&spec], &mut NullSink).await.unwrap();
        assert_eq!(summary.reports[0].status, TableStatus::Completed);

        let executed = target.executed();
        assert_eq!(executed[0], "CREATE DATABASE IF NOT EXISTS mainnet");
        assert!(executed[1].starts_with("CREATE TABLE IF NOT EXISTS mainnet.int_test"));
    }

    #[tokio::test]
    async fn zero_step_size_fails_before_any_table_starts() {
        let spec = test_spec();
        let source = FakeDb::new();
        let target = FakeDb::new();

        let options = RunOptions {
            step_size: 0,
            ..RunOptions::default()
        };
        let orchestrator = Orchestrator::new(&source, &target, options);
        let err = orchestrator.run(&[&spec], &mut NullSink).await.unwrap_err();
        assert!(matches!(err, BackfillError::Configuration(_)));
        assert!(target.executed().is_empty());
    }

    #[tokio::test]
    async fn failed_chunk_is_retried_when_requested() {
        let spec = test_spec();
        let (source, target) = fresh_databases(9);
        target.push_exec(fail());
        target.push_exec(ok_rows(5));

        let options = RunOptions {
            step_size: 10,
            max_retries: 2,
            ..RunOptions::default()
        };
        let orchestrator = Orchestrator::new(&source, &target, options);
        let summary = orchestrator.run(&[&spec], &mut NullSink).await.unwrap();

        let report = &summary.reports[0];
        assert_eq!(report.succeeded_chunks, 1);
        assert_eq!(report.failed_chunks, 0);
        assert_eq!(target.executed().len(), 2);
        assert_eq!(report.total_rows, Some(5));
    }

    #[tokio::test]
    async fn unknown_row_counts_poison_the_total() {
        let spec = test_spec();
        let (source, target) = fresh_databases(19);
        target.push_exec(ok_rows(10));
        target.push_exec(Ok(QueryStats { rows_written: None }));

        let options = RunOptions {
            step_size: 10,
            ..RunOptions::default()
        };
        let orchestrator = Orchestrator::new(&source, &target, options);
        let summary = orchestrator.run(&[&spec], &mut NullSink).await.unwrap();
        assert_eq!(summary.reports[0].total_rows, None);
    }

    #[tokio::test]
    async fn shutdown_flag_stops_before_the_next_chunk() {
        struct TrippingSink {
            shutdown: Arc<AtomicBool>,
        }
        impl ProgressSink for TrippingSink {
            fn on_event(&mut self, event: BackfillEvent<'_>) {
                if let BackfillEvent::ChunkCompleted { .. } = event {
                    self.shutdown.store(true, Ordering::Relaxed);
                }
            }
        }

        let spec = test_spec();
        let (source, target) = fresh_databases(49);
        let shutdown = Arc::new(AtomicBool::new(false));

        let options = RunOptions {
            step_size: 10,
            ..RunOptions::default()
        };
        let orchestrator =
            Orchestrator::new(&source, &target, options).with_shutdown(shutdown.clone());
        let mut sink = TrippingSink { shutdown };
        let summary = orchestrator.run(&[&spec], &mut sink).await.unwrap();

        let report = &summary.reports[0];
        assert_eq!(report.status, TableStatus::Aborted);
        assert_eq!(target.executed().len(), 1);
        assert_eq!(report.total_chunks, 5);
        assert!(summary.interrupted);
    }
}
