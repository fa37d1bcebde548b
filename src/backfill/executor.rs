use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::backfill::range::BlockRange;
use crate::catalog::TableSpec;
use crate::db::ClickHouse;
use crate::error::QueryError;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChunkOutcome {
    Success {
        /// `None` when the backend did not report a count; zero is a real,
        /// distinct result.
        rows_written: Option<u64>,
    },
    Failure {
        error: QueryError,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkResult {
    pub chunk: BlockRange,
    #[serde(flatten)]
    pub outcome: ChunkOutcome,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
    pub completed_at: DateTime<Utc>,
}

impl ChunkResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ChunkOutcome::Success { .. })
    }

    pub fn rows_written(&self) -> Option<u64> {
        match self.outcome {
            ChunkOutcome::Success { rows_written } => rows_written,
            ChunkOutcome::Failure { .. } => None,
        }
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Run the transformation query for one chunk against the target database.
/// Every fault is converted into a `Failure` outcome; a bad chunk must not
/// abort its siblings. Retry, if any, is the orchestrator's call.
pub async fn execute_chunk(
    target: &dyn ClickHouse,
    spec: &TableSpec,
    chunk: BlockRange,
) -> ChunkResult {
    let sql = (spec.sql)(chunk.start_block, chunk.end_block);
    let started = Instant::now();
    let outcome = match target.execute(&sql).await {
        Ok(stats) => ChunkOutcome::Success {
            rows_written: stats.rows_written,
        },
        Err(error) => ChunkOutcome::Failure { error },
    };
    ChunkResult {
        chunk,
        outcome,
        duration: started.elapsed(),
        completed_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backfill::testutil::{test_spec, FakeDb};
    use crate::db::QueryStats;

    #[tokio::test]
    async fn success_preserves_unknown_row_counts() {
        let spec = test_spec();
        let db = FakeDb::new();
        db.push_exec(Ok(QueryStats { rows_written: None }));
        db.push_exec(Ok(QueryStats {
            rows_written: Some(0),
        }));

        let unknown = execute_chunk(&db, &spec, BlockRange::new(0, 9)).await;
        assert!(unknown.is_success());
        assert_eq!(unknown.rows_written(), None);

        let zero = execute_chunk(&db, &spec, BlockRange::new(10, 19)).await;
        assert_eq!(zero.rows_written(), Some(0));
    }

    #[tokio::test]
    async fn faults_become_failure_outcomes() {
        let spec = test_spec();
        let db = FakeDb::new();
        db.push_exec(Err(QueryError::failed("Code: 241. MEMORY_LIMIT_EXCEEDED")));

        let result = execute_chunk(&db, &spec, BlockRange::new(0, 9)).await;
        assert!(!result.is_success());
        match &result.outcome {
            ChunkOutcome::Failure { error } => assert!(!error.is_timeout()),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn executor_submits_sql_for_the_requested_range() {
        let spec = test_spec();
        let db = FakeDb::new();
        db.push_exec(Ok(QueryStats::default()));

        execute_chunk(&db, &spec, BlockRange::new(100, 199)).await;
        let executed = db.executed();
        assert_eq!(executed.len(), 1);
        assert!(executed[0].contains("100..199"));
    }
}
