use serde::Serialize;

use crate::backfill::progress::{BackfillEvent, ProgressSink};
use crate::catalog::TableSpec;
use crate::db::ClickHouse;
use crate::error::BackfillError;
use crate::schema::table_exists;

/// Inclusive range of block numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockRange {
    pub start_block: u64,
    pub end_block: u64,
}

impl BlockRange {
    pub fn new(start_block: u64, end_block: u64) -> Self {
        debug_assert!(start_block <= end_block);
        BlockRange {
            start_block,
            end_block,
        }
    }

    pub fn blocks(&self) -> u64 {
        self.end_block - self.start_block + 1
    }
}

/// Result of range resolution. A start past the end is not an error, it
/// means there is nothing to backfill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedRange {
    Empty,
    Bounded(BlockRange),
}

pub(crate) fn max_block_sql(table: &str) -> String {
    format!("SELECT if(count() = 0, NULL, max(block_number)) FROM {table}")
}

pub(crate) fn min_block_sql(table: &str) -> String {
    format!("SELECT if(count() = 0, NULL, min(block_number)) FROM {table}")
}

/// Determine the inclusive block range that still needs backfilling.
///
/// Explicit bounds always win. Otherwise the end bound is the highest block
/// available in every end-bound source table, and the start bound is one
/// past the target's current max block (falling back to the lowest block any
/// source has when the target is empty or absent). The table's own
/// `min_block`/`max_block` limits are applied last, so a table frozen at an
/// activation boundary resolves to `Empty` once it is caught up.
pub async fn resolve_range(
    source: &dyn ClickHouse,
    target: &dyn ClickHouse,
    spec: &TableSpec,
    start_override: Option<u64>,
    end_override: Option<u64>,
    sink: &mut dyn ProgressSink,
) -> Result<ResolvedRange, BackfillError> {
    let mut end_block = match end_override {
        Some(end) => end,
        None => highest_common_source_block(source, spec, sink).await?,
    };
    let mut start_block = match start_override {
        Some(start) => start,
        None => next_target_block(source, target, spec, sink).await?,
    };

    if let Some(min_block) = spec.min_block {
        start_block = start_block.max(min_block);
    }
    if let Some(max_block) = spec.max_block {
        end_block = end_block.min(max_block);
    }

    if start_block > end_block {
        Ok(ResolvedRange::Empty)
    } else {
        Ok(ResolvedRange::Bounded(BlockRange::new(
            start_block,
            end_block,
        )))
    }
}

/// The backfill cannot produce blocks the sources do not yet have, so the
/// end bound is the minimum over the end-bound source tables of each table's
/// max block. An unreadable source is skipped with a warning; an empty one
/// counts as 0.
async fn highest_common_source_block(
    source: &dyn ClickHouse,
    spec: &TableSpec,
    sink: &mut dyn ProgressSink,
) -> Result<u64, BackfillError> {
    let mut bound: Option<u64> = None;

    for table in spec.end_bound_tables() {
        match source.query_scalar(&max_block_sql(table)).await {
            Ok(value) => {
                let max_block = parse_block(spec, table, value.as_deref())?.unwrap_or(0);
                bound = Some(bound.map_or(max_block, |b| b.min(max_block)));
            }
            Err(err) => {
                sink.on_event(BackfillEvent::ResolutionWarning {
                    table: spec.key,
                    detail: format!("could not read max block from {table}: {err}"),
                });
            }
        }
    }

    bound.ok_or_else(|| BackfillError::RangeResolution {
        table: spec.key.to_string(),
        detail: "no source table could be read to determine an end block".to_string(),
    })
}

async fn next_target_block(
    source: &dyn ClickHouse,
    target: &dyn ClickHouse,
    spec: &TableSpec,
    sink: &mut dyn ProgressSink,
) -> Result<u64, BackfillError> {
    let resolution_error = |detail: String| BackfillError::RangeResolution {
        table: spec.key.to_string(),
        detail,
    };

    let exists = table_exists(target, spec.target_table)
        .await
        .map_err(|err| resolution_error(err.to_string()))?;
    if !exists {
        return Ok(lowest_source_block(source, spec, sink).await);
    }

    let value = target
        .query_scalar(&max_block_sql(spec.target_table))
        .await
        .map_err(|err| resolution_error(err.to_string()))?;

    match parse_block(spec, spec.target_table, value.as_deref())? {
        Some(max_block) => Ok(max_block + 1),
        None => Ok(lowest_source_block(source, spec, sink).await),
    }
}

async fn lowest_source_block(
    source: &dyn ClickHouse,
    spec: &TableSpec,
    sink: &mut dyn ProgressSink,
) -> u64 {
    let mut lowest: Option<u64> = None;

    for table in spec.source_tables {
        match source.query_scalar(&min_block_sql(table)).await {
            Ok(Some(value)) => {
                if let Ok(min_block) = value.parse::<u64>() {
                    lowest = Some(lowest.map_or(min_block, |b| b.min(min_block)));
                }
            }
            Ok(None) => {}
            Err(err) => {
                sink.on_event(BackfillEvent::ResolutionWarning {
                    table: spec.key,
                    detail: format!("could not read min block from {table}: {err}"),
                });
            }
        }
    }

    lowest.unwrap_or(0)
}

fn parse_block(
    spec: &TableSpec,
    table: &str,
    value: Option<&str>,
) -> Result<Option<u64>, BackfillError> {
    match value {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| BackfillError::RangeResolution {
                table: spec.key.to_string(),
                detail: format!("non-numeric block bound '{raw}' from {table}"),
            }),
    }
}
