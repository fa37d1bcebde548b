use super::TableSpec;

pub(super) const SPEC: TableSpec = TableSpec {
    key: "block_slots_stat",
    target_table: "mainnet.int_block_slots_stat",
    source_tables: &[
        "canonical_execution_storage_diffs",
        "canonical_execution_transaction",
    ],
    description: "Per-block storage slot set/clear statistics",
    sql,
    range_note: None,
    schema: SCHEMA,
    end_bound_sources: None,
    min_block: None,
    max_block: None,
};

const ZERO_WORD: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";

fn sql(start_block: u64, end_block: u64) -> String {
    format!(
        r#"
INSERT INTO mainnet.int_block_slots_stat
WITH
get_tx_success AS (
    SELECT lower(transaction_hash) AS transaction_hash
    FROM default.canonical_execution_transaction FINAL
    WHERE block_number BETWEEN {start_block} AND {end_block}
    AND success = true
),
storage_changes AS (
    SELECT
        sd.block_number,
        sd.from_value,
        sd.to_value
    FROM default.canonical_execution_storage_diffs sd FINAL
    GLOBAL JOIN get_tx_success g
        ON lower(sd.transaction_hash) = g.transaction_hash
    WHERE sd.block_number BETWEEN {start_block} AND {end_block}
),
block_slot_stats AS (
    SELECT
        block_number,
        countIf(from_value != '{ZERO_WORD}' AND to_value = '{ZERO_WORD}') AS slots_cleared,
        countIf(from_value = '{ZERO_WORD}' AND to_value != '{ZERO_WORD}') AS slots_set
    FROM storage_changes
    GROUP BY block_number
)
SELECT
    block_number,
    slots_cleared,
    slots_set,
    NULL AS net_slots,
    NULL AS net_slots_bytes
FROM block_slot_stats
"#
    )
}

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS mainnet.int_block_slots_stat_local ON CLUSTER '{cluster}' (
    `block_number` UInt32 COMMENT 'The block number' CODEC(DoubleDelta, ZSTD(1)),
    `slots_cleared` UInt32 COMMENT 'Storage slots cleared to zero in this block' CODEC(ZSTD(1)),
    `slots_set` UInt32 COMMENT 'Storage slots set from zero in this block' CODEC(ZSTD(1)),
    `net_slots` Nullable(Int64) COMMENT 'Net slot delta, filled by a later pass' CODEC(ZSTD(1)),
    `net_slots_bytes` Nullable(Int64) COMMENT 'Net slot bytes delta, filled by a later pass' CODEC(ZSTD(1))
) ENGINE = ReplicatedMergeTree(
    '/clickhouse/{installation}/{cluster}/tables/{shard}/{database}/{table}',
    '{replica}'
) PARTITION BY intDiv(`block_number`, 1000000)
ORDER BY (block_number) COMMENT 'Table for per-block storage slot statistics'"#,
    r#"CREATE TABLE IF NOT EXISTS mainnet.int_block_slots_stat ON CLUSTER '{cluster}' AS mainnet.int_block_slots_stat_local
ENGINE = Distributed('{cluster}', 'mainnet', int_block_slots_stat_local, rand())"#,
];
