use super::accounts_alive::EIP_6780_BLOCK;
use super::TableSpec;

/// EIP-161 activation block on mainnet (Spurious Dragon). Touching an empty
/// account cleared it from state before this block.
pub const EIP_161_BLOCK: u64 = 2_675_000;

pub(super) const SPEC: TableSpec = TableSpec {
    key: "pre_6780_accounts_destructs",
    target_table: "mainnet.int_pre_6780_accounts_destructs",
    source_tables: &[
        "canonical_execution_traces",
        "canonical_execution_transaction",
    ],
    description: "Self-destruct operations before EIP-6780, always destroying the account",
    sql,
    range_note: Some(range_note),
    schema: SCHEMA,
    end_bound_sources: None,
    min_block: None,
    // SELFDESTRUCT semantics change at the activation block; this table
    // never holds anything past it.
    max_block: Some(EIP_6780_BLOCK - 1),
};

fn range_note(_start_block: u64, end_block: u64) -> Option<&'static str> {
    if end_block < EIP_161_BLOCK {
        Some("pre-EIP-161")
    } else {
        None
    }
}

fn sql(start_block: u64, end_block: u64) -> String {
    format!(
        r#"
INSERT INTO mainnet.int_pre_6780_accounts_destructs
WITH
get_tx_success AS (
    SELECT
        lower(transaction_hash) AS transaction_hash,
        transaction_index
    FROM default.canonical_execution_transaction FINAL
    WHERE
        block_number < {EIP_6780_BLOCK}
        AND block_number BETWEEN {start_block} AND {end_block}
        AND success = true
),
pre_eip161_empty_accounts AS (
    SELECT
        lower(action_to) AS address,
        block_number,
        lower(transaction_hash) AS tx_hash
    FROM canonical_execution_traces FINAL
    WHERE
        action_type = 'suicide'
        AND block_number < {EIP_161_BLOCK}
        AND block_number BETWEEN {start_block} AND {end_block}
        AND action_value = '0'
),
self_destructs AS (
    SELECT
        lower(action_from) AS address,
        block_number,
        lower(transaction_hash) AS tx_hash
    FROM canonical_execution_traces FINAL
    WHERE
        action_type = 'suicide'
        AND block_number < {EIP_6780_BLOCK}
        AND block_number BETWEEN {start_block} AND {end_block}

    UNION ALL

    SELECT address, block_number, tx_hash FROM pre_eip161_empty_accounts
)
SELECT
    s.address,
    s.block_number,
    s.tx_hash AS transaction_hash,
    max(g.transaction_index) AS transaction_index
FROM self_destructs s
GLOBAL JOIN get_tx_success g
    ON s.tx_hash = g.transaction_hash
GROUP BY s.address, s.block_number, s.tx_hash
"#
    )
}

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS mainnet.int_pre_6780_accounts_destructs_local ON CLUSTER '{cluster}' (
    `address` String COMMENT 'The address of the account' CODEC(ZSTD(1)),
    `block_number` UInt32 COMMENT 'The block number of the self-destructs' CODEC(ZSTD(1)),
    `transaction_hash` FixedString(66) COMMENT 'The transaction hash' CODEC(ZSTD(1)),
    `transaction_index` UInt64 COMMENT 'The transaction index' CODEC(DoubleDelta, ZSTD(1))
) ENGINE = ReplicatedMergeTree(
    '/clickhouse/{installation}/{cluster}/tables/{shard}/{database}/{table}',
    '{replica}'
) PARTITION BY cityHash64(`address`) % 16
ORDER BY (address, block_number, transaction_hash) COMMENT 'Table for accounts self-destructs data pre-6780 (Dencun fork)'"#,
    r#"CREATE TABLE IF NOT EXISTS mainnet.int_pre_6780_accounts_destructs ON CLUSTER '{cluster}' AS mainnet.int_pre_6780_accounts_destructs_local
ENGINE = Distributed('{cluster}', 'mainnet', int_pre_6780_accounts_destructs_local, cityHash64(`address`))"#,
];
