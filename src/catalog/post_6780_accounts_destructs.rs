use super::accounts_alive::EIP_6780_BLOCK;
use super::TableSpec;

pub(super) const SPEC: TableSpec = TableSpec {
    key: "post_6780_accounts_destructs",
    target_table: "mainnet.int_post_6780_accounts_destructs",
    source_tables: &[
        "canonical_execution_traces",
        "canonical_execution_contracts",
        "canonical_execution_transaction",
    ],
    description: "Self-destruct operations after EIP-6780, destroying only same-transaction creations",
    sql,
    range_note: None,
    schema: SCHEMA,
    end_bound_sources: None,
    min_block: Some(EIP_6780_BLOCK),
    max_block: None,
};

fn sql(start_block: u64, end_block: u64) -> String {
    format!(
        r#"
INSERT INTO mainnet.int_post_6780_accounts_destructs
WITH
get_tx_success AS (
    SELECT
        lower(transaction_hash) AS transaction_hash,
        transaction_index
    FROM default.canonical_execution_transaction FINAL
    WHERE
        block_number >= {EIP_6780_BLOCK}
        AND block_number BETWEEN {start_block} AND {end_block}
        AND success = true
),
contracts AS (
    SELECT
        lower(contract_address) AS address,
        lower(transaction_hash) AS tx_hash
    FROM default.canonical_execution_contracts FINAL
    WHERE block_number BETWEEN {start_block} AND {end_block}
),
self_destructs AS (
    SELECT
        lower(t.action_from) AS address,
        t.block_number,
        lower(t.transaction_hash) AS tx_hash,
        CASE
            WHEN c.address IS NOT NULL THEN true
            ELSE false
        END AS is_same_tx
    FROM canonical_execution_traces t FINAL
    LEFT JOIN contracts c ON t.action_from = c.address AND t.transaction_hash = c.tx_hash
    WHERE
        t.action_type = 'suicide'
        AND t.block_number >= {EIP_6780_BLOCK}
        AND t.block_number BETWEEN {start_block} AND {end_block}
)
SELECT
    s.address,
    s.block_number,
    s.tx_hash AS transaction_hash,
    max(g.transaction_index) AS transaction_index,
    any(s.is_same_tx) AS is_same_tx
FROM self_destructs s
GLOBAL JOIN get_tx_success g
    ON s.tx_hash = g.transaction_hash
GROUP BY s.address, s.block_number, s.tx_hash
"#
    )
}

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS mainnet.int_post_6780_accounts_destructs_local ON CLUSTER '{cluster}' (
    `address` String COMMENT 'The address of the account' CODEC(ZSTD(1)),
    `block_number` UInt32 COMMENT 'The block number' CODEC(ZSTD(1)),
    `transaction_hash` FixedString(66) COMMENT 'The transaction hash' CODEC(ZSTD(1)),
    `transaction_index` UInt64 COMMENT 'The transaction index' CODEC(DoubleDelta, ZSTD(1)),
    `is_same_tx` Bool COMMENT 'Whether the self-destruct is in the same transaction as the creation' CODEC(ZSTD(1))
) ENGINE = ReplicatedMergeTree(
    '/clickhouse/{installation}/{cluster}/tables/{shard}/{database}/{table}',
    '{replica}'
) PARTITION BY cityHash64(`address`) % 16
ORDER BY (address, block_number, transaction_hash) COMMENT 'Table for accounts self-destructs data post-6780 (Dencun fork)'"#,
    r#"CREATE TABLE IF NOT EXISTS mainnet.int_post_6780_accounts_destructs ON CLUSTER '{cluster}' AS mainnet.int_post_6780_accounts_destructs_local
ENGINE = Distributed('{cluster}', 'mainnet', int_post_6780_accounts_destructs_local, cityHash64(`address`))"#,
];
