use super::TableSpec;

pub(super) const SPEC: TableSpec = TableSpec {
    key: "address_diffs",
    target_table: "mainnet.int_address_diffs",
    source_tables: &[
        "canonical_execution_balance_diffs",
        "canonical_execution_storage_diffs",
        "canonical_execution_nonce_diffs",
        "canonical_execution_contracts",
        "canonical_execution_transaction",
    ],
    description: "Aggregates diff data from balance, storage, nonce diffs and contracts",
    sql,
    range_note: None,
    schema: SCHEMA,
    end_bound_sources: None,
    min_block: None,
    max_block: None,
};

fn sql(start_block: u64, end_block: u64) -> String {
    format!(
        r#"
INSERT INTO mainnet.int_address_diffs
WITH
get_tx_success AS (
    SELECT
        lower(transaction_hash) AS transaction_hash,
        transaction_index
    FROM default.canonical_execution_transaction FINAL
    WHERE block_number BETWEEN {start_block} AND {end_block}
    AND success = true
),
all_address_diffs AS (
    SELECT
        lower(address) AS address,
        block_number,
        lower(transaction_hash) AS transaction_hash
    FROM default.canonical_execution_balance_diffs FINAL
    WHERE block_number BETWEEN {start_block} AND {end_block}

    UNION ALL

    SELECT
        lower(address) AS address,
        block_number,
        lower(transaction_hash) AS transaction_hash
    FROM default.canonical_execution_storage_diffs FINAL
    WHERE block_number BETWEEN {start_block} AND {end_block}

    UNION ALL

    SELECT
        lower(address) AS address,
        block_number,
        lower(transaction_hash) AS transaction_hash
    FROM default.canonical_execution_nonce_diffs FINAL
    WHERE block_number BETWEEN {start_block} AND {end_block}

    UNION ALL

    SELECT
        lower(contract_address) AS address,
        block_number,
        lower(transaction_hash) AS transaction_hash
    FROM default.canonical_execution_contracts FINAL
    WHERE block_number BETWEEN {start_block} AND {end_block}
),
address_diffs AS (
    SELECT
        ad.address,
        ad.block_number,
        ad.transaction_hash,
        g.transaction_index
    FROM all_address_diffs ad
    GLOBAL JOIN get_tx_success g
        ON ad.transaction_hash = g.transaction_hash
)
SELECT
    address,
    block_number,
    countDistinct(transaction_hash) AS tx_count,
    max(transaction_index) AS last_tx_index
FROM address_diffs
GROUP BY address, block_number
"#
    )
}

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS mainnet.int_address_diffs_local ON CLUSTER '{cluster}' (
    `address` String COMMENT 'The address of the account' CODEC(ZSTD(1)),
    `block_number` UInt32 COMMENT 'The block number of the diffs' CODEC(ZSTD(1)),
    `tx_count` UInt32 COMMENT 'The number of transactions with diffs for this address in the block' CODEC(ZSTD(1)),
    `last_tx_index` UInt32 COMMENT 'The last transaction index with diffs for this address in the block' CODEC(ZSTD(1))
) ENGINE = ReplicatedMergeTree(
    '/clickhouse/{installation}/{cluster}/tables/{shard}/{database}/{table}',
    '{replica}'
) PARTITION BY cityHash64(`address`) % 16
ORDER BY (address, block_number) COMMENT 'Table for accounts diffs data'"#,
    r#"CREATE TABLE IF NOT EXISTS mainnet.int_address_diffs ON CLUSTER '{cluster}' AS mainnet.int_address_diffs_local
ENGINE = Distributed('{cluster}', 'mainnet', int_address_diffs_local, cityHash64(`address`))"#,
];
