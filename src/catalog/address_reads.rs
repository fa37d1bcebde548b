use super::TableSpec;

pub(super) const SPEC: TableSpec = TableSpec {
    key: "address_reads",
    target_table: "mainnet.int_address_reads",
    source_tables: &[
        "canonical_execution_balance_reads",
        "canonical_execution_nonce_reads",
        "canonical_execution_storage_reads",
        "canonical_execution_transaction",
    ],
    description: "Tracks read operations for addresses",
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
INSERT INTO mainnet.int_address_reads
WITH
get_tx_success AS (
    SELECT
        lower(transaction_hash) AS transaction_hash,
        transaction_index
    FROM default.canonical_execution_transaction FINAL
    WHERE block_number BETWEEN {start_block} AND {end_block}
    AND success = true
),
all_address_reads AS (
    SELECT
        lower(address) AS address,
        block_number,
        lower(transaction_hash) AS transaction_hash
    FROM default.canonical_execution_balance_reads FINAL
    WHERE block_number BETWEEN {start_block} AND {end_block}

    UNION ALL

    SELECT
        lower(address) AS address,
        block_number,
        lower(transaction_hash) AS transaction_hash
    FROM default.canonical_execution_nonce_reads FINAL
    WHERE block_number BETWEEN {start_block} AND {end_block}

    UNION ALL

    SELECT
        lower(contract_address) AS address,
        block_number,
        lower(transaction_hash) AS transaction_hash
    FROM default.canonical_execution_storage_reads FINAL
    WHERE block_number BETWEEN {start_block} AND {end_block}
),
address_reads AS (
    SELECT
        ar.address,
        ar.block_number,
        ar.transaction_hash,
        g.transaction_index
    FROM all_address_reads ar
    GLOBAL JOIN get_tx_success g
        ON ar.transaction_hash = g.transaction_hash
)
SELECT
    address,
    block_number,
    countDistinct(transaction_hash) AS tx_count,
    max(transaction_index) AS last_tx_index
FROM address_reads
GROUP BY address, block_number
"#
    )
}

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS mainnet.int_address_reads_local ON CLUSTER '{cluster}' (
    `address` String COMMENT 'The address of the account' CODEC(ZSTD(1)),
    `block_number` UInt32 COMMENT 'The block number of the reads' CODEC(ZSTD(1)),
    `tx_count` UInt32 COMMENT 'The number of reads for this address in this block' CODEC(ZSTD(1)),
    `last_tx_index` UInt32 COMMENT 'The last transaction index with reads for this address in the block' CODEC(ZSTD(1))
) ENGINE = ReplicatedMergeTree(
    '/clickhouse/{installation}/{cluster}/tables/{shard}/{database}/{table}',
    '{replica}'
) PARTITION BY cityHash64(`address`) % 16
ORDER BY (address, block_number) COMMENT 'Table for accounts reads data'"#,
    r#"CREATE TABLE IF NOT EXISTS mainnet.int_address_reads ON CLUSTER '{cluster}' AS mainnet.int_address_reads_local
ENGINE = Distributed('{cluster}', 'mainnet', int_address_reads_local, cityHash64(`address`))"#,
];
