use super::TableSpec;

pub(super) const SPEC: TableSpec = TableSpec {
    key: "address_first_access",
    target_table: "mainnet.int_address_first_access",
    source_tables: &[
        "canonical_execution_balance_diffs",
        "canonical_execution_balance_reads",
        "canonical_execution_contracts",
        "canonical_execution_nonce_reads",
        "canonical_execution_nonce_diffs",
        "canonical_execution_storage_diffs",
        "canonical_execution_storage_reads",
    ],
    description: "Tracks the first access block for each address",
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
INSERT INTO mainnet.int_address_first_access
WITH
get_tx_success AS (
    SELECT lower(transaction_hash) AS transaction_hash
    FROM default.canonical_execution_transaction FINAL
    WHERE block_number BETWEEN {start_block} AND {end_block}
    AND success = true
),
all_addresses AS (
    SELECT lower(address) AS address, lower(transaction_hash) AS transaction_hash, block_number
    FROM default.canonical_execution_nonce_reads FINAL
    WHERE block_number BETWEEN {start_block} AND {end_block}

    UNION ALL

    SELECT lower(address) AS address, lower(transaction_hash) AS transaction_hash, block_number
    FROM default.canonical_execution_nonce_diffs FINAL
    WHERE block_number BETWEEN {start_block} AND {end_block}

    UNION ALL

    SELECT lower(address) AS address, lower(transaction_hash) AS transaction_hash, block_number
    FROM default.canonical_execution_balance_diffs FINAL
    WHERE block_number BETWEEN {start_block} AND {end_block}

    UNION ALL

    SELECT lower(address) AS address, lower(transaction_hash) AS transaction_hash, block_number
    FROM default.canonical_execution_balance_reads FINAL
    WHERE block_number BETWEEN {start_block} AND {end_block}

    UNION ALL

    SELECT lower(address) AS address, lower(transaction_hash) AS transaction_hash, block_number
    FROM default.canonical_execution_storage_diffs FINAL
    WHERE block_number BETWEEN {start_block} AND {end_block}

    UNION ALL

    SELECT lower(contract_address) AS address, lower(transaction_hash) AS transaction_hash, block_number
    FROM default.canonical_execution_storage_reads FINAL
    WHERE block_number BETWEEN {start_block} AND {end_block}

    UNION ALL

    SELECT lower(contract_address) AS address, lower(transaction_hash) AS transaction_hash, block_number
    FROM default.canonical_execution_contracts FINAL
    WHERE block_number BETWEEN {start_block} AND {end_block}
)
SELECT
    a.address,
    min(a.block_number) AS block_number
FROM all_addresses a
GLOBAL JOIN get_tx_success g
    ON a.transaction_hash = g.transaction_hash
GROUP BY a.address
"#
    )
}

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS mainnet.int_address_first_access_local ON CLUSTER '{cluster}' (
    `address` String COMMENT 'The address of the account' CODEC(ZSTD(1)),
    `block_number` UInt32 COMMENT 'The block number of the first access' CODEC(ZSTD(1)),
    `version` UInt32 DEFAULT 4294967295 - block_number COMMENT 'Version for this address' CODEC(DoubleDelta, ZSTD(1))
) ENGINE = ReplicatedReplacingMergeTree(
    '/clickhouse/{installation}/{cluster}/tables/{shard}/{database}/{table}',
    '{replica}',
    `version`
) PARTITION BY cityHash64(`address`) % 16
ORDER BY (address) COMMENT 'Table for accounts first access data'"#,
    r#"CREATE TABLE IF NOT EXISTS mainnet.int_address_first_access ON CLUSTER '{cluster}' AS mainnet.int_address_first_access_local
ENGINE = Distributed('{cluster}', 'mainnet', int_address_first_access_local, cityHash64(`address`))"#,
];
