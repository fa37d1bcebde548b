use super::TableSpec;

/// EIP-6780 activation block on mainnet. SELFDESTRUCT only removes the
/// account when it happens in the creating transaction from this block on.
pub const EIP_6780_BLOCK: u64 = 19_426_587;

pub(super) const SPEC: TableSpec = TableSpec {
    key: "accounts_alive",
    target_table: "mainnet.int_accounts_alive",
    source_tables: &[
        "mainnet.int_address_diffs",
        "mainnet.int_post_6780_accounts_destructs",
        "mainnet.int_pre_6780_accounts_destructs",
    ],
    description: "Latest alive/destroyed status per account via argMax over diffs and destructs",
    sql,
    range_note: Some(range_note),
    schema: SCHEMA,
    // Pre-6780 destructs are frozen at the activation block; only tables
    // that span the full chain may decide the end bound.
    end_bound_sources: Some(&[
        "mainnet.int_address_diffs",
        "mainnet.int_post_6780_accounts_destructs",
    ]),
    min_block: None,
    max_block: None,
};

fn range_note(start_block: u64, end_block: u64) -> Option<&'static str> {
    if end_block < EIP_6780_BLOCK {
        Some("pre-EIP-6780")
    } else if start_block >= EIP_6780_BLOCK {
        Some("post-EIP-6780")
    } else {
        Some("spans EIP-6780")
    }
}

fn sql(start_block: u64, end_block: u64) -> String {
    format!(
        r#"
INSERT INTO mainnet.int_accounts_alive
WITH
pre_6780_destructs AS (
    SELECT
        address,
        block_number AS block_num,
        transaction_index,
        false AS is_alive
    FROM mainnet.int_pre_6780_accounts_destructs
    WHERE block_number BETWEEN {start_block} AND {end_block}
),
post_6780_destructs AS (
    SELECT
        address,
        block_number AS block_num,
        transaction_index,
        CASE
            WHEN is_same_tx = true THEN false
            ELSE true
        END AS is_alive
    FROM mainnet.int_post_6780_accounts_destructs
    WHERE block_number BETWEEN {start_block} AND {end_block}
),
diffs AS (
    SELECT
        address,
        block_number AS block_num,
        last_tx_index AS transaction_index,
        true AS is_alive
    FROM mainnet.int_address_diffs
    WHERE block_number BETWEEN {start_block} AND {end_block}
),
combined AS (
    SELECT * FROM pre_6780_destructs
    UNION ALL
    SELECT * FROM post_6780_destructs
    UNION ALL
    SELECT * FROM diffs
)
SELECT
    address,
    max(block_num) AS block_number,
    argMax(is_alive, (block_num, transaction_index, NOT is_alive)) AS is_alive
FROM combined
GROUP BY address
"#
    )
}

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS mainnet.int_accounts_alive_local ON CLUSTER '{cluster}' (
    `address` String COMMENT 'The address of the account' CODEC(ZSTD(1)),
    `block_number` UInt32 COMMENT 'The block number of the latest status change' CODEC(ZSTD(1)),
    `is_alive` Bool COMMENT 'Whether the account is alive at block_number' CODEC(ZSTD(1))
) ENGINE = ReplicatedReplacingMergeTree(
    '/clickhouse/{installation}/{cluster}/tables/{shard}/{database}/{table}',
    '{replica}',
    `block_number`
) PARTITION BY cityHash64(`address`) % 16
ORDER BY (address) COMMENT 'Table for account alive status'"#,
    r#"CREATE TABLE IF NOT EXISTS mainnet.int_accounts_alive ON CLUSTER '{cluster}' AS mainnet.int_accounts_alive_local
ENGINE = Distributed('{cluster}', 'mainnet', int_accounts_alive_local, cityHash64(`address`))"#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_note_marks_activation_boundary() {
        assert_eq!(range_note(0, EIP_6780_BLOCK - 1), Some("pre-EIP-6780"));
        assert_eq!(
            range_note(EIP_6780_BLOCK, EIP_6780_BLOCK + 10_000),
            Some("post-EIP-6780")
        );
        assert_eq!(
            range_note(EIP_6780_BLOCK - 1, EIP_6780_BLOCK),
            Some("spans EIP-6780")
        );
    }
}
