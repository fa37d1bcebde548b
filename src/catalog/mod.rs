mod accounts_alive;
mod address_diffs;
mod address_first_access;
mod address_reads;
mod block_slots_stat;
mod post_6780_accounts_destructs;
mod pre_6780_accounts_destructs;

use crate::error::BackfillError;

/// Static descriptor for one backfillable table. The orchestration path is
/// generic over these; nothing outside the catalog knows what the generated
/// SQL contains.
pub struct TableSpec {
    pub key: &'static str,
    /// Qualified target table name.
    pub target_table: &'static str,
    /// Source tables the transformation reads from, in display order.
    pub source_tables: &'static [&'static str],
    pub description: &'static str,
    /// Produces the INSERT..SELECT statement for an inclusive block range.
    pub sql: fn(start_block: u64, end_block: u64) -> String,
    /// Optional annotation for a chunk's log line (e.g. EIP activation
    /// markers).
    pub range_note: Option<fn(start_block: u64, end_block: u64) -> Option<&'static str>>,
    /// CREATE statements for the target table, run in order.
    pub schema: &'static [&'static str],
    /// Source tables used to discover the end bound, when they differ from
    /// `source_tables`. A table frozen at a fixed block (e.g. pre-EIP-6780
    /// destructs) must not take part in end-bound discovery or it caps the
    /// resolved range forever.
    pub end_bound_sources: Option<&'static [&'static str]>,
    /// Lowest block this table can contain; the resolved start never goes
    /// below it.
    pub min_block: Option<u64>,
    /// Highest block this table can contain; the resolved end never goes
    /// above it.
    pub max_block: Option<u64>,
}

impl TableSpec {
    pub fn note_for(&self, start_block: u64, end_block: u64) -> Option<&'static str> {
        self.range_note.and_then(|f| f(start_block, end_block))
    }

    pub fn end_bound_tables(&self) -> &'static [&'static str] {
        self.end_bound_sources.unwrap_or(self.source_tables)
    }
}

static TABLES: &[TableSpec] = &[
    address_diffs::SPEC,
    address_reads::SPEC,
    address_first_access::SPEC,
    block_slots_stat::SPEC,
    pre_6780_accounts_destructs::SPEC,
    post_6780_accounts_destructs::SPEC,
    accounts_alive::SPEC,
];

pub fn all() -> &'static [TableSpec] {
    TABLES
}

pub fn get(key: &str) -> Option<&'static TableSpec> {
    TABLES.iter().find(|spec| spec.key == key)
}

/// Resolve a `--tables a,b,c` / `--all` selection against the registry.
/// Unknown keys and empty selections are configuration errors, reported
/// before any chunk work starts.
pub fn select(tables: Option<&str>, all_tables: bool) -> Result<Vec<&'static TableSpec>, BackfillError> {
    if all_tables {
        return Ok(TABLES.iter().collect());
    }
    let Some(csv) = tables else {
        return Err(BackfillError::Configuration(
            "specify --tables <keys> or --all".to_string(),
        ));
    };
    let mut selected = Vec::new();
    for key in csv.split(',').map(str::trim).filter(|k| !k.is_empty()) {
        let spec = get(key).ok_or_else(|| BackfillError::UnknownTable(key.to_string()))?;
        selected.push(spec);
    }
    if selected.is_empty() {
        return Err(BackfillError::Configuration(
            "no table keys given".to_string(),
        ));
    }
    Ok(selected)
}
