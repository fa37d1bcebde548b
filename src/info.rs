use anyhow::{bail, Result};
use clap::Args;
use serde_json::json;

use crate::args::BaseArgs;
use crate::catalog::{self, TableSpec};

#[derive(Debug, Clone, Args)]
pub struct InfoArgs {
    /// Table key to describe; all tables when omitted.
    pub table: Option<String>,
}

pub async fn run(base: BaseArgs, args: InfoArgs) -> Result<()> {
    let tables: Vec<&TableSpec> = match &args.table {
        Some(key) => match catalog::get(key) {
            Some(spec) => vec![spec],
            None => bail!("unknown table '{key}'; see `statefill list`"),
        },
        None => catalog::all().iter().collect(),
    };

    if base.json {
        let entries: Vec<_> = tables
            .iter()
            .map(|spec| {
                json!({
                    "key": spec.key,
                    "target_table": spec.target_table,
                    "source_tables": spec.source_tables,
                    "description": spec.description,
                    "schema_statements": spec.schema.len(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for (idx, spec) in tables.iter().enumerate() {
        if idx > 0 {
            println!();
        }
        println!("{}", spec.key);
        println!("  Description:   {}", spec.description);
        println!("  Target table:  {}", spec.target_table);
        println!("  Source tables: {}", spec.source_tables.join(", "));
        println!("  DDL:           {} statement(s)", spec.schema.len());
    }
    Ok(())
}
