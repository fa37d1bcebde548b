use anyhow::Result;
use clap::Args;
use serde_json::json;

use crate::args::BaseArgs;
use crate::catalog;
use crate::ui::{header, styled_table};

#[derive(Debug, Clone, Args)]
pub struct ListArgs {}

pub async fn run(base: BaseArgs, _args: ListArgs) -> Result<()> {
    let tables = catalog::all();

    if base.json {
        let entries: Vec<_> = tables
            .iter()
            .map(|spec| {
                json!({
                    "key": spec.key,
                    "target_table": spec.target_table,
                    "description": spec.description,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let mut table = styled_table();
    table.set_header(vec![header("KEY"), header("TARGET TABLE"), header("DESCRIPTION")]);
    for spec in tables {
        table.add_row(vec![spec.key, spec.target_table, spec.description]);
    }
    println!("{table}");
    Ok(())
}
