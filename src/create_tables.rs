use std::time::Duration;

use anyhow::Result;
use clap::Args;
use serde_json::json;

use crate::args::BaseArgs;
use crate::catalog;
use crate::config::DbConfig;
use crate::db::{ping, HttpClient};
use crate::schema::{ensure_database, ensure_table, TARGET_DATABASE};
use crate::ui::{print_command_status, with_spinner, CommandStatus};

const DDL_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Args)]
pub struct CreateTablesArgs {
    /// Comma-separated table keys to create
    #[arg(long, conflicts_with = "all")]
    pub tables: Option<String>,

    /// Create every table in the catalog
    #[arg(long)]
    pub all: bool,
}

pub async fn run(base: BaseArgs, args: CreateTablesArgs) -> Result<()> {
    let selected = catalog::select(args.tables.as_deref(), args.all)?;

    let config = DbConfig::from_env();
    let target = HttpClient::new(&config.target, Some(DDL_TIMEOUT))?;
    with_spinner("Connecting to target ClickHouse", ping(&target, "target")).await?;

    ensure_database(&target, TARGET_DATABASE).await?;

    let mut results = Vec::new();
    for spec in &selected {
        let created = with_spinner(
            &format!("Creating {}", spec.target_table),
            ensure_table(&target, spec),
        )
        .await?;
        if !base.json {
            if created {
                print_command_status(
                    CommandStatus::Success,
                    &format!("created {}", spec.target_table),
                );
            } else {
                print_command_status(
                    CommandStatus::Warning,
                    &format!("{} already exists", spec.target_table),
                );
            }
        }
        results.push(json!({ "table": spec.key, "created": created }));
    }

    if base.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }
    Ok(())
}
