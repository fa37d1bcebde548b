use std::ffi::OsString;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod args;
mod backfill;
mod catalog;
mod config;
mod create_tables;
mod db;
mod env;
mod error;
mod info;
mod list;
mod run;
mod schema;
mod ui;

use crate::args::CLIArgs;

#[derive(Debug, Parser)]
#[command(
    name = "statefill",
    about = "Chunked backfill CLI for ClickHouse state analytics tables",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the backfillable tables
    List(CLIArgs<list::ListArgs>),
    /// Show details for one table, or all of them
    Info(CLIArgs<info::InfoArgs>),
    /// Create target tables that do not exist yet
    CreateTables(CLIArgs<create_tables::CreateTablesArgs>),
    /// Backfill tables chunk by chunk
    Run(CLIArgs<run::RunArgs>),
}

#[tokio::main]
async fn main() -> Result<()> {
    let argv: Vec<OsString> = std::env::args_os().collect();
    env::bootstrap_from_args(&argv)?;
    let cli = Cli::parse_from(argv);

    match cli.command {
        Commands::List(cmd) => list::run(cmd.base, cmd.args).await?,
        Commands::Info(cmd) => info::run(cmd.base, cmd.args).await?,
        Commands::CreateTables(cmd) => create_tables::run(cmd.base, cmd.args).await?,
        Commands::Run(cmd) => {
            let clean = run::run(cmd.base, cmd.args).await?;
            if !clean {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
