//! `tinygen query show <id>`

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use tinygen_core::{FileLedger, QueryId, QueryLedger};

#[derive(Subcommand, Debug)]
pub enum QueryCommand {
    /// Print a recorded query as YAML.
    Show(ShowArgs),
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Query id, as printed by `tinygen generate`.
    pub id: u64,
}

pub fn run(cmd: QueryCommand) -> Result<()> {
    match cmd {
        QueryCommand::Show(args) => show(args),
    }
}

fn show(args: ShowArgs) -> Result<()> {
    let ledger = FileLedger::open().context("could not locate the query ledger")?;
    let query = ledger
        .get(QueryId(args.id))
        .with_context(|| format!("failed to load query {}", args.id))?;
    let yaml = serde_yaml::to_string(&query).context("failed to render query YAML")?;
    print!("{yaml}");
    Ok(())
}
