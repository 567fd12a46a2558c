//! tinygen: turn a natural-language change request into a unified diff.
//!
//! # Usage
//!
//! ```text
//! tinygen generate <repo_url> <prompt> [--file PATH]... [--via-daemon]
//! tinygen query show <id>
//! tinygen config show|init [--force]
//! tinygen daemon start|stop|status
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    config::ConfigCommand, daemon::DaemonCommand, generate::GenerateArgs, query::QueryCommand,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "tinygen",
    version,
    about = "Generate a unified diff for a repository from a natural-language request",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Propose, review and print a change for a repository.
    Generate(GenerateArgs),

    /// Inspect recorded queries.
    Query {
        #[command(subcommand)]
        command: QueryCommand,
    },

    /// Show or initialise ~/.tinygen/config.yaml.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Manage the request-serving daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    tinygen_daemon::init_tracing();
    match cli.command {
        Commands::Generate(args) => args.run(),
        Commands::Query { command } => commands::query::run(command),
        Commands::Config { command } => commands::config::run(command),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
