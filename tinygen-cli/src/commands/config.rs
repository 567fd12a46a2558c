//! `tinygen config show` and `tinygen config init`

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use tinygen_core::{config::config_path_at, Settings};

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective settings (file plus environment) as YAML.
    Show,

    /// Write the default settings to ~/.tinygen/config.yaml.
    Init(InitArgs),
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,
}

pub fn run(cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            let settings = Settings::load().context("failed to load settings")?;
            let yaml = serde_yaml::to_string(&settings).context("failed to render settings")?;
            print!("{yaml}");
        }
        ConfigCommand::Init(args) => {
            let home = dirs::home_dir().context("could not determine home directory")?;
            let path = config_path_at(&home);
            if path.exists() && !args.force {
                bail!(
                    "{} already exists; pass --force to overwrite",
                    path.display()
                );
            }
            let written = Settings::default()
                .save_at(&home)
                .context("failed to write settings")?;
            println!("{} Wrote {}", "✓".green(), written.display());
        }
    }
    Ok(())
}
