//! `tinygen generate <repo_url> <prompt> [--file PATH]... [--via-daemon]`

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use tinygen_core::{QueryId, RepositoryReference, Settings};
use tinygen_pipeline::Pipeline;

/// Arguments for `tinygen generate`.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Repository URL (or any locator `git clone` accepts).
    pub repo_url: String,

    /// The change request, in natural language.
    pub prompt: String,

    /// Limit the context to these repository-relative files. Repeatable.
    /// Without it every eligible source file is sent.
    #[arg(long = "file", short = 'f', value_name = "PATH")]
    pub files: Vec<String>,

    /// Send the request to a running `tinygen daemon` instead of running in-process.
    #[arg(long)]
    pub via_daemon: bool,
}

impl GenerateArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let paths = (!self.files.is_empty()).then_some(self.files);

        let (artifact, query_id) = if self.via_daemon {
            let generated =
                tinygen_daemon::request_generate(&home, &self.repo_url, &self.prompt, paths)
                    .context("generate via daemon failed")?;
            (generated.diff, generated.query_id)
        } else {
            run_in_process(&home, &self.repo_url, &self.prompt, paths.as_deref())?
        };

        write_artifact(&mut std::io::stdout().lock(), &artifact)
            .context("failed to write the diff to stdout")?;
        if let Some(id) = query_id {
            eprintln!("{} recorded as query {}", "✓".green(), id);
        }
        Ok(())
    }
}

fn run_in_process(
    home: &Path,
    repo_url: &str,
    prompt: &str,
    paths: Option<&[String]>,
) -> Result<(String, Option<QueryId>)> {
    let settings = Settings::load_at(home).context("failed to load settings")?;
    let pipeline = Pipeline::from_settings(home, &settings).map_err(|err| {
        let stage = err.stage();
        anyhow::Error::new(err).context(format!("generate failed at {stage} stage"))
    })?;

    let reference = RepositoryReference::from(repo_url);
    let outcome = pipeline
        .run_recorded(&reference, prompt, paths)
        .map_err(|err| {
            let stage = err.stage();
            anyhow::Error::new(err).context(format!("generate failed at {stage} stage"))
        })?;
    Ok((outcome.artifact, outcome.query_id))
}

/// Stdout carries exactly the recorded artifact, byte for byte.
fn write_artifact(out: &mut impl Write, artifact: &str) -> std::io::Result<()> {
    out.write_all(artifact.as_bytes())?;
    out.flush()
}
