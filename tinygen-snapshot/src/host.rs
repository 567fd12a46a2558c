//! Remote repository hosts.
//!
//! [`GitCli`] shells out to the `git` binary so credential helpers, SSH agents
//! and proxies configured for the user apply unchanged.

use std::path::Path;
use std::process::{Command, Output};

use tinygen_core::RepositoryReference;

use crate::error::HostError;

/// Fetch-by-reference and update-in-place of a local copy.
pub trait RepositoryHost: Send + Sync {
    /// Create a full local copy of `reference` at `dest` (which does not exist yet).
    fn fetch(&self, reference: &RepositoryReference, dest: &Path) -> Result<(), HostError>;

    /// Bring the existing copy at `dest` up to the latest upstream state.
    fn update(&self, reference: &RepositoryReference, dest: &Path) -> Result<(), HostError>;
}

/// [`RepositoryHost`] backed by `git clone` / `git pull --ff-only`.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            program: "git".to_string(),
        }
    }

    /// Use a specific `git` executable.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, cmd: &mut Command, action: &str) -> Result<Output, HostError> {
        let output = cmd
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .map_err(|e| HostError(format!("failed to run {} {action}: {e}", self.program)))?;
        if output.status.success() {
            return Ok(output);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(HostError(format!(
            "git {action} exited with {}: {}",
            output.status,
            stderr.trim()
        )))
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryHost for GitCli {
    fn fetch(&self, reference: &RepositoryReference, dest: &Path) -> Result<(), HostError> {
        tracing::info!(repo = %reference, dest = %dest.display(), "cloning repository");
        let mut cmd = Command::new(&self.program);
        cmd.args(["clone", "--quiet", "--"]).arg(&reference.0).arg(dest);
        self.run(&mut cmd, "clone").map(|_| ())
    }

    fn update(&self, reference: &RepositoryReference, dest: &Path) -> Result<(), HostError> {
        tracing::info!(repo = %reference, dest = %dest.display(), "pulling latest changes");
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(dest).args(["pull", "--ff-only", "--quiet"]);
        self.run(&mut cmd, "pull").map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_program_is_reported_not_panicked() {
        let host = GitCli::with_program("tinygen-no-such-git-binary");
        let dest = TempDir::new().unwrap();
        let err = host
            .fetch(&RepositoryReference::from("https://example.com/repo.git"), &dest.path().join("x"))
            .unwrap_err();
        assert!(err.0.contains("failed to run"), "got: {err}");
    }
}
