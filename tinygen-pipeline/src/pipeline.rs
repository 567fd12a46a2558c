//! Pipeline orchestration.
//!
//! ```text
//! ledger.create ─▶ snapshot.acquire ─▶ snapshot.read ─▶ synthesize ─▶ ledger.attach_result
//!  (policy)           fatal               fatal           fatal          (policy)
//! ```
//!
//! Ledger steps follow the configured [`LedgerPolicy`]: best-effort failures
//! are logged at `warn` and the run continues. When `create` fails under
//! best-effort there is no id to attach the result to, so that step is skipped.

use std::path::Path;
use std::sync::Arc;

use tinygen_assistant::{ChangeSynthesizer, ChatBackend, OpenAiBackend};
use tinygen_core::{
    config::{repos_dir_at, templates_dir_at},
    FileLedger, LedgerError, LedgerPolicy, QueryId, QueryLedger, RepositoryReference, Settings,
};
use tinygen_renderer::PromptRenderer;
use tinygen_snapshot::{GitCli, RepositorySnapshot, SnapshotPolicy};

use crate::error::PipelineError;

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub artifact: String,
    /// `None` when the ledger step failed under the best-effort policy.
    pub query_id: Option<QueryId>,
}

/// The orchestrator. Stateless between runs; safe to share across threads.
pub struct Pipeline {
    snapshot: RepositorySnapshot,
    synthesizer: ChangeSynthesizer,
    ledger: Arc<dyn QueryLedger>,
    policy: LedgerPolicy,
}

impl Pipeline {
    pub fn new(
        snapshot: RepositorySnapshot,
        synthesizer: ChangeSynthesizer,
        ledger: Arc<dyn QueryLedger>,
    ) -> Self {
        Self {
            snapshot,
            synthesizer,
            ledger,
            policy: LedgerPolicy::default(),
        }
    }

    pub fn with_ledger_policy(mut self, policy: LedgerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Production wiring: `git` host, chat-completions backend and file ledger
    /// under `<home>/.tinygen/`.
    pub fn from_settings(home: &Path, settings: &Settings) -> Result<Self, PipelineError> {
        settings.validate()?;
        let api_key = settings.api_key()?;
        let backend = Arc::new(OpenAiBackend::from_settings(&settings.backend, api_key));
        Self::with_backend(home, settings, backend)
    }

    /// Like [`Pipeline::from_settings`] with a caller-supplied backend.
    pub fn with_backend(
        home: &Path,
        settings: &Settings,
        backend: Arc<dyn ChatBackend>,
    ) -> Result<Self, PipelineError> {
        settings.validate()?;
        let snapshot = RepositorySnapshot::new(
            repos_dir_at(home),
            Arc::new(GitCli::new()),
            SnapshotPolicy::from(&settings.snapshot),
        );
        let renderer = PromptRenderer::with_user_templates(&templates_dir_at(home))?;
        let synthesizer = ChangeSynthesizer::with_options(
            backend,
            renderer,
            settings.conversation.history_limit,
            settings.synthesis.format,
            settings.synthesis.acceptance,
        );
        Ok(Self::new(snapshot, synthesizer, Arc::new(FileLedger::at(home)))
            .with_ledger_policy(settings.ledger.policy))
    }

    pub fn ledger(&self) -> &dyn QueryLedger {
        self.ledger.as_ref()
    }

    /// Run once and return the artifact.
    pub fn run(
        &self,
        reference: &RepositoryReference,
        prompt: &str,
        paths: Option<&[String]>,
    ) -> Result<String, PipelineError> {
        self.run_recorded(reference, prompt, paths)
            .map(|outcome| outcome.artifact)
    }

    /// Run once and return the artifact with the ledger id it was recorded under.
    pub fn run_recorded(
        &self,
        reference: &RepositoryReference,
        prompt: &str,
        paths: Option<&[String]>,
    ) -> Result<RunOutcome, PipelineError> {
        tracing::info!(
            repo = %reference,
            prompt_len = prompt.len(),
            paths = paths.map_or(0, <[String]>::len),
            "pipeline run started"
        );

        let query_id = self
            .tolerate("create", self.ledger.create(reference, prompt))?
            .map(|query| query.id);

        let files = {
            let handle = self.snapshot.acquire(reference)?;
            self.snapshot.read(&handle, paths)?
        };
        tracing::info!(repo = %reference, files = files.len(), "snapshot read");

        let artifact = self.synthesizer.synthesize(&files, prompt)?;

        if let Some(id) = query_id {
            self.tolerate("attach_result", self.ledger.attach_result(id, &artifact))?;
        }

        tracing::info!(repo = %reference, artifact_len = artifact.len(), "pipeline run finished");
        Ok(RunOutcome { artifact, query_id })
    }

    fn tolerate<T>(
        &self,
        step: &'static str,
        result: Result<T, LedgerError>,
    ) -> Result<Option<T>, PipelineError> {
        match (result, self.policy) {
            (Ok(value), _) => Ok(Some(value)),
            (Err(err), LedgerPolicy::Required) => Err(err.into()),
            (Err(err), LedgerPolicy::BestEffort) => {
                tracing::warn!(step, error = %err, "ledger step failed; continuing");
                Ok(None)
            }
        }
    }
}
