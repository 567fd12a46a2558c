use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use rstest::rstest;
use tinygen_assistant::{BackendError, ChangeSynthesizer, ChatBackend, SynthesisError};
use tinygen_core::{AcceptanceMode, ArtifactFormat, ConversationTurn, FileSet, Role};
use tinygen_renderer::PromptRenderer;

/// Replies from a fixed script and records every request it receives.
struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String, BackendError>>>,
    requests: Mutex<Vec<Vec<ConversationTurn>>>,
}

impl ScriptedBackend {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn failing_on(call: usize) -> Arc<Self> {
        let mut replies: VecDeque<_> = (0..call).map(|_| Ok("ok".to_string())).collect();
        replies.push_back(Err(BackendError::Status {
            status: 500,
            message: "upstream unavailable".into(),
        }));
        Arc::new(Self {
            replies: Mutex::new(replies),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<Vec<ConversationTurn>> {
        self.requests.lock().unwrap().clone()
    }
}

impl ChatBackend for ScriptedBackend {
    fn complete(&self, turns: &[ConversationTurn]) -> Result<String, BackendError> {
        self.requests.lock().unwrap().push(turns.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Malformed("script exhausted".into())))
    }
}

fn files() -> FileSet {
    [
        ("src/app.py", "def load(x):\n    return x.value\n"),
        ("src/util.js", "export const x = 1;\n"),
    ]
    .into_iter()
    .collect()
}

fn synthesizer(backend: Arc<ScriptedBackend>, format: ArtifactFormat) -> ChangeSynthesizer {
    ChangeSynthesizer::with_options(
        backend,
        PromptRenderer::new().expect("renderer"),
        10,
        format,
        AcceptanceMode::Exact,
    )
}

const R1: &str = "--- a/src/app.py\n+++ b/src/app.py\n@@ -1,2 +1,4 @@\n def load(x):\n+    if x is None:\n+        return None\n     return x.value\n";

// ---------------------------------------------------------------------------
// 1. Decision rule
// ---------------------------------------------------------------------------

#[rstest]
#[case::confirmed(" Y ", R1)]
#[case::revised("No, use this instead", "No, use this instead")]
fn artifact_follows_reflection_reply(#[case] reflection: &str, #[case] expected: &str) {
    let backend = ScriptedBackend::new(&[R1, reflection]);
    let artifact = synthesizer(backend.clone(), ArtifactFormat::UnifiedDiff)
        .synthesize(&files(), "Add null check")
        .expect("synthesize");
    assert_eq!(artifact, expected);
    assert_eq!(backend.requests().len(), 2);
}

#[test]
fn revision_is_returned_verbatim_including_whitespace() {
    let revision = "\n--- a/x\n+++ b/x\n  ";
    let backend = ScriptedBackend::new(&[R1, revision]);
    let artifact = synthesizer(backend, ArtifactFormat::UnifiedDiff)
        .synthesize(&files(), "Add null check")
        .expect("synthesize");
    assert_eq!(artifact, revision);
}

// ---------------------------------------------------------------------------
// 2. Conversation shape
// ---------------------------------------------------------------------------

#[test]
fn proposal_embeds_every_file_and_instruction_then_reflection_sees_r1() {
    let backend = ScriptedBackend::new(&[R1, "y"]);
    synthesizer(backend.clone(), ArtifactFormat::UnifiedDiff)
        .synthesize(&files(), "Add null check")
        .expect("synthesize");

    let requests = backend.requests();
    let proposal = &requests[0];
    assert_eq!(proposal.len(), 1);
    assert_eq!(proposal[0].role, Role::User);
    assert!(proposal[0].content.contains("### src/app.py\ndef load(x):"));
    assert!(proposal[0].content.contains("### src/util.js\nexport const x = 1;"));
    assert!(proposal[0].content.contains("Add null check"));
    assert!(proposal[0].content.contains("unified diff"));

    let reflection = &requests[1];
    assert_eq!(reflection.len(), 3);
    assert_eq!(reflection[1], ConversationTurn::assistant(R1));
    assert!(reflection[2].content.contains("'y'"));
}

#[test]
fn every_call_starts_a_fresh_session() {
    let backend = ScriptedBackend::new(&[R1, "y", R1, "y"]);
    let synth = synthesizer(backend.clone(), ArtifactFormat::UnifiedDiff);
    synth.synthesize(&files(), "first").expect("first");
    synth.synthesize(&files(), "second").expect("second");

    let requests = backend.requests();
    assert_eq!(requests[2].len(), 1, "second run must not see the first run's turns");
    assert!(requests[2][0].content.contains("second"));
}

#[test]
fn tight_history_limit_still_bounds_requests() {
    let backend = ScriptedBackend::new(&[R1, "y"]);
    ChangeSynthesizer::new(backend.clone(), PromptRenderer::new().expect("renderer"), 2)
        .synthesize(&files(), "x")
        .expect("synthesize");
    assert!(backend.requests().iter().all(|r| r.len() <= 2));
}

// ---------------------------------------------------------------------------
// 3. Failures
// ---------------------------------------------------------------------------

#[rstest]
#[case::proposal(0)]
#[case::reflection(1)]
fn backend_failure_surfaces_unmodified(#[case] failing_call: usize) {
    let backend = ScriptedBackend::failing_on(failing_call);
    let err = synthesizer(backend, ArtifactFormat::UnifiedDiff)
        .synthesize(&files(), "x")
        .unwrap_err();
    match err {
        SynthesisError::Backend(BackendError::Status { status, .. }) => assert_eq!(status, 500),
        other => panic!("expected backend status error, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// 4. Rewritten-file mode
// ---------------------------------------------------------------------------

#[test]
fn rewritten_files_answer_becomes_a_diff() {
    let r1 = r#"{"src/app.py": "def load(x):\n    if x is None:\n        return None\n    return x.value\n"}"#;
    let backend = ScriptedBackend::new(&[r1, "n"]);
    let artifact = synthesizer(backend.clone(), ArtifactFormat::RewrittenFiles)
        .synthesize(&files(), "Add null check")
        .expect("synthesize");

    assert!(artifact.starts_with("--- a/src/app.py\n+++ b/src/app.py\n"), "{artifact}");
    assert!(artifact.contains("+    if x is None:"));
    assert!(backend.requests()[0][0].content.contains("JSON object"));
}

#[test]
fn rewritten_files_revision_that_is_not_json_passes_through() {
    let backend = ScriptedBackend::new(&["{}", "Sorry, here is a diff instead"]);
    let artifact = synthesizer(backend, ArtifactFormat::RewrittenFiles)
        .synthesize(&files(), "x")
        .expect("synthesize");
    assert_eq!(artifact, "Sorry, here is a diff instead");
}
