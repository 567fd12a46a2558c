use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tinygen_assistant::{BackendError, ChangeSynthesizer, ChatBackend};
use tinygen_core::{ConversationTurn, MemoryLedger, QueryId, RepositoryReference};
use tinygen_daemon::{
    paths::socket_path, request_generate, request_query, request_status, request_stop,
    send_request, DaemonError, DaemonRequest,
};
use tinygen_pipeline::Pipeline;
use tinygen_renderer::PromptRenderer;
use tinygen_snapshot::{HostError, RepositoryHost, RepositorySnapshot, SnapshotPolicy};

const DIFF: &str = "--- a/main.go\n+++ b/main.go\n@@ -1 +1 @@\n-package main\n+package app\n";

struct FixtureHost {
    fixture: PathBuf,
}

impl RepositoryHost for FixtureHost {
    fn fetch(&self, reference: &RepositoryReference, dest: &Path) -> Result<(), HostError> {
        if reference.0.contains("unreachable") {
            return Err(HostError("could not resolve host".into()));
        }
        fs::create_dir_all(dest).map_err(|e| HostError(e.to_string()))?;
        for entry in walkdir::WalkDir::new(&self.fixture).min_depth(1) {
            let entry = entry.map_err(|e| HostError(e.to_string()))?;
            let target = dest.join(entry.path().strip_prefix(&self.fixture).expect("prefix"));
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target).map_err(|e| HostError(e.to_string()))?;
            } else {
                fs::copy(entry.path(), &target).map_err(|e| HostError(e.to_string()))?;
            }
        }
        Ok(())
    }

    fn update(&self, _: &RepositoryReference, _: &Path) -> Result<(), HostError> {
        Ok(())
    }
}

/// Proposes [`DIFF`] and confirms it, for any number of runs.
struct ConfirmingBackend;

impl ChatBackend for ConfirmingBackend {
    fn complete(&self, turns: &[ConversationTurn]) -> Result<String, BackendError> {
        Ok(if turns.len() == 1 { DIFF.to_string() } else { "y".to_string() })
    }
}

struct Daemon {
    home: TempDir,
    _fixture: TempDir,
    _repos: TempDir,
    handle: tokio::task::JoinHandle<Result<(), DaemonError>>,
}

async fn start_daemon() -> Daemon {
    let home = TempDir::new().expect("home");
    let fixture = TempDir::new().expect("fixture");
    fs::write(fixture.path().join("main.go"), "package main\n").expect("fixture file");
    let repos = TempDir::new().expect("repos");

    let snapshot = RepositorySnapshot::new(
        repos.path(),
        Arc::new(FixtureHost {
            fixture: fixture.path().to_path_buf(),
        }),
        SnapshotPolicy::default(),
    );
    let synthesizer = ChangeSynthesizer::new(
        Arc::new(ConfirmingBackend),
        PromptRenderer::new().expect("renderer"),
        10,
    );
    let pipeline = Pipeline::new(snapshot, synthesizer, Arc::new(MemoryLedger::new()));

    let handle = tokio::spawn(tinygen_daemon::run(home.path().to_path_buf(), Arc::new(pipeline)));

    let socket = socket_path(home.path());
    for _ in 0..100 {
        if socket.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(socket.exists(), "daemon socket never appeared");

    Daemon {
        home,
        _fixture: fixture,
        _repos: repos,
        handle,
    }
}

/// The client helpers block; keep them off the runtime's worker threads.
async fn blocking<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    tokio::task::spawn_blocking(f).await.expect("blocking client task")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn generate_then_query_then_stop() {
    let daemon = start_daemon().await;
    let home = daemon.home.path().to_path_buf();

    let generated = {
        let home = home.clone();
        blocking(move || {
            request_generate(&home, "https://example.com/repo.git", "Rename the package", None)
        })
        .await
        .expect("generate")
    };
    assert_eq!(generated.diff, DIFF);
    let id = generated.query_id.expect("query recorded");

    let record = {
        let home = home.clone();
        blocking(move || request_query(&home, id)).await.expect("query")
    };
    assert_eq!(record["prompt"], "Rename the package");
    assert_eq!(record["diff"], DIFF);

    let status = {
        let home = home.clone();
        blocking(move || request_status(&home)).await.expect("status")
    };
    assert_eq!(status["running"], true);
    assert_eq!(status["completed"], 1);

    {
        let home = home.clone();
        blocking(move || request_stop(&home)).await.expect("stop");
    }
    daemon.handle.await.expect("join").expect("daemon exits cleanly");
    assert!(!socket_path(&home).exists(), "socket removed on shutdown");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failures_report_their_stage() {
    let daemon = start_daemon().await;
    let home = daemon.home.path().to_path_buf();

    let err = {
        let home = home.clone();
        blocking(move || request_generate(&home, "https://unreachable.example/x.git", "p", None))
            .await
            .unwrap_err()
    };
    match err {
        DaemonError::Remote { stage, message } => {
            assert_eq!(stage, "snapshot");
            assert!(message.contains("could not resolve host"), "{message}");
        }
        other => panic!("expected remote error, got {other:?}"),
    }

    let err = {
        let home = home.clone();
        blocking(move || {
            request_generate(
                &home,
                "https://example.com/repo.git",
                "p",
                Some(vec!["missing.go".to_string()]),
            )
        })
        .await
        .unwrap_err()
    };
    assert!(err.to_string().starts_with("snapshot stage failed"), "{err}");

    let err = {
        let home = home.clone();
        blocking(move || request_query(&home, QueryId(404))).await.unwrap_err()
    };
    assert!(matches!(err, DaemonError::Remote { ref stage, .. } if stage == "ledger"));

    let response = {
        let home = home.clone();
        blocking(move || send_request(&home, &DaemonRequest::command("generate")))
            .await
            .expect("response")
    };
    assert!(!response.ok);
    assert_eq!(response.stage.as_deref(), Some("request"));

    blocking(move || request_stop(&home)).await.expect("stop");
    daemon.handle.await.expect("join").expect("daemon exits cleanly");
}
