use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;

use tinygen_core::{config::tinygen_root, QueryId, RepositoryReference, Settings};
use tinygen_pipeline::Pipeline;

use crate::error::{io_err, DaemonError};
use crate::logging::init_tracing;
use crate::paths::socket_path;
use crate::protocol::{DaemonRequest, DaemonResponse, Generated};

const OWNER_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Shared by every connection.
struct DaemonState {
    home: PathBuf,
    pipeline: Arc<Pipeline>,
    started_at_unix: u64,
    in_flight: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Build the production pipeline from `<home>/.tinygen/config.yaml` and serve
/// until `stop` or ctrl-c, blocking the current thread.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let settings = Settings::load_at(home)?;
    let pipeline = Pipeline::from_settings(home, &settings)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), Arc::new(pipeline)))
}

/// Serve `pipeline` on `<home>/.tinygen/daemon.sock`.
pub async fn run(home: PathBuf, pipeline: Arc<Pipeline>) -> Result<(), DaemonError> {
    let root = tinygen_root(&home);
    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    }

    let state = Arc::new(DaemonState {
        home: home.clone(),
        pipeline,
        started_at_unix: unix_seconds_now(),
        in_flight: AtomicU64::new(0),
        completed: AtomicU64::new(0),
        failed: AtomicU64::new(0),
    });
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let result = socket_server_task(state, shutdown.clone(), shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (socket_result, signal_result) = tokio::join!(socket_handle, signal_handle);
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

async fn socket_server_task(
    state: Arc<DaemonState>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&state.home);
    prepare_socket_for_bind(&socket).await?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "daemon listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let state = state.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, state, shutdown_tx).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    state: Arc<DaemonState>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error("request", format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let response = match request.cmd.as_str() {
            "generate" => handle_generate(&state, request.clone()).await,
            "query" => handle_query(&state, request.id).await,
            "status" => DaemonResponse::ok(build_status_payload(&state)),
            "stop" => {
                let _ = shutdown_tx.send(());
                DaemonResponse::ok(json!({ "stopping": true }))
            }
            other => DaemonResponse::error("request", format!("unknown command '{other}'")),
        };
        write_response(&mut writer, &response).await?;
        if request.cmd == "stop" {
            break;
        }
    }
    Ok(())
}

async fn handle_generate(state: &Arc<DaemonState>, request: DaemonRequest) -> DaemonResponse {
    let (Some(repo_url), Some(prompt)) = (request.repo_url, request.prompt) else {
        return DaemonResponse::error("request", "generate requires repo_url and prompt");
    };

    state.in_flight.fetch_add(1, Ordering::SeqCst);
    let pipeline = state.pipeline.clone();
    let paths = request.file_paths;
    let joined = tokio::task::spawn_blocking(move || {
        let reference = RepositoryReference::from(repo_url);
        pipeline.run_recorded(&reference, &prompt, paths.as_deref())
    })
    .await;
    state.in_flight.fetch_sub(1, Ordering::SeqCst);

    match joined {
        Ok(Ok(outcome)) => {
            state.completed.fetch_add(1, Ordering::SeqCst);
            let generated = Generated {
                diff: outcome.artifact,
                query_id: outcome.query_id,
            };
            DaemonResponse::ok(json!(generated))
        }
        Ok(Err(err)) => {
            state.failed.fetch_add(1, Ordering::SeqCst);
            tracing::error!(stage = err.stage(), error = %err, "generate failed");
            DaemonResponse::error(err.stage(), err.to_string())
        }
        Err(err) => {
            state.failed.fetch_add(1, Ordering::SeqCst);
            DaemonResponse::error("daemon", format!("pipeline task join error: {err}"))
        }
    }
}

async fn handle_query(state: &Arc<DaemonState>, id: Option<u64>) -> DaemonResponse {
    let Some(id) = id else {
        return DaemonResponse::error("request", "query requires id");
    };
    let pipeline = state.pipeline.clone();
    let joined = tokio::task::spawn_blocking(move || pipeline.ledger().get(QueryId(id))).await;
    match joined {
        Ok(Ok(query)) => DaemonResponse::ok(json!(query)),
        Ok(Err(err)) => DaemonResponse::error("ledger", err.to_string()),
        Err(err) => DaemonResponse::error("daemon", format!("query task join error: {err}")),
    }
}

fn build_status_payload(state: &DaemonState) -> Value {
    json!({
        "running": true,
        "pid": std::process::id(),
        "started_at_unix": state.started_at_unix,
        "uptime_secs": unix_seconds_now().saturating_sub(state.started_at_unix),
        "in_flight": state.in_flight.load(Ordering::SeqCst),
        "completed": state.completed.load(Ordering::SeqCst),
        "failed": state.failed.load(Ordering::SeqCst),
        "socket": socket_path(&state.home).display().to_string(),
    })
}

/// Clear a socket file left behind by a daemon that is gone. A socket that
/// still accepts connections is never replaced.
async fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match UnixStream::connect(socket).await {
        Ok(stream) => {
            let owner = match running_daemon_pid(stream).await {
                Some(pid) => format!("pid {pid}"),
                None => "owner did not answer status".to_string(),
            };
            return Err(DaemonError::AlreadyRunning {
                socket: socket.to_path_buf(),
                owner,
            });
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

/// Ask the process holding the socket for its pid.
async fn running_daemon_pid(stream: UnixStream) -> Option<u64> {
    let exchange = async {
        let (reader, mut writer) = stream.into_split();
        let mut payload = serde_json::to_vec(&DaemonRequest::command("status")).ok()?;
        payload.push(b'\n');
        writer.write_all(&payload).await.ok()?;
        let mut line = String::new();
        BufReader::new(reader).read_line(&mut line).await.ok()?;
        let response: DaemonResponse = serde_json::from_str(line.trim_end()).ok()?;
        let data = response.data?;
        data.get("pid")?.as_u64()
    };
    tokio::time::timeout(OWNER_PROBE_TIMEOUT, exchange)
        .await
        .ok()
        .flatten()
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let mut payload = serde_json::to_vec(response)?;
    payload.push(b'\n');
    writer
        .write_all(&payload)
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    let outcome = result
        .map_err(|err| DaemonError::Protocol(format!("{task} task join failure: {err}")))?;
    if let Err(err) = &outcome {
        tracing::error!(task, error = %err, "daemon task failed");
    }
    outcome
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn stale_socket_file_is_removed_before_bind() {
        let home = TempDir::new().expect("home");
        let socket = home.path().join("daemon.sock");
        fs::write(&socket, b"").expect("stale socket");
        prepare_socket_for_bind(&socket).await.expect("prepare");
        assert!(!socket.exists());
    }

    #[tokio::test]
    async fn silent_listener_is_not_replaced() {
        let home = TempDir::new().expect("home");
        let socket = home.path().join("daemon.sock");
        let _listener = UnixListener::bind(&socket).expect("bind");
        let err = prepare_socket_for_bind(&socket).await.unwrap_err();
        assert!(err.to_string().contains("already running"), "{err}");
        assert!(err.to_string().contains("did not answer"), "{err}");
        assert!(socket.exists());
    }

    #[tokio::test]
    async fn running_daemon_is_reported_with_its_pid() {
        let home = TempDir::new().expect("home");
        let socket = home.path().join("daemon.sock");
        let listener = UnixListener::bind(&socket).expect("bind");
        let answer = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let (reader, mut writer) = stream.into_split();
            let mut line = String::new();
            BufReader::new(reader).read_line(&mut line).await.expect("request");
            assert!(line.contains(r#""cmd":"status""#));
            write_response(&mut writer, &DaemonResponse::ok(json!({ "pid": 4242 })))
                .await
                .expect("respond");
        });

        let err = prepare_socket_for_bind(&socket).await.unwrap_err();
        answer.await.expect("answer task");
        match err {
            DaemonError::AlreadyRunning { owner, .. } => assert_eq!(owner, "pid 4242"),
            other => panic!("expected AlreadyRunning, got {other:?}"),
        }
    }
}
