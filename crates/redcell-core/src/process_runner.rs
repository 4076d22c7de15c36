//! Process Runner: spawns a prepared command, streams its output as typed
//! events, and maps its exit into an `ExecutionStatus`. Built around
//! `Command`/`Child`/`Stdio` and a wait-loop with a cancellation signal,
//! replacing a one-shot `output()` call with a live, cancellable stream.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::timeout as tokio_timeout;
use uuid::Uuid;

use crate::error::ExecutionError;
use crate::events::{EngineEvent, InputKind, OutputStream};
use crate::execution_manager::PreparedCommand;
use crate::knowledge::ExecutionStatus;

const CANCEL_GRACE: Duration = Duration::from_secs(5);

static PROMPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\[y/n\]|password:\s*$)").unwrap());

/// Outcome of one full invocation, independent of parsing. Exit-code mapping:
/// 0 -> Success; 126/127 -> AuthorizationDenied; timeout -> TimedOut; signal
/// -> Crashed; else -> NonZero.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: ExecutionStatus,
    pub exit_error: Option<ExecutionError>,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
    pub duration_ms: i64,
}

/// A live handle to a spawned process: an event stream and a way to push
/// stdin or request cancellation.
pub struct ProcessHandle {
    pub execution_id: Uuid,
    pub events: mpsc::Receiver<EngineEvent>,
    pub stdin_tx: mpsc::Sender<String>,
    cancel_tx: mpsc::Sender<()>,
}

impl ProcessHandle {
    pub async fn cancel(&self) {
        let _ = self.cancel_tx.send(()).await;
    }
}

/// Spawns `prepared` and drives it to completion on a background task,
/// emitting events as they happen. `wall_clock_timeout` bounds the whole
/// invocation; exceeding it cancels the process and reports `TimedOut`.
pub async fn spawn(
    prepared: PreparedCommand,
    wall_clock_timeout: Duration,
    line_cap: usize,
    byte_cap: u64,
) -> Result<(ProcessHandle, tokio::task::JoinHandle<RunOutcome>), ExecutionError> {
    let execution_id = Uuid::new_v4();
    let tool_id = prepared.binary.clone();

    let mut command = Command::new(&prepared.binary);
    command
        .args(&prepared.argv)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped());

    let mut child: Child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            tracing::warn!(target: "redcell::process_runner", binary = %prepared.binary, "binary not found");
            ExecutionError::ToolNotFound(prepared.binary.clone())
        } else {
            tracing::warn!(target: "redcell::process_runner", binary = %prepared.binary, error = %e, "spawn failed");
            ExecutionError::Crashed
        }
    })?;

    tracing::info!(target: "redcell::process_runner", execution_id = %execution_id, binary = %prepared.binary, "spawned");

    let stdout = child.stdout.take().expect("piped stdout");
    let stderr = child.stderr.take().expect("piped stderr");
    let mut stdin = child.stdin.take().expect("piped stdin");

    let (events_tx, events_rx) = mpsc::channel(256);
    let (stdin_rx_tx, mut stdin_rx) = mpsc::channel::<String>(16);
    let (cancel_tx, mut cancel_rx) = mpsc::channel::<()>(1);

    let stdout_path = prepared.temp_output_dir.join("stdout.log");
    let stderr_path = prepared.temp_output_dir.join("stderr.log");

    let started_at = Utc::now();
    let argv_for_event = {
        let mut v = vec![prepared.binary.clone()];
        v.extend(prepared.argv.iter().cloned());
        v
    };

    let _ = events_tx
        .send(EngineEvent::ToolStarted {
            execution_id,
            tool_id: tool_id.clone(),
            argv: argv_for_event,
            target: String::new(),
        })
        .await;

    let stdout_events_tx = events_tx.clone();
    let stdout_log_path = stdout_path.clone();
    let stdout_task = tokio::spawn(async move {
        stream_lines(
            stdout,
            stdout_log_path,
            OutputStream::Stdout,
            execution_id,
            stdout_events_tx,
            line_cap,
            byte_cap,
        )
        .await
    });

    let stderr_events_tx = events_tx.clone();
    let stderr_log_path = stderr_path.clone();
    let stderr_task = tokio::spawn(async move {
        stream_lines(
            stderr,
            stderr_log_path,
            OutputStream::Stderr,
            execution_id,
            stderr_events_tx,
            line_cap,
            byte_cap,
        )
        .await
    });

    let driver = tokio::spawn(async move {
        tokio::spawn(async move {
            while let Some(line) = stdin_rx.recv().await {
                let _ = stdin.write_all(line.as_bytes()).await;
                let _ = stdin.write_all(b"\n").await;
                let _ = stdin.flush().await;
            }
        });

        let mut was_cancelled = false;
        let wait_result = tokio::select! {
            result = tokio_timeout(wall_clock_timeout, child.wait()) => result,
            _ = cancel_rx.recv() => {
                was_cancelled = true;
                let _ = child.start_kill();
                let _ = tokio_timeout(CANCEL_GRACE, child.wait()).await;
                let _ = child.kill().await;
                Ok(child.wait().await)
            }
        };

        let _ = stdout_task.await;
        let _ = stderr_task.await;

        let duration_ms = (Utc::now() - started_at).num_milliseconds();

        let (status, exit_error) = if was_cancelled {
            tracing::info!(target: "redcell::process_runner", execution_id = %execution_id, "invocation cancelled");
            (ExecutionStatus::Failed, Some(ExecutionError::Cancelled))
        } else {
            match wait_result {
                Err(_elapsed) => {
                    tracing::warn!(target: "redcell::process_runner", execution_id = %execution_id, "wall clock timeout, killing process");
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    (ExecutionStatus::Failed, Some(ExecutionError::TimedOut))
                }
                Ok(Ok(exit_status)) => map_exit_status(exit_status),
                Ok(Err(_)) => (ExecutionStatus::Failed, Some(ExecutionError::Crashed)),
            }
        };

        let _ = events_tx
            .send(EngineEvent::ToolCompleted {
                execution_id,
                status,
                entities_created: 0,
                stdout_path: stdout_path.to_string_lossy().to_string(),
                stderr_path: Some(stderr_path.to_string_lossy().to_string()),
                duration_ms,
            })
            .await;

        RunOutcome {
            status,
            exit_error,
            stdout_path,
            stderr_path,
            duration_ms,
        }
    });

    Ok((
        ProcessHandle {
            execution_id,
            events: events_rx,
            stdin_tx: stdin_rx_tx,
            cancel_tx,
        },
        driver,
    ))
}

#[cfg(unix)]
fn map_exit_status(status: std::process::ExitStatus) -> (ExecutionStatus, Option<ExecutionError>) {
    use std::os::unix::process::ExitStatusExt;
    if let Some(code) = status.code() {
        match code {
            0 => (ExecutionStatus::Success, None),
            126 | 127 => (
                ExecutionStatus::Failed,
                Some(ExecutionError::AuthorizationDenied),
            ),
            other => (ExecutionStatus::Failed, Some(ExecutionError::NonZero(other))),
        }
    } else if status.signal().is_some() {
        (ExecutionStatus::Failed, Some(ExecutionError::Crashed))
    } else {
        (ExecutionStatus::Failed, Some(ExecutionError::Crashed))
    }
}

#[cfg(not(unix))]
fn map_exit_status(status: std::process::ExitStatus) -> (ExecutionStatus, Option<ExecutionError>) {
    match status.code() {
        Some(0) => (ExecutionStatus::Success, None),
        Some(126) | Some(127) => (
            ExecutionStatus::Failed,
            Some(ExecutionError::AuthorizationDenied),
        ),
        Some(other) => (ExecutionStatus::Failed, Some(ExecutionError::NonZero(other))),
        None => (ExecutionStatus::Failed, Some(ExecutionError::Crashed)),
    }
}

/// Streams `reader` line by line into both the on-disk raw log and the event
/// channel, until either cap is hit. `line_cap` bounds how many lines are
/// forwarded as `ToolOutputChunk` events; `byte_cap` bounds how many raw
/// bytes are written to the log file. Past either cap the reader keeps
/// draining the pipe so the child process never blocks on a full pipe
/// buffer, it just stops being recorded.
async fn stream_lines<R>(
    reader: R,
    log_path: PathBuf,
    stream: OutputStream,
    execution_id: Uuid,
    events_tx: mpsc::Sender<EngineEvent>,
    line_cap: usize,
    byte_cap: u64,
) where
    R: tokio::io::AsyncRead + Unpin,
{
    if let Some(parent) = log_path.parent() {
        let _ = tokio::fs::create_dir_all(parent).await;
    }
    let mut log_file = match tokio::fs::File::create(&log_path).await {
        Ok(f) => Some(f),
        Err(_) => None,
    };

    let mut lines = BufReader::new(reader).lines();
    let mut buffered = 0usize;
    let mut bytes_written = 0u64;

    while let Ok(Some(line)) = lines.next_line().await {
        if bytes_written < byte_cap {
            if let Some(file) = log_file.as_mut() {
                let _ = file.write_all(line.as_bytes()).await;
                let _ = file.write_all(b"\n").await;
            }
            bytes_written += line.len() as u64 + 1;
        }

        if buffered < line_cap {
            let _ = events_tx
                .send(EngineEvent::ToolOutputChunk {
                    execution_id,
                    stream,
                    text: line.clone(),
                })
                .await;
            buffered += 1;
        }

        if let Some(captures) = PROMPT_RE.find(&line) {
            let kind = if captures.as_str().to_lowercase().contains("password") {
                InputKind::Password
            } else {
                InputKind::Confirmation
            };
            let _ = events_tx
                .send(EngineEvent::InputRequested { execution_id, kind })
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawning_a_missing_binary_reports_tool_not_found() {
        let prepared = PreparedCommand {
            binary: "definitely-not-a-real-binary-xyz".to_string(),
            argv: vec![],
            temp_output_dir: std::env::temp_dir().join(Uuid::new_v4().to_string()),
        };
        let result = spawn(prepared, Duration::from_secs(5), 10_000, 100 * 1024 * 1024).await;
        assert!(matches!(result, Err(ExecutionError::ToolNotFound(_))));
    }

    #[tokio::test]
    async fn successful_exit_streams_output_and_completes() {
        let dir = std::env::temp_dir().join(Uuid::new_v4().to_string());
        let prepared = PreparedCommand {
            binary: "echo".to_string(),
            argv: vec!["hello".to_string()],
            temp_output_dir: dir,
        };
        let (mut handle, driver) = spawn(prepared, Duration::from_secs(5), 10_000, 100 * 1024 * 1024)
            .await
            .unwrap();
        let mut saw_chunk = false;
        let mut saw_completed = false;
        while let Some(event) = handle.events.recv().await {
            match event {
                EngineEvent::ToolOutputChunk { text, .. } if text == "hello" => saw_chunk = true,
                EngineEvent::ToolCompleted { status, .. } => {
                    saw_completed = true;
                    assert_eq!(status, ExecutionStatus::Success);
                }
                _ => {}
            }
        }
        let outcome = driver.await.unwrap();
        assert!(saw_chunk);
        assert!(saw_completed);
        assert_eq!(outcome.status, ExecutionStatus::Success);
    }

    #[tokio::test]
    async fn cancelling_a_long_running_process_reports_cancelled_not_crashed() {
        let dir = std::env::temp_dir().join(Uuid::new_v4().to_string());
        let prepared = PreparedCommand {
            binary: "sleep".to_string(),
            argv: vec!["30".to_string()],
            temp_output_dir: dir,
        };
        let (handle, driver) = spawn(prepared, Duration::from_secs(30), 10_000, 100 * 1024 * 1024)
            .await
            .unwrap();
        handle.cancel().await;
        let outcome = driver.await.unwrap();
        assert!(matches!(outcome.exit_error, Some(ExecutionError::Cancelled)));
    }
}
