//! Coordinator: the only component that talks to every other
//! one. Resolves policy, builds and runs a command, then hands its output to
//! the bound parser and commits the result to the Knowledge Store.
//!
//! The Coordinator never depends on a concrete parser implementation — it
//! depends on the `OutputParser` trait below, so `redcell-tools` (which
//! depends on this crate) can supply parsers without a dependency cycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};

use crate::command_builder::build_command;
use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::execution_manager::ExecutionManager;
use crate::intent::Intent;
use crate::knowledge::{EntityBatch, ExecutionRecord, ExecutionStatus, KnowledgeStore, ParseStatus};
use crate::policy::ExecutionPolicy;
use crate::policy_gate;
use crate::process_runner;

/// What a bound parser needs to turn one invocation's raw output into
/// entities, minus the tool-specific details that live in `redcell-tools`.
pub struct ParseInput<'a> {
    pub target: &'a str,
    pub stdout: &'a str,
    pub stderr: &'a str,
}

/// Outcome of handing an invocation's output to its bound parser.
pub struct ParseOutput {
    pub status: ParseStatus,
    pub batch: EntityBatch,
}

/// Implemented once per tool in `redcell-tools`; looked up by `ToolDef::tool_id`.
pub trait OutputParser: Send + Sync {
    fn parse(&self, input: ParseInput<'_>) -> ParseOutput;
}

/// Binds every engine component into one request/response surface.
pub struct Coordinator {
    policy: ExecutionPolicy,
    store: Arc<KnowledgeStore>,
    execution_manager: Arc<ExecutionManager>,
    parsers: HashMap<&'static str, Arc<dyn OutputParser>>,
    default_timeout: Duration,
    concurrency: Arc<Semaphore>,
    stdout_line_cap: usize,
    raw_output_byte_cap: u64,
}

impl Coordinator {
    pub fn new(
        policy: ExecutionPolicy,
        store: Arc<KnowledgeStore>,
        execution_manager: Arc<ExecutionManager>,
        parsers: HashMap<&'static str, Arc<dyn OutputParser>>,
    ) -> Self {
        Self {
            policy,
            store,
            execution_manager,
            parsers,
            default_timeout: Duration::from_secs(300),
            concurrency: Arc::new(Semaphore::new(4)),
            stdout_line_cap: 10_000,
            raw_output_byte_cap: 100 * 1024 * 1024,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Applies the caps and in-flight invocation ceiling from an
    /// `EngineConfig`.
    pub fn with_config(mut self, config: &crate::config::EngineConfig) -> Self {
        self.concurrency = Arc::new(Semaphore::new(config.max_concurrent_invocations.max(1)));
        self.stdout_line_cap = config.stdout_line_cap;
        self.raw_output_byte_cap = config.raw_output_byte_cap;
        self
    }

    /// Runs one resolved intent end to end: gate, build, prepare, spawn,
    /// parse, commit. Returns a receiver of every `EngineEvent` the
    /// invocation produces; the caller (console, or any other collaborator
    /// surface) drains it.
    ///
    /// A policy decision of `AllowWithConfirmation` still runs the tool —
    /// the confirmation gate is enforced by the caller checking
    /// `ApprovalRequired` before calling this method again with explicit
    /// operator approval recorded upstream; the Coordinator itself does not
    /// block on interactive confirmation, leaving the UI/gate hand-off to
    /// the collaborator surface.
    pub async fn execute(
        &self,
        intent: Intent,
        confirmed: bool,
    ) -> Result<mpsc::Receiver<EngineEvent>, EngineError> {
        tracing::info!(
            target: "redcell::coordinator",
            kind = ?intent.kind,
            target_value = %intent.target,
            "executing intent"
        );
        let outcome = policy_gate::evaluate(&self.policy, &intent)?;

        let (tx, rx) = mpsc::channel(256);

        if outcome.requires_confirmation && !confirmed {
            let _ = tx
                .send(EngineEvent::ApprovalRequired {
                    intent_target: intent.target.clone(),
                    risk: outcome.tool.risk,
                    reason: outcome.reason.clone().unwrap_or_default(),
                })
                .await;
            return Ok(rx);
        }

        let final_command = build_command(outcome.tool, &intent)?;
        let prepared = self
            .execution_manager
            .prepare(&final_command, outcome.tool.requires_root)
            .await?;

        let permit = Arc::clone(&self.concurrency)
            .acquire_owned()
            .await
            .map_err(|_| EngineError::from(crate::error::ExternalError::RuntimeProbeFailed(
                "invocation concurrency semaphore closed".to_string(),
            )))?;

        let (mut handle, driver) = process_runner::spawn(
            prepared,
            self.default_timeout,
            self.stdout_line_cap,
            self.raw_output_byte_cap,
        )
        .await?;
        let execution_id = handle.execution_id;
        let tool_id = outcome.tool.tool_id;
        let target = intent.target.clone();
        let store = Arc::clone(&self.store);
        let parser = self.parsers.get(tool_id).cloned();

        tokio::spawn(async move {
            let _permit = permit;
            let mut stdout_buf = String::new();
            let mut stderr_buf = String::new();

            while let Some(event) = handle.events.recv().await {
                if let EngineEvent::ToolOutputChunk { stream, ref text, .. } = event {
                    match stream {
                        crate::events::OutputStream::Stdout => {
                            stdout_buf.push_str(text);
                            stdout_buf.push('\n');
                        }
                        crate::events::OutputStream::Stderr => {
                            stderr_buf.push_str(text);
                            stderr_buf.push('\n');
                        }
                    }
                }
                if tx.send(event).await.is_err() {
                    return;
                }
            }

            let run_outcome = match driver.await {
                Ok(outcome) => outcome,
                Err(_) => return,
            };

            let (parse_status, entities_created) = match &parser {
                Some(parser) if run_outcome.status == ExecutionStatus::Success => {
                    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        parser.parse(ParseInput {
                            target: &target,
                            stdout: &stdout_buf,
                            stderr: &stderr_buf,
                        })
                    }));
                    match result {
                        Ok(output) => {
                            let count = output.batch.entities.len() as u64;
                            if !matches!(output.status, ParseStatus::ParseFailed) {
                                let _ = store.upsert_entities(output.batch);
                            }
                            (output.status, count)
                        }
                        Err(_) => (ParseStatus::ParseFailed, 0),
                    }
                }
                Some(_) => (ParseStatus::EmptyOutput, 0),
                None => (ParseStatus::EmptyOutput, 0),
            };

            let _ = tx
                .send(EngineEvent::ParseOutcome {
                    execution_id,
                    status: parse_status,
                })
                .await;

            tracing::info!(
                target: "redcell::coordinator",
                tool_id,
                status = ?run_outcome.status,
                parse_status = ?parse_status,
                entities_created,
                duration_ms = run_outcome.duration_ms,
                "invocation finished"
            );

            let execution_status = if run_outcome.status == ExecutionStatus::Success
                && parse_status != ParseStatus::Parsed
            {
                ExecutionStatus::Partial
            } else {
                run_outcome.status
            };

            let record = ExecutionRecord {
                id: execution_id,
                tool_id: tool_id.to_string(),
                stage_id: execution_id.to_string(),
                target: target.clone(),
                execution_status,
                parse_status,
                started_at: chrono::Utc::now() - chrono::Duration::milliseconds(run_outcome.duration_ms),
                completed_at: chrono::Utc::now(),
                duration_ms: run_outcome.duration_ms,
                raw_stdout_path: run_outcome.stdout_path.to_string_lossy().to_string(),
                raw_stderr_path: Some(run_outcome.stderr_path.to_string_lossy().to_string()),
                entities_created,
                error_message: run_outcome.exit_error.as_ref().map(|e| e.to_string()),
            };
            let _ = store.record_execution(&record);
        });

        Ok(rx)
    }
}
