//! Closed error taxonomy. Each category is its own enum so callers
//! can match narrowly; `EngineError` is the Coordinator-facing union.

use thiserror::Error;

/// Malformed or rejected user-facing input, before any policy or build step runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    #[error("intent response did not match the Intent schema: {0}")]
    IntentSchemaViolation(String),
    #[error("unknown intent kind: {0}")]
    UnknownIntent(String),
}

/// Execution Policy decisions that stop a request before a command is built.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("denied by policy: {0}")]
    PolicyDenied(String),
    #[error("confirmation required before this tactic may run")]
    ConfirmationRequired,
}

/// Command Builder rejections.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("command build failed: {0}")]
    CommandBuildError(String),
}

/// Failures observed while a tool was actually running.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("authorization denied (exit 126/127)")]
    AuthorizationDenied,
    #[error("tool binary not found: {0}")]
    ToolNotFound(String),
    #[error("invocation timed out")]
    TimedOut,
    #[error("process was terminated by a signal")]
    Crashed,
    #[error("invocation was cancelled")]
    Cancelled,
    #[error("process exited with non-zero status {0}")]
    NonZero(i32),
}

/// Knowledge Store failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("entity id is not well-formed for its kind: {0}")]
    InvalidId(String),
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("i/o error talking to the backing store: {0}")]
    IoError(String),
}

/// Failures owned by an external collaborator (LLM provider, container runtime probe).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExternalError {
    #[error("the LLM collaborator is unavailable: {0}")]
    LlmUnavailable(String),
    #[error("container runtime probe failed: {0}")]
    RuntimeProbeFailed(String),
    #[error("{tool_id} requires root but no container runtime or local privilege is available")]
    PrivilegeUnavailable { tool_id: String },
}

/// Top-level error union surfaced by the Coordinator's public API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    External(#[from] ExternalError),
}
