//! Typed UI event stream. The Coordinator is the only producer;
//! console/collaborator consumers only ever see these variants, never raw
//! process output or internal component types.

use uuid::Uuid;

use crate::knowledge::{ExecutionStatus, ParseStatus};
use crate::policy::RiskLevel;

/// Which stream a chunk of tool output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// What kind of interactive input the running tool appears to be waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Confirmation,
    Password,
}

/// The complete, closed set of events a collaborator surface can observe
///. Adding a variant is a deliberate, reviewed change.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    ToolStarted {
        execution_id: Uuid,
        tool_id: String,
        argv: Vec<String>,
        target: String,
    },
    ToolOutputChunk {
        execution_id: Uuid,
        stream: OutputStream,
        text: String,
    },
    InputRequested {
        execution_id: Uuid,
        kind: InputKind,
    },
    ApprovalRequired {
        intent_target: String,
        risk: RiskLevel,
        reason: String,
    },
    ToolCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
        entities_created: u64,
        stdout_path: String,
        stderr_path: Option<String>,
        duration_ms: i64,
    },
    ToolError {
        execution_id: Uuid,
        kind: String,
        message: String,
    },
    ParseOutcome {
        execution_id: Uuid,
        status: ParseStatus,
    },
}
