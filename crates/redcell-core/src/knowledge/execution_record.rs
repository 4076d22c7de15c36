//! `ExecutionRecord`: the audit trail, kept in its own table
//! and never merged with knowledge entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Partial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStatus {
    Parsed,
    ParseFailed,
    EmptyOutput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: uuid::Uuid,
    pub tool_id: String,
    pub stage_id: String,
    pub target: String,
    pub execution_status: ExecutionStatus,
    pub parse_status: ParseStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub raw_stdout_path: String,
    #[serde(default)]
    pub raw_stderr_path: Option<String>,
    pub entities_created: u64,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ExecutionRecord {
    /// Invariant: a `ParseFailed` record always has zero entities created.
    pub fn is_well_formed(&self) -> bool {
        if self.parse_status == ParseStatus::ParseFailed {
            self.entities_created == 0
        } else {
            true
        }
    }
}
