//! Knowledge Store: entities, relationships, execution history.

pub mod crypto;
pub mod execution_record;
pub mod store;

pub use execution_record::{ExecutionRecord, ExecutionStatus, ParseStatus};
pub use store::{EntityBatch, HistoryQuery, KnowledgeStore, PruneReport, UpsertReport};
