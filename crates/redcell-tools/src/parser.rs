//! Parser Framework: the contract every tool-specific parser
//! satisfies, plus the partial-success policy shared by all of them.
//!
//! A parser never panics on malformed input — it returns `ParseStatus::
//! ParseFailed` with an empty batch. A parser that recognizes some lines but
//! not others still reports `Parsed` with whatever entities it found
//! (partial success), never `ParseFailed`, because `ParseFailed` is reserved
//! for "this output was not %TOOL% output at all."

use redcell_core::coordinator::{ParseInput, ParseOutput};
use redcell_core::knowledge::{EntityBatch, ParseStatus};
use redcell_core::{Entity, Relationship};

/// Builds a `Parsed` outcome, with `Parsed` meaning "the output was
/// recognizable," regardless of how many entities it actually yielded.
pub fn parsed(entities: Vec<Entity>, relationships: Vec<Relationship>) -> ParseOutput {
    ParseOutput {
        status: ParseStatus::Parsed,
        batch: EntityBatch {
            entities,
            relationships,
        },
    }
}

/// Builds an `EmptyOutput` outcome: the tool ran and produced nothing a
/// parser could act on (e.g. zero hosts found), which is not a failure.
pub fn empty_output() -> ParseOutput {
    ParseOutput {
        status: ParseStatus::EmptyOutput,
        batch: EntityBatch::default(),
    }
}

/// Builds a `ParseFailed` outcome: the output did not match this tool's
/// expected shape at all.
pub fn parse_failed() -> ParseOutput {
    ParseOutput {
        status: ParseStatus::ParseFailed,
        batch: EntityBatch::default(),
    }
}

/// Convenience re-export so individual parser modules only need one `use`.
pub use redcell_core::coordinator::OutputParser;

pub type Input<'a> = ParseInput<'a>;
