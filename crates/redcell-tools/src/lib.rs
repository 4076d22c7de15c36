//! Parser framework and tool-specific output parsers bound into the engine
//! core's Coordinator via the `OutputParser` trait it exposes.

pub mod helpers;
pub mod parser;
pub mod parsers;

pub use parsers::default_registry;
