//! Parser-combinator arena shared by the PEG-based dialects.
//!
//! Build a tree of nodes with [`builder::PegBuilder`], hand the result to
//! [`arena::PegArena::parse`] to run it against (possibly partial) model
//! output, or to [`grammar::build_grammar`] to derive the constraint
//! grammar a sampler should be restricted to while producing that output.

pub mod arena;
pub mod builder;
pub mod grammar;

pub use arena::{AstArena, AstId, ParseContext, ParseResult, ParseResultType, ParserId, PegArena};
pub use builder::{Node, PegBuilder};
pub use grammar::build_grammar;
