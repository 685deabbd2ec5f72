//! Dialect-specific machinery: format selection (`registry`), prompt and
//! grammar construction (`render`), output parsing (`parse`), and the
//! shared XML-tool-call delimiter presets the seven XML-engine dialects
//! plug into the engine in `crate::xml_tool_call` (`xml_presets`).

pub mod parse;
pub mod registry;
pub mod render;
pub mod xml_presets;

pub use registry::{select_format, SelectionContext};
