//! Shared data model for the chat-template and tool-call processing core.
//!
//! This crate holds only value types: messages, tool specs, render
//! inputs/outputs, parser state, and the error taxonomy. The behavior that
//! turns these values into prompts and back into structured messages lives
//! in `llama-chat-engine`.

mod diff;
mod error;
mod format;
mod message;
mod render;

pub use diff::{MessageDiff, ToolCallDelta};
pub use error::{ParseError, RenderError};
pub use format::ChatFormat;
pub use message::{ContentPart, Message, ReasoningFormat, Role, ToolCall, ToolChoice, ToolSpec};
pub use render::{
    ChatParams, GrammarTrigger, ParserState, ParserSyntax, RenderInputs, TriggerKind,
};
