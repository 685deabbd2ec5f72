//! Dialect-aware chat-template rendering and tool-call parsing: given a
//! raw Jinja chat template plus messages/tools/tool-choice, picks a
//! model-family dialect, renders a prompt and an optional GBNF grammar
//! (`render`), and parses a model's raw text output back into a
//! structured [`Message`] (`parse`), streaming-safe throughout.
//!
//! `llama-chat-types` carries the pure value types this crate operates
//! on and returns; everything with behavior lives here.

pub mod dialects;
pub mod diff;
pub mod emit;
pub mod ingest;
pub mod parser;
pub mod partial_json;
pub mod peg;
pub mod reasoning;
pub mod regex_partial;
pub mod schema;
pub mod template;
pub mod xml_tool_call;

pub use dialects::render::render;
pub use dialects::parse::parse;
pub use emit::{diff_to_delta_json, message_to_json};
pub use ingest::{ingest_messages, ingest_tools};
pub use schema::{JsonSchemaToGbnf, SchemaToGrammar};
pub use template::{apply, ChatTemplateEngine, ChatTemplates, MinijinjaEngine};

pub use llama_chat_types::{
    ChatFormat, ChatParams, ContentPart, GrammarTrigger, Message, MessageDiff, ParseError, ParserState,
    ParserSyntax, ReasoningFormat, RenderError, RenderInputs, Role, ToolCall, ToolCallDelta, ToolChoice, ToolSpec,
    TriggerKind,
};
