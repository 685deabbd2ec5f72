use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::format::ChatFormat;
use crate::message::{Message, ReasoningFormat, ToolChoice, ToolSpec};

/// Everything a renderer needs to pick a dialect and produce a prompt.
#[derive(Debug, Clone)]
pub struct RenderInputs {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
    /// Schema-free grammar string supplied directly by the caller, if any.
    pub grammar: Option<String>,
    /// JSON schema (as a string) constraining the final response.
    pub json_schema: Option<String>,
    pub tool_choice: ToolChoice,
    pub parallel_tool_calls: bool,
    pub reasoning_format: ReasoningFormat,
    pub enable_thinking: bool,
    /// Unix timestamp; templates that inject "today's date" read this
    /// instead of calling the system clock, so rendering stays pure.
    pub now: i64,
    pub chat_template_kwargs: HashMap<String, Value>,
    pub add_bos: bool,
    pub add_eos: bool,
    pub add_generation_prompt: bool,
    /// Force a specific dialect instead of running the registry waterfall
    /// (`ChatFormat::PegSimple` & friends are only reachable this way).
    pub force_format: Option<ChatFormat>,
}

impl Default for RenderInputs {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            tools: Vec::new(),
            grammar: None,
            json_schema: None,
            tool_choice: ToolChoice::Auto,
            parallel_tool_calls: true,
            reasoning_format: ReasoningFormat::None,
            enable_thinking: true,
            now: 0,
            chat_template_kwargs: HashMap::new(),
            add_bos: true,
            add_eos: false,
            add_generation_prompt: true,
            force_format: None,
        }
    }
}

/// How a grammar trigger is matched against the running token stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerKind {
    Word,
    Pattern,
    PatternStart,
    PatternFull,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarTrigger {
    pub kind: TriggerKind,
    pub pattern: String,
}

impl GrammarTrigger {
    pub fn word(pattern: impl Into<String>) -> Self {
        Self { kind: TriggerKind::Word, pattern: pattern.into() }
    }
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self { kind: TriggerKind::Pattern, pattern: pattern.into() }
    }
    pub fn pattern_start(pattern: impl Into<String>) -> Self {
        Self { kind: TriggerKind::PatternStart, pattern: pattern.into() }
    }
    pub fn pattern_full(pattern: impl Into<String>) -> Self {
        Self { kind: TriggerKind::PatternFull, pattern: pattern.into() }
    }
}

/// What a renderer hands back: the prompt plus everything the runtime needs
/// to constrain and stop generation correctly.
#[derive(Debug, Clone, Default)]
pub struct ChatParams {
    pub format: Option<ChatFormat>,
    pub prompt: String,
    pub grammar: String,
    pub grammar_lazy: bool,
    pub thinking_forced_open: bool,
    pub grammar_triggers: Vec<GrammarTrigger>,
    pub preserved_tokens: Vec<String>,
    pub additional_stops: Vec<String>,
    /// Serialized PEG arena, present only for PEG-backed dialects.
    pub parser: Option<String>,
}

impl ChatParams {
    pub fn new(format: ChatFormat, prompt: String) -> Self {
        Self { format: Some(format), prompt, ..Default::default() }
    }
}

/// Per-parse cursor state. Never persisted across calls — a fresh one is
/// built from the raw text on every `parse()` invocation.
#[derive(Debug, Clone)]
pub struct ParserState {
    pub input: String,
    pub pos: usize,
    pub is_partial: bool,
    pub result: Message,
    pub healing_marker: String,
    pub syntax: ParserSyntax,
}

/// Static configuration describing how to drive a parse for one dialect.
#[derive(Debug, Clone)]
pub struct ParserSyntax {
    pub format: ChatFormat,
    pub reasoning_format: ReasoningFormat,
    pub reasoning_in_content: bool,
    pub thinking_forced_open: bool,
    pub parse_tool_calls: bool,
    /// Serialized PEG arena for PEG-backed dialects, rehydrated from the
    /// renderer's `ChatParams.parser`.
    pub parser: Option<String>,
}

impl Default for ParserSyntax {
    fn default() -> Self {
        Self {
            format: ChatFormat::ContentOnly,
            reasoning_format: ReasoningFormat::None,
            reasoning_in_content: false,
            thinking_forced_open: false,
            parse_tool_calls: true,
            parser: None,
        }
    }
}
