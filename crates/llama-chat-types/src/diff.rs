use serde::{Deserialize, Serialize};

use crate::message::ToolCall;

/// A piece of a `ToolCall` that changed between two successive parses.
/// `name`/`id` are only set when they actually changed (the last shared
/// tool-call index may pick up its `id` late, once the dialect finally
/// emits one).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub arguments_delta: String,
}

/// One ordered delta between two successive parses of the same growing
/// input. `tool_call_index` is `None` unless this delta touches a tool
/// call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDiff {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reasoning_content_delta: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_delta: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_delta: Option<ToolCallDelta>,
}

impl ToolCallDelta {
    pub fn full(call: &ToolCall) -> Self {
        Self {
            name: Some(call.name.clone()),
            id: if call.id.is_empty() { None } else { Some(call.id.clone()) },
            arguments_delta: call.arguments.clone(),
        }
    }
}
