use serde::{Deserialize, Serialize};

/// A single tool invocation the model asked for.
///
/// `arguments` is always a JSON document when non-empty — possibly a
/// truncated one while a partial parse is in flight — never a bare string
/// the caller has to re-parse twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: String,
    #[serde(default)]
    pub id: String,
}

/// Future-proofing tag: today only `"text"` content parts are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
}

/// A chat message, either supplied by the caller (ingest) or produced by a
/// dialect parser (emit). Parsers always set `role = "assistant"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content_parts: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reasoning_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn assistant() -> Self {
        Self {
            role: Role::ASSISTANT.to_string(),
            ..Default::default()
        }
    }

    /// Visible text, whichever of `content` / `content_parts` carries it.
    /// Ingest code must reject a message where both are non-empty before
    /// constructing one; this just renders whichever is present.
    pub fn visible_text(&self) -> String {
        if !self.content.is_empty() {
            return self.content.clone();
        }
        self.content_parts
            .iter()
            .map(|p| match p {
                ContentPart::Text { text } => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Free-form role constants. `role` on `Message` stays a plain `String` —
/// ingest accepts any value — these are just the ones the crate itself
/// ever writes.
pub struct Role;
impl Role {
    pub const ASSISTANT: &'static str = "assistant";
    pub const SYSTEM: &'static str = "system";
    pub const USER: &'static str = "user";
    pub const TOOL: &'static str = "tool";
}

/// A tool the model may call, as described to the template/grammar layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema, serialized (the renderer hands this to
    /// `schema_to_grammar` and to the template engine verbatim).
    pub parameters: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ToolChoice {
    #[default]
    Auto,
    Required,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReasoningFormat {
    #[default]
    None,
    Auto,
    DeepSeek,
    DeepSeekLegacy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visible_text_prefers_content() {
        let m = Message {
            content: "hi".into(),
            content_parts: vec![ContentPart::Text { text: "unused".into() }],
            ..Default::default()
        };
        assert_eq!(m.visible_text(), "hi");
    }

    #[test]
    fn visible_text_joins_parts_when_content_empty() {
        let m = Message {
            content_parts: vec![
                ContentPart::Text { text: "a".into() },
                ContentPart::Text { text: "b".into() },
            ],
            ..Default::default()
        };
        assert_eq!(m.visible_text(), "ab");
    }

    #[test]
    fn tool_call_equality_is_field_wise() {
        let a = ToolCall { name: "f".into(), arguments: "{}".into(), id: "1".into() };
        let b = ToolCall { name: "f".into(), arguments: "{}".into(), id: "1".into() };
        let c = ToolCall { name: "f".into(), arguments: "{}".into(), id: "2".into() };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
