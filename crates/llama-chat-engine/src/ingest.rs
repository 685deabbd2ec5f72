//! OpenAI-compatible JSON ingest for messages and tools (§6). Upstream
//! callers hand this crate raw `serde_json::Value` request bodies; this
//! module is where malformed shapes turn into [`RenderError::Ingest`]
//! before anything downstream has to worry about them.

use llama_chat_types::{ContentPart, Message, RenderError, ToolCall, ToolSpec};
use serde_json::Value;

/// Ingest the `messages` array of an OpenAI-compatible request body.
pub fn ingest_messages(raw: &Value) -> Result<Vec<Message>, RenderError> {
    let items = raw
        .as_array()
        .ok_or_else(|| RenderError::Ingest("messages must be an array".into()))?;
    items.iter().map(ingest_message).collect()
}

fn ingest_message(raw: &Value) -> Result<Message, RenderError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| RenderError::Ingest("each message must be an object".into()))?;

    let role = obj
        .get("role")
        .and_then(Value::as_str)
        .ok_or_else(|| RenderError::Ingest("message missing required field 'role'".into()))?
        .to_string();

    let (content, content_parts) = ingest_content(obj.get("content"))?;
    let tool_calls = match obj.get("tool_calls") {
        Some(Value::Array(items)) => items.iter().map(ingest_tool_call).collect::<Result<Vec<_>, _>>()?,
        Some(Value::Null) | None => Vec::new(),
        Some(_) => return Err(RenderError::Ingest("tool_calls must be an array".into())),
    };

    let reasoning_content = obj.get("reasoning_content").and_then(Value::as_str).unwrap_or_default().to_string();
    let tool_name = obj.get("name").and_then(Value::as_str).map(str::to_string);
    let tool_call_id = obj.get("tool_call_id").and_then(Value::as_str).map(str::to_string);

    Ok(Message { role, content, content_parts, tool_calls, reasoning_content, tool_name, tool_call_id })
}

/// `content` is either a string, `null`, or an array of `{type:"text",
/// text}` parts. Any other shape (or an unknown `ContentPart.type`) is a
/// hard ingest error. At most one of the two return slots is non-empty.
fn ingest_content(raw: Option<&Value>) -> Result<(String, Vec<ContentPart>), RenderError> {
    match raw {
        None | Some(Value::Null) => Ok((String::new(), Vec::new())),
        Some(Value::String(s)) => Ok((s.clone(), Vec::new())),
        Some(Value::Array(items)) => {
            let parts = items.iter().map(ingest_content_part).collect::<Result<Vec<_>, _>>()?;
            Ok((String::new(), parts))
        }
        Some(_) => Err(RenderError::Ingest("unsupported content shape".into())),
    }
}

fn ingest_content_part(raw: &Value) -> Result<ContentPart, RenderError> {
    let ty = raw.get("type").and_then(Value::as_str).unwrap_or_default();
    if ty != "text" {
        return Err(RenderError::Ingest(format!("unsupported content part type {ty:?}")));
    }
    let text = raw
        .get("text")
        .and_then(Value::as_str)
        .ok_or_else(|| RenderError::Ingest("text content part missing 'text'".into()))?
        .to_string();
    Ok(ContentPart::Text { text })
}

/// `{type:"function", function:{name, arguments}, id?}`. `arguments` may
/// arrive as a string or a JSON object; it is always normalized to a
/// string on the way in, matching the invariant every parser output also
/// honors.
fn ingest_tool_call(raw: &Value) -> Result<ToolCall, RenderError> {
    let function = raw
        .get("function")
        .ok_or_else(|| RenderError::Ingest("tool call missing 'function'".into()))?;
    let name = function
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| RenderError::Ingest("tool call function missing 'name'".into()))?
        .to_string();
    let arguments = match function.get("arguments") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => serde_json::to_string(other).unwrap_or_default(),
        None => String::new(),
    };
    let id = raw.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
    Ok(ToolCall { name, arguments, id })
}

/// Ingest the `tools` array: `[{type:"function", function:{name,
/// description, parameters}}]`.
pub fn ingest_tools(raw: &Value) -> Result<Vec<ToolSpec>, RenderError> {
    let items = raw.as_array().ok_or_else(|| RenderError::Ingest("tools must be an array".into()))?;
    items.iter().map(ingest_tool).collect()
}

fn ingest_tool(raw: &Value) -> Result<ToolSpec, RenderError> {
    let function = raw
        .get("function")
        .ok_or_else(|| RenderError::Ingest("tool missing 'function'".into()))?;
    let name = function
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| RenderError::Ingest("tool function missing 'name'".into()))?
        .to_string();
    let description = function.get("description").and_then(Value::as_str).unwrap_or_default().to_string();
    let parameters = function
        .get("parameters")
        .map(|p| serde_json::to_string(p).unwrap_or_default())
        .unwrap_or_else(|| "{}".to_string());
    Ok(ToolSpec { name, description, parameters })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ingests_plain_string_content() {
        let msgs = ingest_messages(&json!([{"role": "user", "content": "hi"}])).unwrap();
        assert_eq!(msgs[0].content, "hi");
        assert!(msgs[0].content_parts.is_empty());
    }

    #[test]
    fn ingests_content_parts_array() {
        let msgs = ingest_messages(&json!([
            {"role": "user", "content": [{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]}
        ]))
        .unwrap();
        assert_eq!(msgs[0].content_parts.len(), 2);
        assert_eq!(msgs[0].visible_text(), "ab");
    }

    #[test]
    fn rejects_unsupported_content_part_type() {
        let err = ingest_messages(&json!([{"role": "user", "content": [{"type": "image", "url": "x"}]}])).unwrap_err();
        assert!(matches!(err, RenderError::Ingest(_)));
    }

    #[test]
    fn normalizes_object_arguments_to_string() {
        let msgs = ingest_messages(&json!([
            {"role": "assistant", "tool_calls": [{"type": "function", "function": {"name": "f", "arguments": {"x": 1}}, "id": "1"}]}
        ]))
        .unwrap();
        assert_eq!(msgs[0].tool_calls[0].arguments, "{\"x\":1}");
    }

    #[test]
    fn ingests_tool_spec() {
        let tools = ingest_tools(&json!([
            {"type": "function", "function": {"name": "weather", "description": "d", "parameters": {"type": "object"}}}
        ]))
        .unwrap();
        assert_eq!(tools[0].name, "weather");
        assert_eq!(tools[0].parameters, "{\"type\":\"object\"}");
    }

    #[test]
    fn rejects_non_array_messages() {
        assert!(ingest_messages(&json!({"role": "user"})).is_err());
    }
}
