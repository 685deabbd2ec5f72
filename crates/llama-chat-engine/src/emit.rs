//! OpenAI-compatible emit shapes (§6): a finished [`Message`] as a
//! non-streaming `choices[].message` object, and a [`MessageDiff`] as a
//! streaming `choices[].delta` object.

use llama_chat_types::{Message, MessageDiff};
use serde_json::{json, Value};

pub fn message_to_json(message: &Message) -> Value {
    let mut obj = serde_json::Map::new();
    obj.insert("role".into(), Value::String("assistant".into()));
    if message.content.is_empty() && message.tool_calls.is_empty() {
        obj.insert("content".into(), Value::Null);
    } else if !message.content.is_empty() {
        obj.insert("content".into(), Value::String(message.content.clone()));
    } else {
        obj.insert("content".into(), Value::Null);
    }
    if !message.reasoning_content.is_empty() {
        obj.insert("reasoning_content".into(), Value::String(message.reasoning_content.clone()));
    }
    if !message.tool_calls.is_empty() {
        let calls: Vec<Value> = message
            .tool_calls
            .iter()
            .map(|c| {
                json!({
                    "type": "function",
                    "id": c.id,
                    "function": { "name": c.name, "arguments": c.arguments },
                })
            })
            .collect();
        obj.insert("tool_calls".into(), Value::Array(calls));
    }
    Value::Object(obj)
}

/// Render one `MessageDiff` as a `choices[].delta` fragment.
pub fn diff_to_delta_json(diff: &MessageDiff) -> Value {
    let mut obj = serde_json::Map::new();
    if !diff.content_delta.is_empty() {
        obj.insert("content".into(), Value::String(diff.content_delta.clone()));
    }
    if !diff.reasoning_content_delta.is_empty() {
        obj.insert("reasoning_content".into(), Value::String(diff.reasoning_content_delta.clone()));
    }
    if let (Some(index), Some(call)) = (diff.tool_call_index, diff.tool_call_delta.as_ref()) {
        let mut function = serde_json::Map::new();
        if let Some(name) = &call.name {
            function.insert("name".into(), Value::String(name.clone()));
        }
        function.insert("arguments".into(), Value::String(call.arguments_delta.clone()));
        let mut entry = serde_json::Map::new();
        entry.insert("index".into(), Value::from(index));
        if let Some(id) = &call.id {
            entry.insert("id".into(), Value::String(id.clone()));
            entry.insert("type".into(), Value::String("function".into()));
        }
        entry.insert("function".into(), Value::Object(function));
        obj.insert("tool_calls".into(), Value::Array(vec![Value::Object(entry)]));
    }
    Value::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use llama_chat_types::{ToolCall, ToolCallDelta};

    #[test]
    fn plain_content_message_emits_string_content() {
        let m = Message { content: "hi".into(), ..Message::assistant() };
        let v = message_to_json(&m);
        assert_eq!(v["content"], "hi");
        assert!(v.get("tool_calls").is_none());
    }

    #[test]
    fn tool_call_message_emits_function_shape() {
        let m = Message {
            tool_calls: vec![ToolCall { name: "f".into(), arguments: "{}".into(), id: "1".into() }],
            ..Message::assistant()
        };
        let v = message_to_json(&m);
        assert_eq!(v["content"], Value::Null);
        assert_eq!(v["tool_calls"][0]["function"]["name"], "f");
        assert_eq!(v["tool_calls"][0]["id"], "1");
    }

    #[test]
    fn tool_call_delta_carries_index_and_arguments() {
        let diff = MessageDiff {
            tool_call_index: Some(2),
            tool_call_delta: Some(ToolCallDelta { name: None, id: None, arguments_delta: "ab".into() }),
            ..Default::default()
        };
        let v = diff_to_delta_json(&diff);
        assert_eq!(v["tool_calls"][0]["index"], 2);
        assert_eq!(v["tool_calls"][0]["function"]["arguments"], "ab");
        assert!(v["tool_calls"][0].get("id").is_none());
    }
}
