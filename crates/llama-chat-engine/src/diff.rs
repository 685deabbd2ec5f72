//! Computes the sequence of [`MessageDiff`]s between two successive parses
//! of the same (monotonically growing) model output.

use llama_chat_types::{Message, MessageDiff, ParseError, ToolCallDelta};

/// `prev`/`new` are two parses of a growing prefix of the same stream;
/// `new` must extend `prev` (see the ordering guarantee in this crate's
/// concurrency model). Returns one `MessageDiff` per changed field,
/// skipping anything unchanged — callers that stream SSE-style deltas emit
/// one event per entry.
pub fn compute(prev: &Message, new: &Message) -> Result<Vec<MessageDiff>, ParseError> {
    let mut diffs = Vec::new();

    let reasoning_delta = suffix_delta(&prev.reasoning_content, &new.reasoning_content)?;
    if !reasoning_delta.is_empty() {
        diffs.push(MessageDiff { reasoning_content_delta: reasoning_delta, ..Default::default() });
    }

    let content_delta = suffix_delta(&prev.content, &new.content)?;
    if !content_delta.is_empty() {
        diffs.push(MessageDiff { content_delta, ..Default::default() });
    }

    if let Some(last_shared) = shared_tool_call_diff(prev, new)? {
        diffs.push(last_shared);
    }

    for idx in prev.tool_calls.len()..new.tool_calls.len() {
        diffs.push(MessageDiff {
            tool_call_index: Some(idx),
            tool_call_delta: Some(ToolCallDelta::full(&new.tool_calls[idx])),
            ..Default::default()
        });
    }

    Ok(diffs)
}

/// The suffix of `new` after `prev`, or an empty delta if `new` is a strict
/// prefix of `prev` (a stop-word erased text that had already been
/// streamed). Any other divergence is a monotonicity violation.
fn suffix_delta(prev: &str, new: &str) -> Result<String, ParseError> {
    if new.len() >= prev.len() {
        if new.starts_with(prev) {
            return Ok(new[prev.len()..].to_string());
        }
    } else if prev.starts_with(new) {
        return Ok(String::new());
    }
    Err(ParseError::Fatal("non-monotonic diff: new does not extend prev".into()))
}

fn shared_tool_call_diff(prev: &Message, new: &Message) -> Result<Option<MessageDiff>, ParseError> {
    let shared_len = prev.tool_calls.len().min(new.tool_calls.len());
    if shared_len == 0 {
        return Ok(None);
    }
    let idx = shared_len - 1;
    let prev_call = &prev.tool_calls[idx];
    let new_call = &new.tool_calls[idx];

    let arguments_delta = suffix_delta(&prev_call.arguments, &new_call.arguments)?;
    let id_changed = prev_call.id != new_call.id && !new_call.id.is_empty();
    let name_changed = prev_call.name != new_call.name;

    if arguments_delta.is_empty() && !id_changed && !name_changed {
        return Ok(None);
    }

    Ok(Some(MessageDiff {
        tool_call_index: Some(idx),
        tool_call_delta: Some(ToolCallDelta {
            name: if id_changed || name_changed { Some(new_call.name.clone()) } else { None },
            id: if id_changed { Some(new_call.id.clone()) } else { None },
            arguments_delta,
        }),
        ..Default::default()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use llama_chat_types::{Message, ToolCall};

    fn msg(content: &str, reasoning: &str, tool_calls: Vec<ToolCall>) -> Message {
        Message { content: content.into(), reasoning_content: reasoning.into(), tool_calls, ..Message::assistant() }
    }

    #[test]
    fn content_growth_emits_suffix() {
        let prev = msg("Hel", "", vec![]);
        let new = msg("Hello", "", vec![]);
        let diffs = compute(&prev, &new).unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].content_delta, "lo");
    }

    #[test]
    fn shrinking_content_emits_empty_delta() {
        let prev = msg("Hello there", "", vec![]);
        let new = msg("Hello", "", vec![]);
        let diffs = compute(&prev, &new).unwrap();
        assert!(diffs.is_empty());
    }

    #[test]
    fn divergent_content_is_fatal() {
        let prev = msg("Hello", "", vec![]);
        let new = msg("Goodbye", "", vec![]);
        assert!(compute(&prev, &new).is_err());
    }

    #[test]
    fn new_tool_call_emits_full_delta() {
        let prev = msg("", "", vec![]);
        let call = ToolCall { name: "f".into(), arguments: "{}".into(), id: "1".into() };
        let new = msg("", "", vec![call.clone()]);
        let diffs = compute(&prev, &new).unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].tool_call_index, Some(0));
        assert_eq!(diffs[0].tool_call_delta.as_ref().unwrap().name.as_deref(), Some("f"));
        assert_eq!(diffs[0].tool_call_delta.as_ref().unwrap().arguments_delta, "{}");
    }

    #[test]
    fn shared_tool_call_emits_argument_suffix_only() {
        let prev_call = ToolCall { name: "f".into(), arguments: "{\"a\":1".into(), id: "1".into() };
        let new_call = ToolCall { name: "f".into(), arguments: "{\"a\":1}".into(), id: "1".into() };
        let prev = msg("", "", vec![prev_call]);
        let new = msg("", "", vec![new_call]);
        let diffs = compute(&prev, &new).unwrap();
        assert_eq!(diffs.len(), 1);
        let delta = diffs[0].tool_call_delta.as_ref().unwrap();
        assert_eq!(delta.arguments_delta, "}");
        assert!(delta.name.is_none());
        assert!(delta.id.is_none());
    }

    #[test]
    fn late_id_assignment_is_reported() {
        let prev_call = ToolCall { name: "f".into(), arguments: "{}".into(), id: String::new() };
        let new_call = ToolCall { name: "f".into(), arguments: "{}".into(), id: "call_1".into() };
        let prev = msg("", "", vec![prev_call]);
        let new = msg("", "", vec![new_call]);
        let diffs = compute(&prev, &new).unwrap();
        assert_eq!(diffs.len(), 1);
        let delta = diffs[0].tool_call_delta.as_ref().unwrap();
        assert_eq!(delta.id.as_deref(), Some("call_1"));
        assert_eq!(delta.name.as_deref(), Some("f"));
    }

    #[test]
    fn no_changes_produces_no_diffs() {
        let m = msg("same", "same", vec![ToolCall { name: "f".into(), arguments: "{}".into(), id: "1".into() }]);
        let diffs = compute(&m, &m).unwrap();
        assert!(diffs.is_empty());
    }
}
