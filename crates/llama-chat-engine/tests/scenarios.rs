//! Cross-module tests: the concrete parser scenarios, monotonicity across
//! split points, and diff-reconstruction. Exercises `dialects::parse` and
//! `diff` together, which a single file's `#[cfg(test)]` module can't do
//! without a dependency cycle.

use llama_chat_engine::diff;
use llama_chat_engine::{ChatFormat, Message, ParserSyntax, ReasoningFormat};

fn syntax(format: ChatFormat) -> ParserSyntax {
    ParserSyntax { format, ..Default::default() }
}

fn syntax_with_reasoning(format: ChatFormat, reasoning_format: ReasoningFormat) -> ParserSyntax {
    ParserSyntax { format, reasoning_format, ..Default::default() }
}

#[test]
fn scenario_1_mistral_nemo_partial_tool_call() {
    let syn = syntax(ChatFormat::MistralNemo);

    let partial = llama_chat_engine::parse(
        "[TOOL_CALLS][{\"name\":\"weather\",\"arguments\":{\"city\":\"Pa",
        &syn,
        true,
    );
    assert_eq!(partial.content, "");
    assert_eq!(partial.tool_calls.len(), 1);
    assert_eq!(partial.tool_calls[0].name, "weather");
    assert_eq!(partial.tool_calls[0].arguments, "{\"city\":\"Pa");

    let full = llama_chat_engine::parse(
        "[TOOL_CALLS][{\"name\":\"weather\",\"arguments\":{\"city\":\"Paris\"}}]",
        &syn,
        false,
    );
    assert_eq!(full.tool_calls[0].arguments, "{\"city\":\"Paris\"}");

    let deltas = diff::compute(&partial, &full).expect("monotonic diff");
    let arg_delta = deltas
        .iter()
        .find(|d| d.tool_call_index == Some(0))
        .and_then(|d| d.tool_call_delta.as_ref())
        .expect("tool call delta present");
    assert_eq!(arg_delta.arguments_delta, "ris\"}");
}

#[test]
fn scenario_2_hermes_2_pro_preamble_then_tool_call() {
    let input = "Sure.\n<tool_call>{\"name\":\"add\",\"arguments\":{\"a\":1,\"b\":2}}</tool_call>";
    let m = llama_chat_engine::parse(input, &syntax(ChatFormat::Hermes2Pro), false);
    assert_eq!(m.content, "Sure.\n");
    assert_eq!(m.tool_calls[0].name, "add");
    assert_eq!(m.tool_calls[0].arguments, "{\"a\":1,\"b\":2}");
}

#[test]
fn scenario_3_glm_4_5_xml_engine() {
    let input = "<tool_call>search\n<arg_key>q</arg_key>\n<arg_value>cats</arg_value>\n</tool_call>";
    let m = llama_chat_engine::parse(input, &syntax(ChatFormat::Glm4_5), false);
    assert_eq!(m.content, "");
    assert_eq!(m.tool_calls[0].name, "search");
    let args: serde_json::Value = serde_json::from_str(&m.tool_calls[0].arguments).unwrap();
    assert_eq!(args["q"], "cats");
}

#[test]
fn scenario_4_deepseek_r1_with_reasoning() {
    let input = "<think>Plan: call lookup.</think>Done.";
    let syn = syntax_with_reasoning(ChatFormat::DeepSeekR1, ReasoningFormat::DeepSeek);
    let m = llama_chat_engine::parse(input, &syn, false);
    assert_eq!(m.reasoning_content, "Plan: call lookup.");
    assert_eq!(m.content, "Done.");
    assert!(m.tool_calls.is_empty());
}

#[test]
fn scenario_5_generic_fallback_response_branch() {
    let m = llama_chat_engine::parse(
        "{\"response\":\"hello\"}",
        &syntax(ChatFormat::Generic),
        false,
    );
    assert_eq!(m.content, "hello");
    assert!(m.tool_calls.is_empty());
}

#[test]
fn scenario_6_command_r7b_thinking_action_response() {
    let input = "<|START_THINKING|>t<|END_THINKING|><|START_ACTION|>[{\"tool_call_id\":\"1\",\"tool_name\":\"x\",\"parameters\":{}}]<|END_ACTION|>";
    let m = llama_chat_engine::parse(input, &syntax(ChatFormat::CommandR7B), false);
    assert_eq!(m.reasoning_content, "t");
    assert_eq!(m.tool_calls[0].name, "x");
    assert_eq!(m.tool_calls[0].arguments, "{}");
    assert_eq!(m.tool_calls[0].id, "1");
}

/// Every split point of the stream produces a prefix of the final parse,
/// for content, reasoning, and each tool call's arguments.
#[test]
fn monotonicity_across_all_split_points_mistral_nemo() {
    let input = "Sure.\n[TOOL_CALLS][{\"name\":\"weather\",\"arguments\":{\"city\":\"Paris\"}}]";
    let syn = syntax(ChatFormat::MistralNemo);
    let full = llama_chat_engine::parse(input, &syn, false);

    for k in 0..input.len() {
        if !input.is_char_boundary(k) {
            continue;
        }
        let partial = llama_chat_engine::parse(&input[..k], &syn, true);
        assert!(
            full.content.starts_with(&partial.content),
            "content at split {k} ({partial:?}) is not a prefix of final ({full:?})"
        );
        assert!(full.reasoning_content.starts_with(&partial.reasoning_content));
        for (i, call) in partial.tool_calls.iter().enumerate() {
            if let Some(final_call) = full.tool_calls.get(i) {
                assert!(
                    final_call.arguments.starts_with(&call.arguments),
                    "tool_calls[{i}].arguments at split {k} is not a prefix of the final value"
                );
            }
        }
    }
}

/// Applying every incremental diff in sequence, starting from an empty
/// assistant message, reconstructs the final parse byte-for-byte.
#[test]
fn diff_reconstruction_hermes_2_pro() {
    let syn = syntax(ChatFormat::Hermes2Pro);
    let input = "Sure.\n<tool_call>{\"name\":\"add\",\"arguments\":{\"a\":1,\"b\":2}}</tool_call>";
    assert_reconstructs_via_diffs(input, &syn);
}

#[test]
fn diff_reconstruction_mistral_nemo() {
    let syn = syntax(ChatFormat::MistralNemo);
    let input = "[TOOL_CALLS][{\"name\":\"weather\",\"arguments\":{\"city\":\"Paris\"}}]";
    assert_reconstructs_via_diffs(input, &syn);
}

#[test]
fn diff_reconstruction_xml_engine_glm_4_5() {
    let syn = syntax(ChatFormat::Glm4_5);
    let input = "<tool_call>search\n<arg_key>q</arg_key>\n<arg_value>cats</arg_value>\n</tool_call>";
    assert_reconstructs_via_diffs(input, &syn);
}

fn assert_reconstructs_via_diffs(input: &str, syn: &ParserSyntax) {
    let mut prev = Message::assistant();
    for k in 1..=input.len() {
        if !input.is_char_boundary(k) {
            continue;
        }
        let is_partial = k != input.len();
        let parsed = llama_chat_engine::parse(&input[..k], syn, is_partial);
        let deltas = diff::compute(&prev, &parsed).expect("monotonic diff");
        apply_diffs(&mut prev, &deltas);
        assert_eq!(prev, parsed, "reconstruction diverged at split {k}");
    }
}

fn apply_diffs(msg: &mut Message, deltas: &[llama_chat_types::MessageDiff]) {
    for d in deltas {
        msg.reasoning_content.push_str(&d.reasoning_content_delta);
        msg.content.push_str(&d.content_delta);
        if let Some(idx) = d.tool_call_index {
            if let Some(delta) = &d.tool_call_delta {
                if idx == msg.tool_calls.len() {
                    msg.tool_calls.push(llama_chat_types::ToolCall::default());
                }
                let call = &mut msg.tool_calls[idx];
                if let Some(name) = &delta.name {
                    call.name = name.clone();
                }
                if let Some(id) = &delta.id {
                    call.id = id.clone();
                }
                call.arguments.push_str(&delta.arguments_delta);
            }
        }
    }
}
