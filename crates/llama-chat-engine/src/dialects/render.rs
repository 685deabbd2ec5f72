//! Per-dialect prompt + grammar construction: the render half of the
//! crate, mirroring `common_chat_params_init_*` in `cpp/common/chat.cpp`
//! one function per dialect family, feeding a single shared GBNF-literal
//! helper and the JSON-schema/XML-tool-call/PEG grammar engines built
//! elsewhere in this crate.

use llama_chat_types::{
    ChatFormat, ChatParams, GrammarTrigger, Message, RenderError, RenderInputs, ToolChoice, ToolSpec,
};
use serde_json::{json, Value};

use crate::dialects::registry::{select_format, SelectionContext};
use crate::dialects::xml_presets;
use crate::peg::{build_grammar as build_peg_grammar, PegBuilder};
use crate::schema::SchemaToGrammar;
use crate::template::{apply, ChatTemplateEngine, ChatTemplates};
use crate::xml_tool_call::{build_grammar_xml_tool_call, grammar_trigger_literal, XmlToolCallFormat};

/// Render a prompt and its accompanying grammar/constraints for `inputs`,
/// picking a dialect via `inputs.force_format` or the registry waterfall.
pub fn render(
    inputs: &RenderInputs,
    templates: &ChatTemplates,
    engine: &dyn ChatTemplateEngine,
    schema_to_grammar: &dyn SchemaToGrammar,
) -> Result<ChatParams, RenderError> {
    if inputs.grammar.is_some() && !inputs.tools.is_empty() {
        return Err(RenderError::GrammarWithTools);
    }

    let ctx = SelectionContext {
        template_source: templates.waterfall_source(),
        tools_present: !inputs.tools.is_empty(),
        json_schema_present: inputs.json_schema.is_some(),
        tool_choice_is_none: inputs.tool_choice == ToolChoice::None,
    };
    let format = inputs.force_format.unwrap_or_else(|| select_format(&ctx));
    log::debug!("dialect selection resolved to {}", format.label());

    let messages_json = messages_to_template_json(&inputs.messages);
    let tools_json = tools_to_template_json(&inputs.tools);
    let prompt = apply(
        engine,
        templates,
        &messages_json,
        &tools_json,
        inputs.add_generation_prompt,
        inputs.enable_thinking,
        inputs.now,
        &inputs.chat_template_kwargs,
        !inputs.tools.is_empty(),
    )?;

    let mut params = ChatParams::new(format, prompt);

    if let Some(grammar) = &inputs.grammar {
        params.grammar = grammar.clone();
        return Ok(params);
    }

    if inputs.tools.is_empty() {
        if let Some(schema) = &inputs.json_schema {
            let schema: Value = serde_json::from_str(schema).map_err(|e| RenderError::Schema(e.to_string()))?;
            params.grammar = format!("root ::= {}\n", schema_to_grammar.to_grammar(&schema, "root"));
        }
        return Ok(params);
    }

    build_tool_call_params(&mut params, format, &inputs.tools, schema_to_grammar);
    Ok(params)
}

/// `messages` as the Jinja context expects them: `role`, `content`,
/// `tool_calls` (OpenAI `{type,function:{name,arguments},id}` shape),
/// `tool_call_id`, `name` (the teacher's templates read `message.name` for
/// tool-role turns, not `tool_name`).
fn messages_to_template_json(messages: &[Message]) -> Value {
    Value::Array(
        messages
            .iter()
            .map(|m| {
                let mut obj = serde_json::Map::new();
                obj.insert("role".into(), Value::String(m.role.clone()));
                obj.insert("content".into(), Value::String(m.visible_text()));
                if !m.tool_calls.is_empty() {
                    let calls: Vec<Value> = m
                        .tool_calls
                        .iter()
                        .map(|c| {
                            let args: Value = serde_json::from_str(&c.arguments).unwrap_or(Value::Null);
                            json!({
                                "type": "function",
                                "id": c.id,
                                "function": { "name": c.name, "arguments": args },
                            })
                        })
                        .collect();
                    obj.insert("tool_calls".into(), Value::Array(calls));
                }
                if let Some(id) = &m.tool_call_id {
                    obj.insert("tool_call_id".into(), Value::String(id.clone()));
                }
                if let Some(name) = &m.tool_name {
                    obj.insert("name".into(), Value::String(name.clone()));
                }
                Value::Object(obj)
            })
            .collect(),
    )
}

/// `tools` as the Jinja context and `schema_to_grammar` both expect them:
/// `{type:"function", function:{name, description, parameters}}`.
fn tools_to_template_json(tools: &[ToolSpec]) -> Value {
    Value::Array(
        tools
            .iter()
            .map(|t| {
                let parameters: Value = serde_json::from_str(&t.parameters).unwrap_or(json!({"type": "object"}));
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": parameters,
                    }
                })
            })
            .collect(),
    )
}

/// Escape `s` as a GBNF string literal (same rule as the xml-tool-call
/// engine's private `gbnf_literal`, duplicated here since that one isn't
/// exported across the module boundary).
fn lit(s: &str) -> String {
    let mut out = String::from("\"");
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn tool_args_schema(tool: &ToolSpec) -> Value {
    serde_json::from_str(&tool.parameters).unwrap_or_else(|_| json!({"type": "object"}))
}

/// `{"<name_field>":"<tool.name>","<args_field>":<args-grammar>}` — the
/// shape Hermes-2-Pro, Mistral-Nemo, Generic, Command-R7B, FireFunction-v2
/// and Llama-3.x all nest the call in, just with different field names.
fn name_and_args_object_rule(
    tool: &ToolSpec,
    schema_to_grammar: &dyn SchemaToGrammar,
    name_field: &str,
    args_field: &str,
) -> (String, String) {
    let schema = tool_args_schema(tool);
    let args_grammar = schema_to_grammar.to_grammar(&schema, &format!("{}-args", tool.name));
    let rule_name = format!("call-{}", tool.name);
    let prefix = format!("{{\"{name_field}\":\"{}\",\"{args_field}\":", tool.name);
    (rule_name.clone(), format!("{rule_name} ::= {} {args_grammar} {}", lit(&prefix), lit("}")))
}

/// Just the argument grammar, for dialects that carry the tool name in a
/// surrounding literal instead of inside the JSON body (Functionary,
/// GPT-OSS, Llama-3.x builtin-tool form).
fn args_only_rule(tool: &ToolSpec, schema_to_grammar: &dyn SchemaToGrammar) -> (String, String) {
    let schema = tool_args_schema(tool);
    let args_grammar = schema_to_grammar.to_grammar(&schema, &format!("{}-args", tool.name));
    let rule_name = format!("args-{}", tool.name);
    (rule_name.clone(), format!("{rule_name} ::= {args_grammar}"))
}

/// A bare one-of-tools short-form object, `{"<tool name>": {...args}}` —
/// what `parse_generic_whole_response` expects from the dialects this
/// crate has no grounded wire format for (see DESIGN.md).
fn short_form_grammar(tools: &[ToolSpec], schema_to_grammar: &dyn SchemaToGrammar) -> String {
    let mut rules = Vec::new();
    let mut alts = Vec::new();
    for tool in tools {
        let schema = tool_args_schema(tool);
        let args_grammar = schema_to_grammar.to_grammar(&schema, &format!("{}-args", tool.name));
        let rule_name = format!("call-{}", tool.name);
        rules.push(format!("{rule_name} ::= {} {args_grammar} {}", lit(&format!("{{\"{}\":", tool.name)), lit("}")));
        alts.push(rule_name);
    }
    let mut out = format!("root ::= {}\n", alts.join(" | "));
    for r in rules {
        out.push_str(&r);
        out.push('\n');
    }
    out
}

fn set_lazy_trigger(params: &mut ChatParams, grammar: String, trigger_literal: &str) {
    params.grammar = grammar;
    params.grammar_lazy = true;
    params.grammar_triggers = vec![GrammarTrigger::word(trigger_literal)];
}

fn build_tool_call_params(
    params: &mut ChatParams,
    format: ChatFormat,
    tools: &[ToolSpec],
    schema_to_grammar: &dyn SchemaToGrammar,
) {
    match format {
        ChatFormat::MinimaxM2
        | ChatFormat::Qwen3CoderXml
        | ChatFormat::KimiK2
        | ChatFormat::Apriel1_5
        | ChatFormat::XiaomiMimo
        | ChatFormat::Glm4_5
        | ChatFormat::SeedOss => build_xml_engine_params(params, format, tools, schema_to_grammar),

        ChatFormat::MistralNemo => {
            let (rules, alt) = name_and_args_alternatives(tools, schema_to_grammar, "name", "arguments");
            let grammar = wrap_array(&alt, rules, ", ");
            set_lazy_trigger(params, grammar, "[TOOL_CALLS]");
        }

        ChatFormat::FireFunctionV2 => {
            let (rules, alt) = name_and_args_alternatives(tools, schema_to_grammar, "name", "arguments");
            let grammar = wrap_array(&alt, rules, ", ");
            set_lazy_trigger(params, grammar, " functools[");
        }

        ChatFormat::Hermes2Pro => {
            let (rules, alt) = name_and_args_alternatives(tools, schema_to_grammar, "name", "arguments");
            let grammar = wrap_repeated(&alt, rules, "<tool_call>\n", "\n</tool_call>");
            set_lazy_trigger(params, grammar, "<tool_call>");
        }

        ChatFormat::Generic => {
            let (rules, alt) = name_and_args_alternatives(tools, schema_to_grammar, "name", "arguments");
            let grammar = wrap_root(&alt, rules);
            params.grammar = grammar;
        }

        ChatFormat::CommandR7B => {
            let (rules, alt) = name_and_args_alternatives(tools, schema_to_grammar, "tool_name", "parameters");
            let grammar = wrap_array_prefixed(&alt, rules, "<|START_ACTION|>", "<|END_ACTION|>", ", ");
            set_lazy_trigger(params, grammar, "<|START_ACTION|>");
        }

        ChatFormat::GptOss => {
            let mut rules = Vec::new();
            let mut alts = Vec::new();
            for tool in tools {
                let (args_name, args_def) = args_only_rule(tool, schema_to_grammar);
                rules.push(args_def);
                let call_name = format!("call-{}", tool.name);
                rules.push(format!(
                    "{call_name} ::= {} {} {args_name}",
                    lit(&format!("to=functions.{}", tool.name)),
                    lit("<|message|>"),
                ));
                alts.push(call_name);
            }
            let grammar = wrap_repeated_alts(&alts, rules);
            set_lazy_trigger(params, grammar, "to=functions.");
        }

        ChatFormat::DeepSeekR1 | ChatFormat::DeepSeekV3_1 => {
            let mut rules = Vec::new();
            let mut alts = Vec::new();
            for tool in tools {
                let (args_name, args_def) = args_only_rule(tool, schema_to_grammar);
                rules.push(args_def);
                let call_name = format!("call-{}", tool.name);
                rules.push(format!(
                    "{call_name} ::= {} {} {} {args_name} {}",
                    lit("<｜tool▁call▁begin｜>function<｜tool▁sep｜>"),
                    lit(&tool.name),
                    lit("\n```json\n"),
                    lit("\n```<｜tool▁call▁end｜>"),
                ));
                alts.push(call_name);
            }
            let once = "tool-call-once";
            rules.push(format!("{once} ::= {}", alts.join(" | ")));
            let grammar = format!(
                "root ::= {} {once}+ {}\n{}",
                lit("<｜tool▁calls▁begin｜>"),
                lit("<｜tool▁calls▁end｜>"),
                rules.join("\n"),
            );
            set_lazy_trigger(params, grammar, "<｜tool▁calls▁begin｜>");
        }

        ChatFormat::FunctionaryV3_2 => {
            let mut rules = Vec::new();
            let mut alts = Vec::new();
            for tool in tools {
                let (args_name, args_def) = args_only_rule(tool, schema_to_grammar);
                rules.push(args_def);
                let call_name = format!("call-{}", tool.name);
                rules.push(format!("{call_name} ::= {} {args_name}", lit(&format!(">>>{}\n", tool.name))));
                alts.push(call_name);
            }
            let grammar = wrap_repeated_alts(&alts, rules);
            set_lazy_trigger(params, grammar, ">>>");
        }

        ChatFormat::FunctionaryV3_1Llama3_1 => {
            let mut rules = Vec::new();
            let mut alts = Vec::new();
            for tool in tools {
                let (args_name, args_def) = args_only_rule(tool, schema_to_grammar);
                rules.push(args_def);
                let call_name = format!("call-{}", tool.name);
                rules.push(format!(
                    "{call_name} ::= {} {args_name} {}",
                    lit(&format!("<function={}>", tool.name)),
                    lit("</function>"),
                ));
                alts.push(call_name);
            }
            let grammar = wrap_repeated_alts(&alts, rules);
            set_lazy_trigger(params, grammar, "<function=");
        }

        ChatFormat::Llama3X => {
            let (rules, alt) = name_and_args_alternatives(tools, schema_to_grammar, "name", "parameters");
            params.grammar = wrap_root(&alt, rules);
        }

        ChatFormat::Llama3XWithBuiltinTools => {
            let (rules, alt) = name_and_args_alternatives(tools, schema_to_grammar, "name", "parameters");
            let mut grammar = wrap_root(&alt, rules);
            if let Some(first) = tools.first() {
                let schema = tool_args_schema(first);
                let empty = serde_json::Map::new();
                if let Some((key, prop)) = schema.get("properties").and_then(Value::as_object).unwrap_or(&empty).iter().next() {
                    let value_grammar = schema_to_grammar.to_grammar(prop, &format!("{}-builtin-arg", first.name));
                    grammar.push_str(&format!(
                        "root-builtin ::= {} {} {} {} {}\n",
                        lit("<|python_tag|>"),
                        lit(&first.name),
                        lit(&format!(".call({key}=")),
                        value_grammar,
                        lit(")"),
                    ));
                    grammar = grammar.replacen("root ::=", "root ::= root-builtin | ", 1);
                }
            }
            params.grammar = grammar;
        }

        ChatFormat::Magistral => {
            let (rules, alt) = name_and_args_alternatives(tools, schema_to_grammar, "name", "arguments");
            let grammar = wrap_array(&alt, rules, ", ");
            set_lazy_trigger(params, grammar, "[TOOL_CALLS]");
        }

        // Granite, Apertus, LFM2 (JSON tools), Nemotron-v2: no grounded
        // wire format recovered from `examples/original_source` (see
        // DESIGN.md); constrained to the same bare short-form object the
        // parser falls back to for these dialects.
        ChatFormat::Granite | ChatFormat::Apertus | ChatFormat::Lfm2WithJsonTools | ChatFormat::NemotronV2 => {
            params.grammar = short_form_grammar(tools, schema_to_grammar);
        }

        ChatFormat::PegSimple | ChatFormat::PegNative | ChatFormat::PegConstructed => {
            build_generic_peg_arena(params, tools, schema_to_grammar);
        }

        ChatFormat::ContentOnly => {}
    }
}

fn name_and_args_alternatives(
    tools: &[ToolSpec],
    schema_to_grammar: &dyn SchemaToGrammar,
    name_field: &str,
    args_field: &str,
) -> (Vec<String>, String) {
    let mut rules = Vec::new();
    let mut alts = Vec::new();
    for tool in tools {
        let (rule_name, def) = name_and_args_object_rule(tool, schema_to_grammar, name_field, args_field);
        rules.push(def);
        alts.push(rule_name);
    }
    let alt_name = "tool-call-alt".to_string();
    rules.push(format!("{alt_name} ::= {}", alts.join(" | ")));
    (rules, alt_name)
}

fn wrap_root(alt: &str, rules: Vec<String>) -> String {
    let mut out = format!("root ::= {alt}\n");
    for r in rules {
        out.push_str(&r);
        out.push('\n');
    }
    out
}

fn wrap_array(alt: &str, rules: Vec<String>, sep: &str) -> String {
    let mut out = format!("root ::= \"[\" {alt} ( {} {alt} )* \"]\"\n", lit(sep));
    for r in rules {
        out.push_str(&r);
        out.push('\n');
    }
    out
}

fn wrap_array_prefixed(alt: &str, rules: Vec<String>, prefix: &str, suffix: &str, sep: &str) -> String {
    let mut out = format!(
        "root ::= {} \"[\" {alt} ( {} {alt} )* \"]\" {}\n",
        lit(prefix),
        lit(sep),
        lit(suffix),
    );
    for r in rules {
        out.push_str(&r);
        out.push('\n');
    }
    out
}

fn wrap_repeated(alt: &str, rules: Vec<String>, open_each: &str, close_each: &str) -> String {
    let mut out = format!("root ::= ( {} {alt} {} )+\n", lit(open_each), lit(close_each));
    for r in rules {
        out.push_str(&r);
        out.push('\n');
    }
    out
}

fn wrap_repeated_alts(alts: &[String], rules: Vec<String>) -> String {
    let mut out = format!("root ::= ( {} )+\n", alts.join(" | "));
    for r in rules {
        out.push_str(&r);
        out.push('\n');
    }
    out
}

fn build_xml_engine_params(
    params: &mut ChatParams,
    format: ChatFormat,
    tools: &[ToolSpec],
    schema_to_grammar: &dyn SchemaToGrammar,
) {
    let xml_format = xml_format_for(format);
    if format == ChatFormat::MinimaxM2 || format == ChatFormat::Glm4_5 {
        params.preserved_tokens = vec!["<think>".into(), "</think>".into()];
    }
    if format == ChatFormat::SeedOss {
        params.grammar = build_seed_oss_grammar(tools, schema_to_grammar);
    } else {
        params.grammar = build_grammar_xml_tool_call(&xml_format, tools, schema_to_grammar);
    }
    params.grammar_lazy = true;
    params.grammar_triggers = vec![GrammarTrigger::word(grammar_trigger_literal(&xml_format))];
}

fn xml_format_for(format: ChatFormat) -> XmlToolCallFormat {
    match format {
        ChatFormat::MinimaxM2 => xml_presets::minimax_m2(),
        ChatFormat::Qwen3CoderXml => xml_presets::qwen3_coder_xml(),
        ChatFormat::KimiK2 => xml_presets::kimi_k2(),
        ChatFormat::Apriel1_5 => xml_presets::apriel_1_5(),
        ChatFormat::XiaomiMimo => xml_presets::xiaomi_mimo(),
        ChatFormat::Glm4_5 => xml_presets::glm_4_5(),
        ChatFormat::SeedOss => xml_presets::seed_oss(),
        other => unreachable!("{other:?} is not an xml-engine dialect"),
    }
}

/// Seed-OSS builds its grammar per-tool directly rather than through the
/// generic chained-arguments builder (see SPEC_FULL.md §4.6): one
/// alternative per registered function, each a flat sequence of its own
/// required parameters in schema order.
fn build_seed_oss_grammar(tools: &[ToolSpec], schema_to_grammar: &dyn SchemaToGrammar) -> String {
    let mut rules = Vec::new();
    let mut alts = Vec::new();
    for tool in tools {
        let schema = tool_args_schema(tool);
        let empty = serde_json::Map::new();
        let properties = schema.get("properties").and_then(Value::as_object).unwrap_or(&empty);
        let mut seq = vec![lit(&format!("<seed:tool_call><function={}>", tool.name))];
        for (key, prop) in properties {
            let value_grammar = schema_to_grammar.to_grammar(prop, &format!("{}-arg-{key}", tool.name));
            seq.push(format!("{} {value_grammar} {}", lit(&format!("<parameter={key}>")), lit("</parameter>")));
        }
        seq.push(lit("</function></seed:tool_call>"));
        let rule_name = format!("call-{}", tool.name);
        rules.push(format!("{rule_name} ::= {}", seq.join(" ")));
        alts.push(rule_name);
    }
    let mut out = format!("root ::= {}\n", alts.join(" | "));
    for r in rules {
        out.push_str(&r);
        out.push('\n');
    }
    out
}

/// Generic PEG-backed grammar for the opt-in `PegSimple`/`PegNative`/
/// `PegConstructed` formats: plain text up to a `<tool_call>` sentinel,
/// then a `{"name":...,"arguments":{...}}` object tagged for
/// `dialects::parse::parse_peg` to read back.
fn build_generic_peg_arena(params: &mut ChatParams, tools: &[ToolSpec], schema_to_grammar: &dyn SchemaToGrammar) {
    let mut b = PegBuilder::new();
    let sentinel = b.literal("<tool_call>\n");
    let content = b.until("<tool_call>\n");
    let content_tag = b.tag("content", &content);

    let mut call_alts = Vec::new();
    for tool in tools {
        let schema = tool_args_schema(tool);
        let open = b.literal(&format!("{{\"name\": \"{}\", \"arguments\": ", tool.name));
        let json_value = b.json();
        let args_schema_rule = b.schema(&json_value, &format!("{}-args", tool.name), schema.clone(), false);
        let args_tag = b.tag("tool_args", &args_schema_rule);
        let close = b.literal("}");
        let name_lit = b.literal(&tool.name);
        let name_tag = b.tag("tool_name", &name_lit);
        let call = b.sequence(vec![open.id(), name_tag.id(), args_tag.id(), close.id()]);
        call_alts.push(call.id());
    }
    let call_choice = if call_alts.is_empty() { b.literal("") } else { b.choice(call_alts) };
    let close_tag = b.literal("\n</tool_call>");
    let call_seq = b.sequence(vec![sentinel.id(), call_choice.id(), close_tag.id()]);
    let call_opt = b.optional(&call_seq);
    let root = b.sequence(vec![content_tag.id(), call_opt.id()]);
    b.set_root(&root);
    let arena = b.build();

    params.grammar = build_peg_grammar(&arena, schema_to_grammar, true);
    params.parser = Some(serde_json::to_string(&arena).unwrap_or_default());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::JsonSchemaToGbnf;
    use crate::template::MinijinjaEngine;
    use llama_chat_types::{Role, ToolChoice};

    fn weather_tool() -> ToolSpec {
        ToolSpec {
            name: "get_weather".into(),
            description: "fetch weather".into(),
            parameters: json!({"type": "object", "properties": {"city": {"type": "string"}}, "required": ["city"]})
                .to_string(),
        }
    }

    fn templates(source: &str) -> ChatTemplates {
        ChatTemplates::new(source.to_string(), None, true, true, false, "<s>".into(), "</s>".into())
    }

    #[test]
    fn content_only_renders_with_no_grammar() {
        let inputs = RenderInputs {
            messages: vec![Message { role: Role::USER.into(), content: "hi".into(), ..Default::default() }],
            ..Default::default()
        };
        let t = templates("{%- for m in messages %}{{ m.role }}:{{ m.content }}\n{%- endfor %}");
        let params = render(&inputs, &t, &MinijinjaEngine, &JsonSchemaToGbnf).unwrap();
        assert_eq!(params.format, Some(ChatFormat::ContentOnly));
        assert!(params.grammar.is_empty());
        assert!(params.prompt.contains("user:hi"));
    }

    #[test]
    fn mistral_nemo_produces_lazy_array_grammar() {
        let inputs = RenderInputs {
            messages: vec![Message { role: Role::USER.into(), content: "weather?".into(), ..Default::default() }],
            tools: vec![weather_tool()],
            tool_choice: ToolChoice::Auto,
            ..Default::default()
        };
        let t = templates("{%- for m in messages %}{{ m.content }}{%- endfor %}[TOOL_CALLS]");
        let params = render(&inputs, &t, &MinijinjaEngine, &JsonSchemaToGbnf).unwrap();
        assert_eq!(params.format, Some(ChatFormat::MistralNemo));
        assert!(params.grammar_lazy);
        assert!(params.grammar.contains("get_weather"));
        assert_eq!(params.grammar_triggers[0].pattern, "[TOOL_CALLS]");
    }

    #[test]
    fn hermes_2_pro_wraps_each_call_in_tool_call_tags() {
        let inputs = RenderInputs {
            messages: vec![Message { role: Role::USER.into(), content: "weather?".into(), ..Default::default() }],
            tools: vec![weather_tool()],
            ..Default::default()
        };
        let t = templates("uses <tool_call> tags for {{ messages[0].content }}");
        let params = render(&inputs, &t, &MinijinjaEngine, &JsonSchemaToGbnf).unwrap();
        assert_eq!(params.format, Some(ChatFormat::Hermes2Pro));
        assert!(params.grammar.contains("<tool_call>"));
    }

    #[test]
    fn minimax_m2_routes_through_xml_engine() {
        let inputs = RenderInputs {
            messages: vec![Message { role: Role::USER.into(), content: "hi".into(), ..Default::default() }],
            tools: vec![weather_tool()],
            ..Default::default()
        };
        let t = templates("]~!b[ ]~b] {{ messages[0].content }}");
        let params = render(&inputs, &t, &MinijinjaEngine, &JsonSchemaToGbnf).unwrap();
        assert_eq!(params.format, Some(ChatFormat::MinimaxM2));
        assert!(params.grammar.contains("<invoke name=\\\"get_weather\\\""));
        assert!(params.preserved_tokens.contains(&"<think>".to_string()));
    }

    #[test]
    fn llama_3_x_parameters_field_in_grammar() {
        let inputs = RenderInputs {
            messages: vec![Message { role: Role::USER.into(), content: "hi".into(), ..Default::default() }],
            tools: vec![weather_tool()],
            ..Default::default()
        };
        let t = templates("<|start_header_id|>ipython<|end_header_id|>{{ messages[0].content }}");
        let params = render(&inputs, &t, &MinijinjaEngine, &JsonSchemaToGbnf).unwrap();
        assert_eq!(params.format, Some(ChatFormat::Llama3X));
        assert!(params.grammar.contains("\\\"parameters\\\":"));
        assert!(!params.grammar_lazy);
    }

    #[test]
    fn grammar_and_tools_together_is_an_error() {
        let inputs = RenderInputs {
            tools: vec![weather_tool()],
            grammar: Some("root ::= \"x\"".into()),
            ..Default::default()
        };
        let t = templates("plain");
        let err = render(&inputs, &t, &MinijinjaEngine, &JsonSchemaToGbnf).unwrap_err();
        assert!(matches!(err, RenderError::GrammarWithTools));
    }

    #[test]
    fn peg_simple_is_opt_in_via_force_format() {
        let inputs = RenderInputs {
            messages: vec![Message { role: Role::USER.into(), content: "hi".into(), ..Default::default() }],
            tools: vec![weather_tool()],
            force_format: Some(ChatFormat::PegSimple),
            ..Default::default()
        };
        let t = templates("{{ messages[0].content }}");
        let params = render(&inputs, &t, &MinijinjaEngine, &JsonSchemaToGbnf).unwrap();
        assert_eq!(params.format, Some(ChatFormat::PegSimple));
        assert!(params.parser.is_some());
    }
}
