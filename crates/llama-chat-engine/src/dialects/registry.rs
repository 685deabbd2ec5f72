//! The dialect registry: picks one [`ChatFormat`] from a raw Jinja
//! template source by testing an ordered waterfall of string-containment
//! rules, first match wins. Mirrors the single dispatch function that
//! drives real dialect selection in the upstream template-applier.

use llama_chat_types::ChatFormat;

/// Inputs the waterfall consults beyond the template source itself.
pub struct SelectionContext<'a> {
    pub template_source: &'a str,
    pub tools_present: bool,
    pub json_schema_present: bool,
    pub tool_choice_is_none: bool,
}

/// Run the registry waterfall. `ctx.template_source` should be
/// `ChatTemplates::waterfall_source()` — the tool-use template when one
/// is registered, else the default.
pub fn select_format(ctx: &SelectionContext) -> ChatFormat {
    let s = ctx.template_source;
    let has = |needle: &str| s.contains(needle);

    if ctx.json_schema_present && has("\"prefix\" is defined") && has("thinking") {
        return ChatFormat::DeepSeekV3_1;
    }
    if has("<｜tool▁calls▁begin｜>") && !ctx.json_schema_present {
        return ChatFormat::DeepSeekR1;
    }
    if has("<|END_THINKING|><|START_ACTION|>") && !ctx.json_schema_present {
        return ChatFormat::CommandR7B;
    }
    if has("thinking") && has("<|tool_call|>") {
        return ChatFormat::Granite;
    }
    if has("[gMASK]<sop>") && has("<arg_key>") && has("<arg_value>") && !ctx.json_schema_present {
        return ChatFormat::Glm4_5;
    }
    if has("<tool_call>") && has("<function>") && has("<function=") && has("<parameters>") && has("<parameter=") {
        return ChatFormat::Qwen3CoderXml;
    }
    if has("<tools>") && has("# Tools") && has("</tools>") && has("<tool_calls>") && has("</tool_calls>") && has("<tool_response>") {
        return ChatFormat::XiaomiMimo;
    }
    if has("<tool_call>") && !ctx.json_schema_present {
        return ChatFormat::Hermes2Pro;
    }
    if has("<|channel|>") {
        return ChatFormat::GptOss;
    }
    if has("<seed:think>") {
        return ChatFormat::SeedOss;
    }
    if has("<SPECIAL_10>") {
        return ChatFormat::NemotronV2;
    }
    if has("<|system_start|>") && has("<|tools_prefix|>") {
        return ChatFormat::Apertus;
    }
    if has("List of tools: <|tool_list_start|>[") && has("]<|tool_list_end|>") {
        return ChatFormat::Lfm2WithJsonTools;
    }
    if has("]~!b[") && has("]~b]") {
        return ChatFormat::MinimaxM2;
    }
    if has("<|im_system|>tool_declare<|im_middle|>") && has("<|tool_calls_section_begin|>") && has("## Return of") {
        return ChatFormat::KimiK2;
    }
    if has("<thinking>")
        && has("</thinking>")
        && has("<available_tools>")
        && has("<|assistant|>")
        && has("<|tool_result|>")
        && has("<tool_calls>[")
        && has("]</tool_calls>")
    {
        return ChatFormat::Apriel1_5;
    }
    if ctx.tools_present && ctx.json_schema_present {
        return ChatFormat::Generic;
    }
    if has(">>>all") {
        return ChatFormat::FunctionaryV3_2;
    }
    if has(" functools[") {
        return ChatFormat::FireFunctionV2;
    }
    if has("<|start_header_id|>") && has("<function=") {
        return ChatFormat::FunctionaryV3_1Llama3_1;
    }
    if has("<|start_header_id|>ipython<|end_header_id|>") {
        return if has("<|python_tag|>") { ChatFormat::Llama3XWithBuiltinTools } else { ChatFormat::Llama3X };
    }
    if has("[SYSTEM_PROMPT]") && has("[TOOL_CALLS]") && has("[ARGS]") {
        // Ministral-3 renders through the Generic path; see DESIGN.md.
        return ChatFormat::Generic;
    }
    if has("[THINK]") && has("[/THINK]") {
        return ChatFormat::Magistral;
    }
    if !ctx.tools_present || ctx.tool_choice_is_none {
        return ChatFormat::ContentOnly;
    }
    if has("[TOOL_CALLS]") {
        return ChatFormat::MistralNemo;
    }
    ChatFormat::Generic
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(source: &str) -> SelectionContext<'_> {
        SelectionContext { template_source: source, tools_present: true, json_schema_present: false, tool_choice_is_none: false }
    }

    #[test]
    fn picks_deepseek_r1_on_signature() {
        assert_eq!(select_format(&ctx("... <｜tool▁calls▁begin｜> ...")), ChatFormat::DeepSeekR1);
    }

    #[test]
    fn qwen3_coder_xml_beats_hermes_on_shared_tool_call_tag() {
        let src = "<tool_call><function><function=<parameters><parameter=";
        assert_eq!(select_format(&ctx(src)), ChatFormat::Qwen3CoderXml);
    }

    #[test]
    fn bare_tool_call_tag_falls_back_to_hermes() {
        assert_eq!(select_format(&ctx("uses <tool_call> tags")), ChatFormat::Hermes2Pro);
    }

    #[test]
    fn no_tools_present_is_content_only() {
        let mut c = ctx("whatever");
        c.tools_present = false;
        assert_eq!(select_format(&c), ChatFormat::ContentOnly);
    }

    #[test]
    fn mistral_nemo_signature_wins_over_bare_generic() {
        assert_eq!(select_format(&ctx("emits [TOOL_CALLS] blocks")), ChatFormat::MistralNemo);
    }

    #[test]
    fn tools_and_schema_without_other_signature_is_generic() {
        let mut c = ctx("plain chatml template");
        c.json_schema_present = true;
        assert_eq!(select_format(&c), ChatFormat::Generic);
    }

    #[test]
    fn minimax_signature_detected() {
        assert_eq!(select_format(&ctx("]~!b[ ... ]~b]")), ChatFormat::MinimaxM2);
    }

    #[test]
    fn glm_4_5_signature_detected() {
        assert_eq!(select_format(&ctx("[gMASK]<sop> <arg_key> <arg_value>")), ChatFormat::Glm4_5);
    }
}
