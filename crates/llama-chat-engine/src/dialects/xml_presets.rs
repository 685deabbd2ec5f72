//! Per-dialect [`XmlToolCallFormat`] presets for the seven dialects built
//! on the shared XML-tool-call engine. Delimiters are transcribed from
//! each model family's own chat template; see the module-level comment on
//! each constructor for the one concrete input it was checked against.

use crate::xml_tool_call::XmlToolCallFormat;

pub fn minimax_m2() -> XmlToolCallFormat {
    XmlToolCallFormat {
        scope_start: "<minimax:tool_call>\n".into(),
        tool_start: "<invoke name=\"".into(),
        tool_sep: "\">\n".into(),
        key_start: "<parameter name=\"".into(),
        key_val_sep: "\">".into(),
        val_end: "</parameter>\n".into(),
        tool_end: "</invoke>\n".into(),
        scope_end: "</minimax:tool_call>".into(),
        ..Default::default()
    }
}

pub fn qwen3_coder_xml() -> XmlToolCallFormat {
    XmlToolCallFormat {
        scope_start: "<tool_call>\n".into(),
        tool_start: "<function=".into(),
        tool_sep: ">\n".into(),
        key_start: "<parameter=".into(),
        key_val_sep: ">\n".into(),
        val_end: "\n</parameter>\n".into(),
        tool_end: "</function>\n".into(),
        scope_end: "</tool_call>".into(),
        ..Default::default()
    }
}

/// Tool name arrives as `functions.<name>:<index>` and is stripped back
/// down to `<name>` (`strip_functions_prefix`); argument values are
/// JSON-only (`raw_argval = Some(false)`). The last key/value pair in an
/// object carries no trailing `", "` before the closing `}` — modeled as
/// `last_val_end = Some("")`, the engine's zero-width-terminator marker.
pub fn kimi_k2() -> XmlToolCallFormat {
    XmlToolCallFormat {
        scope_start: "<|tool_calls_section_begin|>".into(),
        tool_start: "<|tool_call_begin|>".into(),
        tool_sep: "<|tool_call_argument_begin|>{".into(),
        key_start: "\"".into(),
        key_val_sep: "\": ".into(),
        val_end: ", ".into(),
        last_val_end: Some(String::new()),
        tool_end: "}<|tool_call_end|>".into(),
        scope_end: "<|tool_calls_section_end|>".into(),
        raw_argval: Some(false),
        strip_functions_prefix: true,
        ..Default::default()
    }
}

/// Tool calls are elements of a top-level JSON array; the final element
/// in the array closes with `}` (`last_tool_end`) rather than `}, `
/// (`tool_end`), and its final key/value pair likewise has no trailing
/// separator (`last_val_end = Some("")`).
pub fn apriel_1_5() -> XmlToolCallFormat {
    XmlToolCallFormat {
        scope_start: "<tool_calls>[".into(),
        tool_start: "{\"name\": \"".into(),
        tool_sep: "\", \"arguments\": {".into(),
        key_start: "\"".into(),
        key_val_sep: "\": ".into(),
        val_end: ", ".into(),
        last_val_end: Some(String::new()),
        tool_end: "}, ".into(),
        last_tool_end: Some("}".into()),
        scope_end: "]</tool_calls>".into(),
        raw_argval: Some(false),
        ..Default::default()
    }
}

pub fn xiaomi_mimo() -> XmlToolCallFormat {
    XmlToolCallFormat {
        scope_start: "\n".into(),
        tool_start: "<tool_call>\n{\"name\": \"".into(),
        tool_sep: "\", \"arguments\": {".into(),
        key_start: "\"".into(),
        key_val_sep: "\": ".into(),
        val_end: ", ".into(),
        last_val_end: Some(String::new()),
        tool_end: "}\n</tool_call>".into(),
        ..Default::default()
    }
}

/// `key_val_sep`/`key_val_sep2` split the template's combined
/// `</arg_key>\n<arg_value>` marker into the key's real terminator
/// (`</arg_key>`, required non-empty by the engine) followed by the
/// value-open literal consumed right after it — same bytes consumed
/// either way. `tool_start` drops the template's leading `\n` and
/// `last_tool_end` omits the trailing one, matching a lone tool call with
/// nothing before or after it in the raw stream.
pub fn glm_4_5() -> XmlToolCallFormat {
    XmlToolCallFormat {
        tool_start: "<tool_call>".into(),
        tool_sep: "\n".into(),
        key_start: "<arg_key>".into(),
        key_val_sep: "</arg_key>".into(),
        key_val_sep2: Some("\n<arg_value>".into()),
        val_end: "</arg_value>\n".into(),
        tool_end: "</tool_call>\n".into(),
        last_tool_end: Some("</tool_call>".into()),
        ..Default::default()
    }
}

/// Seed-OSS's grammar is built per-tool directly (see
/// `dialects::render::build_seed_oss_grammar`), but parsing still runs
/// through the shared state machine with this equivalent format.
pub fn seed_oss() -> XmlToolCallFormat {
    XmlToolCallFormat {
        tool_start: "<seed:tool_call><function=".into(),
        tool_sep: ">".into(),
        key_start: "<parameter=".into(),
        key_val_sep: ">".into(),
        val_end: "</parameter>".into(),
        tool_end: "</function></seed:tool_call>".into(),
        ..Default::default()
    }
}
