//! Shared engine for the family of dialects whose tool calls look like:
//!
//! ```text
//! SCOPE_START (TOOL_START NAME TOOL_SEP
//!                (KEY_START key KEY_VAL_SEP (KEY_VAL_SEP2)? value VAL_END)*
//!              TOOL_END)+ SCOPE_END
//! ```
//!
//! Every delimiter is configurable via [`XmlToolCallFormat`]; dialects only
//! differ in which literals they plug in (see `dialects::render`/`dialects::parse`
//! for the per-dialect presets).

use std::collections::BTreeMap;

use llama_chat_types::{ParseError, ToolSpec};
use serde_json::Value;

use crate::parser::{dump_value_trimmed, Parser};
use crate::schema::SchemaToGrammar;

#[derive(Debug, Clone)]
pub struct XmlToolCallFormat {
    pub scope_start: String,
    pub scope_end: String,
    pub tool_start: String,
    pub tool_sep: String,
    pub tool_end: String,
    pub last_tool_end: Option<String>,
    pub key_start: String,
    pub key_val_sep: String,
    pub key_val_sep2: Option<String>,
    pub val_end: String,
    pub last_val_end: Option<String>,
    /// `Some(true)` = plain-text values only, `Some(false)` = JSON-only,
    /// `None` = try JSON first, fall back to raw text.
    pub raw_argval: Option<bool>,
    pub trim_raw_argval: bool,
    pub allow_toolcall_in_think: bool,
    /// Kimi-K2 emits `functions.<name>:<index>` as the tool name; when set,
    /// that wrapper is stripped before the name is recorded.
    pub strip_functions_prefix: bool,
}

impl Default for XmlToolCallFormat {
    fn default() -> Self {
        Self {
            scope_start: String::new(),
            scope_end: String::new(),
            tool_start: String::new(),
            tool_sep: String::new(),
            tool_end: String::new(),
            last_tool_end: None,
            key_start: String::new(),
            key_val_sep: String::new(),
            key_val_sep2: None,
            val_end: String::new(),
            last_val_end: None,
            raw_argval: None,
            trim_raw_argval: false,
            allow_toolcall_in_think: false,
            strip_functions_prefix: false,
        }
    }
}

fn find_nearest(haystack: &str, terms: &[&str]) -> Option<(usize, usize)> {
    terms
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.is_empty())
        .filter_map(|(term_idx, t)| haystack.find(t.as_ref()).map(|byte_idx| (byte_idx, term_idx)))
        .min_by_key(|&(byte_idx, term_idx)| (byte_idx, term_idx))
}

fn strip_kimi_k2_name(name: &str) -> String {
    if let Some(rest) = name.strip_prefix("functions.") {
        if let Some(colon) = rest.rfind(':') {
            if rest[colon + 1..].chars().all(|c| c.is_ascii_digit()) && !rest[colon + 1..].is_empty() {
                return rest[..colon].to_string();
            }
        }
    }
    name.to_string()
}

/// Parse one or more XML-shaped tool calls at the cursor. Returns `Ok(true)`
/// if at least one tool call was recorded, `Ok(false)` if nothing matched
/// (cursor is restored), `Err` on unrecoverable syntax — including, per the
/// monotonicity contract, any failure once a tool call has already been
/// pushed onto `parser.result` during this attempt.
pub fn try_consume_xml_tool_calls(parser: &mut Parser, format: &XmlToolCallFormat) -> Result<bool, ParseError> {
    let start_pos = parser.pos();
    let mut shipped_any = false;

    macro_rules! bail {
        ($msg:expr) => {{
            if shipped_any {
                return Err(ParseError::Fatal($msg.to_string()));
            }
            parser.set_pos(start_pos);
            return Ok(false);
        }};
    }

    if !format.scope_start.is_empty() {
        parser.consume_spaces();
        match parser.try_consume_literal(&format.scope_start) {
            Ok(true) => {}
            Ok(false) => bail!("expected scope_start"),
            Err(e) => return Err(e),
        }
    }

    loop {
        let before_tool_start = parser.pos();
        let prelude = match parser.try_find_literal(&format.tool_start) {
            Ok(Some(p)) => p,
            Ok(None) => {
                if shipped_any {
                    break;
                }
                bail!("tool_start not found");
            }
            Err(ParseError::Partial) => return Err(ParseError::Partial),
            Err(e) => return Err(e),
        };
        if !prelude.trim().is_empty() {
            if shipped_any {
                return Err(ParseError::Fatal("content between xml tool calls".into()));
            }
            parser.set_pos(before_tool_start);
            return Ok(false);
        }

        let name_terms: Vec<&str> = if !format.tool_sep.is_empty() {
            vec![format.tool_sep.as_str()]
        } else {
            vec![format.key_start.as_str()]
        };
        let mut all_terms = name_terms.clone();
        all_terms.push(format.tool_end.as_str());
        if let Some(lte) = &format.last_tool_end {
            all_terms.push(lte.as_str());
        }

        let haystack = parser.remaining();
        let Some((idx, term_idx)) = find_nearest(haystack, &all_terms) else {
            if parser.is_partial() {
                return Err(ParseError::Partial);
            }
            bail!("unterminated tool name");
        };
        let raw_name = haystack[..idx].to_string();
        let name = strip_name(format, &raw_name);

        if term_idx >= name_terms.len() {
            // Matched TOOL_END/last_tool_end directly: a tool with no args.
            let matched = all_terms[term_idx];
            parser.set_pos(parser.pos() + idx + matched.len());
            parser.add_tool_call(&name, "", "{}");
            shipped_any = true;
            continue;
        }

        let matched = all_terms[term_idx];
        parser.set_pos(parser.pos() + idx + matched.len());

        let mut args: BTreeMap<String, Value> = BTreeMap::new();
        loop {
            let end_terms = [format.tool_end.as_str(), format.last_tool_end.as_deref().unwrap_or("")];
            let rem = parser.remaining();
            if let Some((idx, term_idx)) = find_nearest(rem, &end_terms) {
                if idx == 0 {
                    let matched_len = end_terms[term_idx].len();
                    parser.set_pos(parser.pos() + matched_len);
                    break;
                }
            }

            if !format.key_start.is_empty() {
                match parser.try_consume_literal(&format.key_start) {
                    Ok(true) => {}
                    Ok(false) => bail!("expected key_start"),
                    Err(ParseError::Partial) => return emit_partial(parser, &name, &args),
                    Err(e) => return Err(e),
                }
            }

            let key_terms = [format.key_val_sep.as_str()];
            let rem = parser.remaining();
            let Some((key_idx, _)) = find_nearest(rem, &key_terms) else {
                if parser.is_partial() {
                    return emit_partial(parser, &name, &args);
                }
                bail!("unterminated key");
            };
            let key = rem[..key_idx].to_string();
            parser.set_pos(parser.pos() + key_idx + format.key_val_sep.len());
            if let Some(sep2) = &format.key_val_sep2 {
                if !parser.try_consume_literal(sep2)? {
                    if parser.is_partial() {
                        return emit_partial(parser, &name, &args);
                    }
                    bail!("expected key_val_sep2");
                }
            }

            let value = read_value(parser, format, &name, &args, &key)?;
            match match_value_terminator(format, parser.remaining()) {
                Some(consumed) => parser.set_pos(parser.pos() + consumed),
                None => {
                    if parser.is_partial() {
                        args.insert(key, value);
                        return emit_partial(parser, &name, &args);
                    }
                    bail!("expected val_end");
                }
            }
            args.insert(key, value);
        }

        let args_json = serde_json::to_string(&Value::Object(args.into_iter().collect())).unwrap_or_default();
        parser.add_tool_call(&name, "", &args_json);
        shipped_any = true;
    }

    if !format.scope_end.is_empty() {
        let _ = parser.try_consume_literal(&format.scope_end);
    }
    Ok(shipped_any)
}

/// Where a value ends: either `val_end`/`last_val_end` textually, or,
/// when `last_val_end` is the explicit empty string, the zero-width
/// boundary right before `tool_end`/`last_tool_end` (the dialects whose
/// final key/value pair in an object carries no trailing separator —
/// Kimi-K2, Apriel-1.5, Xiaomi-Mimo). Returns the number of bytes the
/// matched terminator itself occupies (0 for the zero-width case).
fn match_value_terminator(format: &XmlToolCallFormat, rem: &str) -> Option<usize> {
    if !format.val_end.is_empty() && rem.starts_with(format.val_end.as_str()) {
        return Some(format.val_end.len());
    }
    if let Some(lve) = &format.last_val_end {
        if !lve.is_empty() && rem.starts_with(lve.as_str()) {
            return Some(lve.len());
        }
        if lve.is_empty()
            && (rem.starts_with(format.tool_end.as_str())
                || format.last_tool_end.as_deref().is_some_and(|t| !t.is_empty() && rem.starts_with(t)))
        {
            return Some(0);
        }
    }
    None
}

fn strip_name(format: &XmlToolCallFormat, raw: &str) -> String {
    let trimmed = raw.trim().to_string();
    if format.strip_functions_prefix {
        strip_kimi_k2_name(&trimmed)
    } else {
        trimmed
    }
}

fn read_value(
    parser: &mut Parser,
    format: &XmlToolCallFormat,
    name: &str,
    args_so_far: &BTreeMap<String, Value>,
    key: &str,
) -> Result<Value, ParseError> {
    // A truncated value is shipped as the raw text read so far rather than a
    // placeholder, so the emitted `arguments` stays a literal prefix of
    // whatever the complete call eventually dumps to (the same property
    // `parser::dump_value_trimmed` preserves for the JSON-engine dialects).
    let partial_raw = |parser: &mut Parser| {
        let fragment = open_string_fragment(parser.remaining());
        emit_partial_err(parser, name, args_so_far, Some((key, &fragment)))
    };

    if format.raw_argval == Some(true) {
        return match read_raw_value(parser, format) {
            Ok(s) => Ok(Value::String(s)),
            Err(ParseError::Partial) => Err(partial_raw(parser)),
            Err(e) => Err(e),
        };
    }

    let saved = parser.pos();
    match parser.try_consume_json() {
        Ok(Some(parsed)) => {
            let followed_by_end = match_value_terminator(format, parser.remaining()).is_some();
            if followed_by_end && parsed.healing_marker.is_none() {
                return Ok(parsed.value);
            }
            if parsed.healing_marker.is_some() {
                let fragment = dump_value_trimmed(&parsed.value, parsed.healing_marker.as_ref());
                return Err(emit_partial_err(parser, name, args_so_far, Some((key, &fragment))));
            }
            parser.set_pos(saved);
        }
        Ok(None) => {}
        Err(ParseError::Partial) if parser.is_partial() => return Err(partial_raw(parser)),
        Err(_) => {}
    }

    if format.raw_argval == Some(false) {
        return Err(partial_raw(parser));
    }

    match read_raw_value(parser, format) {
        Ok(s) => Ok(Value::String(s)),
        Err(ParseError::Partial) => Err(partial_raw(parser)),
        Err(e) => Err(e),
    }
}

/// A JSON string fragment opened but not closed: `"` followed by the
/// escaped text read so far, with no terminating quote. Concatenating the
/// eventual rest of the value and a closing quote reproduces the complete
/// dump, so this is always a literal prefix of it.
fn open_string_fragment(raw: &str) -> String {
    let mut out = String::from("\"");
    for c in raw.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn read_raw_value(parser: &mut Parser, format: &XmlToolCallFormat) -> Result<String, ParseError> {
    let mut end_terms: Vec<&str> = vec![format.val_end.as_str()];
    if let Some(lve) = &format.last_val_end {
        if !lve.is_empty() {
            end_terms.push(lve.as_str());
        } else {
            end_terms.push(format.tool_end.as_str());
            if let Some(lte) = &format.last_tool_end {
                end_terms.push(lte.as_str());
            }
        }
    }
    let rem = parser.remaining();
    let Some((idx, _)) = find_nearest(rem, &end_terms) else {
        if parser.is_partial() {
            return Err(ParseError::Partial);
        }
        return Err(ParseError::Fatal("expected val_end".into()));
    };
    let raw = rem[..idx].to_string();
    parser.set_pos(parser.pos() + idx);
    Ok(if format.trim_raw_argval { raw.trim().to_string() } else { raw })
}

fn emit_partial(parser: &mut Parser, name: &str, args: &BTreeMap<String, Value>) -> Result<bool, ParseError> {
    Err(emit_partial_err(parser, name, args, None))
}

/// Dumps `args` (plus, if present, one more key whose value is still
/// in-flight) as an *open* JSON object fragment — no closing `}` — so that
/// every successive partial emission for the same call is a literal prefix
/// of the next, all the way to the final closed dump.
fn emit_partial_err(
    parser: &mut Parser,
    name: &str,
    args: &BTreeMap<String, Value>,
    in_progress: Option<(&str, &str)>,
) -> ParseError {
    let mut out = String::from("{");
    let mut first = true;
    for (k, v) in args {
        if !first {
            out.push(',');
        }
        first = false;
        out.push_str(&serde_json::to_string(k).unwrap_or_default());
        out.push(':');
        out.push_str(&serde_json::to_string(v).unwrap_or_default());
    }
    if let Some((key, fragment)) = in_progress {
        if !first {
            out.push(',');
        }
        out.push_str(&serde_json::to_string(key).unwrap_or_default());
        out.push(':');
        out.push_str(fragment);
    }
    parser.add_tool_call(name, "", &out);
    ParseError::Partial
}

/// Builds a GBNF fragment accepting any string not containing any of
/// `forbids` as a substring, by walking a trie over the forbidden strings
/// and emitting, at each trie node, a character class excluding whatever
/// byte would continue toward a match plus one alternative branch per such
/// byte that recurses into the corresponding child.
pub fn make_gbnf_excluding(forbids: &[String]) -> String {
    if forbids.is_empty() {
        return "( . )*".to_string();
    }
    let mut sorted: Vec<&str> = forbids.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let bytes: Vec<&[u8]> = sorted.iter().map(|s| s.as_bytes()).collect();
    let expr = build_trie_expr(&bytes, 0, bytes.len(), 0);
    let expr = if expr.is_empty() {
        let mut cls = String::new();
        for s in &sorted {
            if let Some(&b) = s.as_bytes().first() {
                cls.push_str(&charclass_escape(b));
            }
        }
        format!("( [^{cls}] )")
    } else {
        expr
    };
    if forbids.len() == 1 {
        format!("{expr}*")
    } else {
        format!("( {expr} )*")
    }
}

fn build_trie_expr(forbids: &[&[u8]], l: usize, r: usize, depth: usize) -> String {
    let mut children: Vec<(u8, usize, usize)> = Vec::new();
    let mut i = l;
    while i < r {
        let s = forbids[i];
        if s.len() == depth {
            i += 1;
            continue;
        }
        let c = s[depth];
        let mut j = i;
        while j < r && forbids[j].len() > depth && forbids[j][depth] == c {
            j += 1;
        }
        children.push((c, i, j));
        i = j;
    }

    let mut alts = Vec::new();
    if !children.is_empty() {
        let mut cls = String::new();
        for &(c, _, _) in &children {
            cls.push_str(&charclass_escape(c));
        }
        alts.push(format!("[^{cls}]"));
    }
    for &(c, lo, hi) in &children {
        let child_expr = build_trie_expr(forbids, lo, hi, depth + 1);
        if !child_expr.is_empty() {
            alts.push(format!("{} {child_expr}", quote_byte(c)));
        }
    }
    if alts.is_empty() {
        return String::new();
    }
    format!("( {} )", alts.join(" | "))
}

fn charclass_escape(c: u8) -> String {
    match c {
        b'\\' | b']' | b'^' | b'-' => format!("\\{}", c as char),
        0x20..=0x7e => (c as char).to_string(),
        _ => format!("\\x{c:02X}"),
    }
}

fn quote_byte(c: u8) -> String {
    match c {
        b'\\' => "\"\\\\\"".to_string(),
        b'"' => "\"\\\"\"".to_string(),
        0x20..=0x7e => format!("\"{}\"", c as char),
        _ => format!("\"\\x{c:02X}\""),
    }
}

/// Build a strict GBNF grammar accepting only syntactically valid tool
/// calls for `tools` under `format`. One grammar trigger fires on
/// `SCOPE_START + TOOL_START`.
pub fn build_grammar_xml_tool_call(
    format: &XmlToolCallFormat,
    tools: &[ToolSpec],
    schema_to_grammar: &dyn SchemaToGrammar,
) -> String {
    let mut rules: Vec<String> = Vec::new();
    let string_arg_val_name = "string-arg-val";
    let mut forbids = vec![format.val_end.clone()];
    if let Some(lve) = &format.last_val_end {
        forbids.push(lve.clone());
    }
    rules.push(format!("{string_arg_val_name} ::= {}", make_gbnf_excluding(&forbids)));

    let mut tool_rule_names = Vec::new();
    for tool in tools {
        let Ok(schema) = serde_json::from_str::<Value>(&tool.parameters) else { continue };
        let empty = serde_json::Map::new();
        let properties = schema.get("properties").and_then(Value::as_object).unwrap_or(&empty);
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut key_val_sep = format.key_val_sep.clone();
        if let Some(sep2) = &format.key_val_sep2 {
            key_val_sep.push_str(sep2);
        }

        let mut arg_rule_names = Vec::new();
        for (key, prop_schema) in properties {
            let rule_name = format!("func-{}-kv-{key}", tool.name);
            let is_string = prop_schema.get("type").and_then(Value::as_str) == Some("string");
            let value_expr = if is_string && format.raw_argval != Some(false) {
                if format.raw_argval == Some(true) {
                    string_arg_val_name.to_string()
                } else {
                    let schema_name = format!("{}-arg-{key}", tool.name);
                    let schema_body = schema_to_grammar.to_grammar(prop_schema, &schema_name);
                    format!("( {string_arg_val_name} | {schema_body} )")
                }
            } else {
                schema_to_grammar.to_grammar(prop_schema, &format!("{}-arg-{key}", tool.name))
            };
            rules.push(format!(
                "{rule_name} ::= {} {} {} {value_expr}",
                gbnf_literal(&format.key_start),
                gbnf_literal(key),
                gbnf_literal(&key_val_sep),
            ));
            arg_rule_names.push((rule_name, required.contains(&key.as_str())));
        }

        let last_end = format.last_val_end.as_deref().unwrap_or(&format.val_end);
        let mut next_arg_with_sep = gbnf_literal(last_end);
        let mut next_arg = "\"\"".to_string();
        for (rule_name, is_required) in arg_rule_names.iter().rev() {
            let include = format!("{rule_name} {next_arg_with_sep}");
            next_arg = if *is_required { include.clone() } else { format!("( {include} ) | {next_arg}") };
            let include_with_sep = format!("{} {rule_name} {next_arg_with_sep}", gbnf_literal(&format.val_end));
            next_arg_with_sep = if *is_required {
                include_with_sep
            } else {
                format!("( {include_with_sep} ) | {next_arg_with_sep}")
            };
        }

        let quoted_name = if format.strip_functions_prefix {
            format!("\"functions.\" {} \":\" [0-9]+", gbnf_literal(&tool.name))
        } else {
            gbnf_literal(&tool.name)
        };
        let call_rule = format!("{}-call", tool.name);
        rules.push(format!(
            "{call_rule} ::= {} {quoted_name} {} {next_arg}",
            gbnf_literal(&format.tool_start),
            gbnf_literal(&format.tool_sep),
        ));
        tool_rule_names.push(call_rule);
    }

    let once = "root-tool-call-once";
    rules.push(format!("{once} ::= {}", tool_rule_names.join(" | ")));
    let more = "root-tool-call-more";
    rules.push(format!("{more} ::= {} {once}", gbnf_literal(&format.tool_end)));
    let call_end_lit = format.last_tool_end.as_deref().unwrap_or(&format.tool_end);
    let call_end = "root-call-end";
    rules.push(format!("{call_end} ::= {}", gbnf_literal(call_end_lit)));
    let multi = "root-tool-call-multiple-with-end";
    rules.push(format!("{multi} ::= {once} {more}* {call_end}"));

    let scope_prefix = if format.scope_start.is_empty() { String::new() } else { format!("{} ", gbnf_literal(&format.scope_start)) };
    let scope_suffix = if format.scope_end.is_empty() { String::new() } else { format!(" {}", gbnf_literal(&format.scope_end)) };
    let root = format!("root ::= {scope_prefix}{multi}?{scope_suffix}");

    let mut out = format!("{root}\n");
    for r in rules {
        out.push_str(&r);
        out.push('\n');
    }
    out
}

fn gbnf_literal(s: &str) -> String {
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

/// The grammar trigger literal for this format: fires on `SCOPE_START + TOOL_START`.
pub fn grammar_trigger_literal(format: &XmlToolCallFormat) -> String {
    format!("{}{}", format.scope_start, format.tool_start)
}
