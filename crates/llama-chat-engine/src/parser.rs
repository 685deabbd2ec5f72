//! The low-level cursor every dialect parser is built on top of.
//!
//! `Parser` walks a raw model-output string left to right, accumulating a
//! `Message`. Every `try_*` method either advances the cursor and returns
//! `Ok(Some(..))`, leaves the cursor untouched and returns `Ok(None)`, or
//! returns `Err(ParseError::Partial)` to unwind out to the dialect's
//! top-level `parse()`, which decides whether to keep the partial progress
//! (stream genuinely partial) or discard it and fall back to content-only
//! (stream was supposedly complete, so the truncation is real breakage).

use std::collections::HashMap;

use llama_chat_types::{Message, ParseError, ToolCall};
use regex::Regex;
use serde_json::Value;
use uuid::Uuid;

use crate::partial_json::{self, HealingMarker, PartialJson};
use crate::regex_partial::find_partial_stop;

pub type ByteRange = (usize, usize);

#[derive(Debug, Clone)]
pub struct RegexMatch {
    pub prelude: String,
    pub groups: Vec<Option<ByteRange>>,
}

pub struct Parser<'a> {
    input: &'a str,
    pos: usize,
    is_partial: bool,
    pub result: Message,
    healing_marker: Option<String>,
    /// Set once a tool call has been pushed onto `result`, so a later
    /// recoverable failure inside `try_consume_xml_tool_calls` knows it must
    /// propagate instead of silently rewinding (that would un-ship output
    /// a caller may already have streamed to a client).
    pub shipped_tool_call: bool,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str, is_partial: bool) -> Self {
        Self {
            input,
            pos: 0,
            is_partial,
            result: Message::assistant(),
            healing_marker: None,
            shipped_tool_call: false,
        }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn is_partial(&self) -> bool {
        self.is_partial
    }

    pub fn input(&self) -> &'a str {
        self.input
    }

    pub fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// A marker guaranteed absent from `input`, generated by repeated draws
    /// until one misses; cached for the lifetime of this parse.
    pub fn healing_marker(&mut self) -> String {
        if let Some(m) = &self.healing_marker {
            return m.clone();
        }
        loop {
            let candidate = format!("\u{1}heal_{}\u{1}", Uuid::new_v4().simple());
            if !self.input.contains(&candidate) {
                self.healing_marker = Some(candidate.clone());
                return candidate;
            }
        }
    }

    pub fn consume_spaces(&mut self) -> bool {
        let before = self.pos;
        while matches!(self.remaining().chars().next(), Some(c) if c.is_whitespace()) {
            self.pos += self.remaining().chars().next().unwrap().len_utf8();
        }
        self.pos != before
    }

    /// Search for `re` starting at `from` (default: cursor). On a full
    /// match, advances the cursor past it and returns the prelude (text
    /// between the search start and the match). A trailing partial match
    /// on a partial stream unwinds.
    pub fn try_find_regex(
        &mut self,
        re: &Regex,
        from: Option<usize>,
        add_prelude_to_content: bool,
    ) -> Result<Option<RegexMatch>, ParseError> {
        let from = from.unwrap_or(self.pos);
        let haystack = &self.input[from..];
        match re.captures(haystack) {
            Some(caps) => {
                let whole = caps.get(0).expect("group 0 always present");
                let match_start = from + whole.start();
                let match_end = from + whole.end();
                let prelude = self.input[from..match_start].to_string();
                let groups = (0..caps.len())
                    .map(|i| caps.get(i).map(|g| (from + g.start(), from + g.end())))
                    .collect();
                if add_prelude_to_content {
                    self.add_content(&prelude);
                }
                self.pos = match_end;
                Ok(Some(RegexMatch { prelude, groups }))
            }
            None => {
                if self.is_partial && haystack_has_partial_tail(re, haystack) {
                    return Err(ParseError::Partial);
                }
                Ok(None)
            }
        }
    }

    /// Like `try_find_regex`, but the match must start exactly at the
    /// cursor.
    pub fn try_consume_regex(&mut self, re: &Regex) -> Result<Option<RegexMatch>, ParseError> {
        let haystack = self.remaining();
        match re.captures(haystack) {
            Some(caps) => {
                let whole = caps.get(0).expect("group 0 always present");
                if whole.start() != 0 {
                    return Ok(None);
                }
                let groups = (0..caps.len())
                    .map(|i| caps.get(i).map(|g| (self.pos + g.start(), self.pos + g.end())))
                    .collect();
                self.pos += whole.end();
                Ok(Some(RegexMatch { prelude: String::new(), groups }))
            }
            None => {
                if self.is_partial && haystack_has_partial_tail(re, haystack) {
                    return Err(ParseError::Partial);
                }
                Ok(None)
            }
        }
    }

    /// Literal version of `try_find_regex`: also detects a sentinel that's
    /// only partially emitted at the tail of a partial stream.
    pub fn try_find_literal(&mut self, literal: &str) -> Result<Option<String>, ParseError> {
        let from = self.pos;
        let haystack = &self.input[from..];
        if let Some(idx) = haystack.find(literal) {
            let prelude = haystack[..idx].to_string();
            self.pos = from + idx + literal.len();
            return Ok(Some(prelude));
        }
        if self.is_partial {
            if let Some(boundary) = find_partial_stop(haystack, literal) {
                let _ = boundary;
                return Err(ParseError::Partial);
            }
        }
        Ok(None)
    }

    pub fn try_consume_literal(&mut self, literal: &str) -> Result<bool, ParseError> {
        let haystack = self.remaining();
        if haystack.starts_with(literal) {
            self.pos += literal.len();
            return Ok(true);
        }
        if self.is_partial && literal.starts_with(haystack) && !haystack.is_empty() {
            return Err(ParseError::Partial);
        }
        Ok(false)
    }

    pub fn consume_literal(&mut self, literal: &str) -> Result<(), ParseError> {
        if self.try_consume_literal(literal)? {
            Ok(())
        } else {
            Err(ParseError::Fatal(format!("expected literal {literal:?}")))
        }
    }

    /// Parse one JSON value at the cursor, healing a truncated tail. If
    /// healing occurred while the stream is *not* partial, that's a real
    /// truncation (not an in-flight one): unwind the same way, so the
    /// top-level `parse()` resets to the content-only fallback.
    pub fn try_consume_json(&mut self) -> Result<Option<PartialJson>, ParseError> {
        let start = self.pos;
        if self.remaining().is_empty() {
            return Ok(None);
        }
        let marker = self.healing_marker();
        match partial_json::parse_partial(self.remaining(), &marker) {
            Ok(parsed) => {
                self.pos = start + parsed.consumed;
                if parsed.healing_marker.is_some() && !self.is_partial {
                    return Err(ParseError::Partial);
                }
                Ok(Some(parsed))
            }
            Err(_) => Ok(None),
        }
    }

    /// Parse JSON at the cursor, then re-serialize the sub-values at
    /// `args_paths` as nested JSON strings (so `arguments` becomes a JSON
    /// string field) and cut any value at `content_paths` at the healing
    /// marker. Returns the rewritten top-level value plus whether any path
    /// hit the marker.
    pub fn consume_json_with_dumped_args(
        &mut self,
        args_paths: &[&[&str]],
        content_paths: &[&[&str]],
    ) -> Result<Option<(Value, bool)>, ParseError> {
        let Some(parsed) = self.try_consume_json()? else {
            return Ok(None);
        };
        let mut value = parsed.value;
        let mut is_partial = false;
        for path in args_paths {
            if let Some(sub) = get_path_mut(&mut value, path) {
                let mut dumped = serde_json::to_string(sub).unwrap_or_default();
                if let Some(hm) = &parsed.healing_marker {
                    if contains_marker(sub, hm) {
                        is_partial = true;
                    }
                    if let Some(idx) = dumped.find(&hm.json_dump_marker) {
                        dumped.truncate(idx);
                        if dumped == "\"" {
                            dumped.clear();
                        }
                        is_partial = true;
                    }
                }
                *sub = Value::String(dumped);
            }
        }
        for path in content_paths {
            if let Some(sub) = get_path_mut(&mut value, path) {
                if let (Value::String(s), Some(hm)) = (&mut *sub, &parsed.healing_marker) {
                    if let Some(idx) = s.find(&hm.marker) {
                        s.truncate(idx);
                        is_partial = true;
                    }
                }
            }
        }
        Ok(Some((value, is_partial)))
    }

    pub fn add_content(&mut self, s: &str) {
        self.result.content.push_str(s);
    }

    pub fn add_reasoning_content(&mut self, s: &str) {
        self.result.reasoning_content.push_str(s);
    }

    /// Push a tool call if `name` is non-empty; returns whether it was
    /// added.
    pub fn add_tool_call(&mut self, name: &str, id: &str, args: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        self.result.tool_calls.push(ToolCall { name: name.to_string(), arguments: args.to_string(), id: id.to_string() });
        self.shipped_tool_call = true;
        true
    }

    /// `json` is `{"name": ..., "arguments": {...}|"...", "id"?: ...}`.
    /// `healing_marker` is the marker (if any) the JSON this value came from
    /// was healed with, so a partial `arguments` value gets trimmed instead
    /// of shipping the raw marker bytes to a caller.
    pub fn add_tool_call_json(&mut self, json: &Value, healing_marker: Option<&HealingMarker>) -> Result<bool, ParseError> {
        let name = json.get("name").and_then(Value::as_str).unwrap_or_default();
        let id = json.get("id").and_then(Value::as_str).unwrap_or_default();
        let args = match json.get("arguments") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => dump_value_trimmed(other, healing_marker),
            None => String::new(),
        };
        Ok(self.add_tool_call(name, id, &args))
    }

    pub fn add_tool_calls_json(&mut self, array: &Value, healing_marker: Option<&HealingMarker>) -> Result<usize, ParseError> {
        let items = array.as_array().ok_or_else(|| ParseError::Fatal("expected tool call array".into()))?;
        let mut count = 0;
        for item in items {
            if self.add_tool_call_json(item, healing_marker)? {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Short form: `{"<name>": {...args}}`.
    pub fn add_tool_call_short_form(&mut self, json: &Value, healing_marker: Option<&HealingMarker>) -> Result<bool, ParseError> {
        let obj = json.as_object().ok_or_else(|| ParseError::Fatal("expected tool call object".into()))?;
        let Some((name, args)) = obj.iter().next() else {
            return Ok(false);
        };
        let args_str = dump_value_trimmed(args, healing_marker);
        Ok(self.add_tool_call(name, "", &args_str))
    }
}

/// Serialize `value` and, if it was healed with `healing_marker`, trim the
/// dump at the marker's post-serialization spelling — the same truncation
/// `consume_json_with_dumped_args` applies — so a partial dump stays a
/// literal prefix of the eventual complete one instead of leaking marker
/// bytes into `arguments`.
pub fn dump_value_trimmed(value: &Value, healing_marker: Option<&HealingMarker>) -> String {
    let mut dumped = serde_json::to_string(value).unwrap_or_default();
    if let Some(hm) = healing_marker {
        if let Some(idx) = dumped.find(&hm.json_dump_marker) {
            dumped.truncate(idx);
            if dumped == "\"" {
                dumped.clear();
            }
        }
    }
    dumped
}

fn get_path_mut<'v>(value: &'v mut Value, path: &[&str]) -> Option<&'v mut Value> {
    let mut cur = value;
    for key in path {
        cur = cur.get_mut(*key)?;
    }
    Some(cur)
}

fn contains_marker(value: &Value, hm: &HealingMarker) -> bool {
    match value {
        Value::String(s) => s.contains(&hm.marker),
        Value::Object(map) => map.values().any(|v| contains_marker(v, hm)),
        Value::Array(items) => items.iter().any(|v| contains_marker(v, hm)),
        _ => false,
    }
}

/// Whether some non-empty suffix of `haystack` could be the start of a
/// longer string `re` would match (approximated via the same tail-prefix
/// trick used for literals, against the regex's literal alternatives is not
/// generally possible; call sites in this crate only ever search for
/// literal-shaped sentinels through `try_find_literal`, so this is a
/// conservative `false` for pattern regexes used purely for structural
/// matches that don't appear at the very tail of a partial stream).
fn haystack_has_partial_tail(_re: &Regex, haystack: &str) -> bool {
    haystack.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_find_literal_advances_past_match() {
        let mut p = Parser::new("hello <tag>world", false);
        let prelude = p.try_find_literal("<tag>").unwrap().unwrap();
        assert_eq!(prelude, "hello ");
        assert_eq!(p.remaining(), "world");
    }

    #[test]
    fn try_find_literal_partial_tail_unwinds_when_partial() {
        let mut p = Parser::new("hello <ta", true);
        assert!(matches!(p.try_find_literal("<tag>"), Err(ParseError::Partial)));
    }

    #[test]
    fn try_consume_literal_matches_only_at_cursor() {
        let mut p = Parser::new("abc", false);
        assert!(!p.try_consume_literal("b").unwrap());
        assert!(p.try_consume_literal("a").unwrap());
        assert_eq!(p.remaining(), "bc");
    }

    #[test]
    fn consume_spaces_reports_whether_it_moved() {
        let mut p = Parser::new("   x", false);
        assert!(p.consume_spaces());
        assert!(!p.consume_spaces());
        assert_eq!(p.remaining(), "x");
    }

    #[test]
    fn add_tool_call_rejects_empty_name() {
        let mut p = Parser::new("", false);
        assert!(!p.add_tool_call("", "", "{}"));
        assert!(p.add_tool_call("f", "1", "{}"));
        assert_eq!(p.result.tool_calls.len(), 1);
    }

    #[test]
    fn try_consume_json_heals_truncated_object_when_partial() {
        let mut p = Parser::new(r#"{"a": 1, "b": 2"#, true);
        let parsed = p.try_consume_json().unwrap().unwrap();
        assert!(parsed.healing_marker.is_some());
    }

    #[test]
    fn try_consume_json_non_partial_truncation_unwinds() {
        let mut p = Parser::new(r#"{"a": 1, "b": 2"#, false);
        assert!(matches!(p.try_consume_json(), Err(ParseError::Partial)));
    }

    #[test]
    fn dumped_args_path_becomes_json_string() {
        let mut p = Parser::new(r#"{"name": "f", "arguments": {"x": 1}}"#, false);
        let (value, is_partial) = p.consume_json_with_dumped_args(&[&["arguments"]], &[]).unwrap().unwrap();
        assert!(!is_partial);
        assert_eq!(value["arguments"], Value::String("{\"x\":1}".to_string()));
    }
}
