//! Parse JSON that may be truncated mid-value.
//!
//! When the input ends before a value is complete, [`parse_partial`] closes
//! the value by substituting a caller-supplied *healing marker* at the
//! truncation point, so the result is always syntactically valid JSON that
//! callers can walk like any other parsed document. The marker is also
//! returned in its post-`to_string()` form (`json_dump_marker`) since
//! escaping can change its spelling once it's embedded in a string.

use serde_json::{Map, Value};

#[derive(Debug, Clone, thiserror::Error)]
pub enum JsonParseError {
    #[error("malformed json: {0}")]
    Malformed(String),
    #[error("input ended before any value could be healed")]
    Truncated,
}

/// The two spellings of a healing marker: as it appears in the raw input
/// (`marker`), and as it appears once the healed value has been
/// re-serialized (`json_dump_marker`, which may carry JSON string escapes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealingMarker {
    pub marker: String,
    pub json_dump_marker: String,
}

impl HealingMarker {
    fn new(marker: &str) -> Self {
        let dumped = serde_json::to_string(&Value::String(marker.to_string()))
            .expect("serializing a string never fails");
        // Strip the surrounding quotes `serde_json` always wraps a string in.
        let json_dump_marker = dumped[1..dumped.len() - 1].to_string();
        Self { marker: marker.to_string(), json_dump_marker }
    }
}

#[derive(Debug, Clone)]
pub struct PartialJson {
    pub value: Value,
    pub healing_marker: Option<HealingMarker>,
    /// Byte length of `input` actually consumed by this value (trailing
    /// bytes after it, if any, belong to whatever comes next).
    pub consumed: usize,
}

/// Parse one JSON value out of `input`, healing a truncated tail with
/// `marker` if needed. `marker` must not occur anywhere in `input`
/// (callers get this from `Parser::healing_marker()`).
pub fn parse_partial(input: &str, marker: &str) -> Result<PartialJson, JsonParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut cursor = Cursor { chars: &chars, pos: 0, marker };
    cursor.skip_ws();
    let (value, healed) = cursor.parse_value()?;
    let consumed: usize = chars[..cursor.pos].iter().map(|c| c.len_utf8()).sum();
    Ok(PartialJson {
        value,
        healing_marker: if healed { Some(HealingMarker::new(marker)) } else { None },
        consumed,
    })
}

struct Cursor<'a> {
    chars: &'a [char],
    pos: usize,
    marker: &'a str,
}

enum ValueOutcome {
    Complete(Value),
    /// The value could not be completed (ran out of input mid-literal or
    /// mid-number); the caller must drop it and close its container.
    Incomplete,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    /// Parse one value. `(Value, healed)` where `healed` is true iff this
    /// value or anything nested inside it was completed with the marker.
    fn parse_value(&mut self) -> Result<(Value, bool), JsonParseError> {
        self.skip_ws();
        if self.eof() {
            return Err(JsonParseError::Truncated);
        }
        match self.peek().unwrap() {
            '"' => self.parse_string_value(),
            '{' => self.parse_object(),
            '[' => self.parse_array(),
            't' | 'f' | 'n' => match self.parse_literal()? {
                ValueOutcome::Complete(v) => Ok((v, false)),
                ValueOutcome::Incomplete => Err(JsonParseError::Truncated),
            },
            '-' | '0'..='9' => match self.parse_number()? {
                ValueOutcome::Complete(v) => Ok((v, false)),
                ValueOutcome::Incomplete => Err(JsonParseError::Truncated),
            },
            c => Err(JsonParseError::Malformed(format!("unexpected character '{c}'"))),
        }
    }

    fn parse_string_value(&mut self) -> Result<(Value, bool), JsonParseError> {
        match self.parse_string_raw()? {
            (s, false) => Ok((Value::String(s), false)),
            (s, true) => Ok((Value::String(format!("{s}{}", self.marker)), true)),
        }
    }

    /// Returns `(content, truncated)`. Consumes the closing quote when
    /// present; does not invent one when absent (caller decides what to do
    /// with a truncated string).
    fn parse_string_raw(&mut self) -> Result<(String, bool), JsonParseError> {
        debug_assert_eq!(self.peek(), Some('"'));
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Ok((out, true)),
                Some('"') => {
                    self.pos += 1;
                    return Ok((out, false));
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        None => return Ok((out, true)),
                        Some(c) => {
                            self.pos += 1;
                            match c {
                                '"' => out.push('"'),
                                '\\' => out.push('\\'),
                                '/' => out.push('/'),
                                'b' => out.push('\u{8}'),
                                'f' => out.push('\u{c}'),
                                'n' => out.push('\n'),
                                'r' => out.push('\r'),
                                't' => out.push('\t'),
                                'u' => {
                                    if self.pos + 4 > self.chars.len() {
                                        return Ok((out, true));
                                    }
                                    let hex: String =
                                        self.chars[self.pos..self.pos + 4].iter().collect();
                                    let code = u32::from_str_radix(&hex, 16).map_err(|_| {
                                        JsonParseError::Malformed("bad \\u escape".into())
                                    })?;
                                    self.pos += 4;
                                    if let Some(ch) = char::from_u32(code) {
                                        out.push(ch);
                                    }
                                }
                                other => {
                                    return Err(JsonParseError::Malformed(format!(
                                        "bad escape '\\{other}'"
                                    )))
                                }
                            }
                        }
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn parse_literal(&mut self) -> Result<ValueOutcome, JsonParseError> {
        for (lit, value) in [("true", Value::Bool(true)), ("false", Value::Bool(false)), ("null", Value::Null)]
        {
            if self.matches_prefix(lit) {
                if self.pos + lit.len() <= self.chars.len() {
                    self.pos += lit.len();
                    return Ok(ValueOutcome::Complete(value));
                }
                return Ok(ValueOutcome::Incomplete);
            }
        }
        Err(JsonParseError::Malformed("unknown literal".into()))
    }

    fn matches_prefix(&self, lit: &str) -> bool {
        let remaining = self.chars.len() - self.pos;
        let take = remaining.min(lit.len());
        let candidate: String = self.chars[self.pos..self.pos + take].iter().collect();
        lit.starts_with(&candidate)
    }

    fn parse_number(&mut self) -> Result<ValueOutcome, JsonParseError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        let mut saw_digit = false;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
            saw_digit = true;
        }
        if self.peek() == Some('.') {
            self.pos += 1;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
                saw_digit = true;
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            self.pos += 1;
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.pos += 1;
            }
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if !saw_digit {
            self.pos = start;
            return Ok(ValueOutcome::Incomplete);
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        match text.parse::<serde_json::Number>() {
            Ok(n) => Ok(ValueOutcome::Complete(Value::Number(n))),
            Err(_) => Err(JsonParseError::Malformed(format!("bad number '{text}'"))),
        }
    }

    fn parse_object(&mut self) -> Result<(Value, bool), JsonParseError> {
        debug_assert_eq!(self.peek(), Some('{'));
        self.pos += 1;
        let mut map = Map::new();
        let mut healed = false;
        self.skip_ws();
        if self.peek() == Some('}') {
            self.pos += 1;
            return Ok((Value::Object(map), false));
        }
        loop {
            self.skip_ws();
            if self.eof() {
                return Ok((Value::Object(map), true));
            }
            if self.peek() != Some('"') {
                return Err(JsonParseError::Malformed("expected object key".into()));
            }
            let (key, key_truncated) = self.parse_string_raw()?;
            if key_truncated {
                // Unterminated key: nothing usable to attach a value to.
                return Ok((Value::Object(map), true));
            }
            self.skip_ws();
            if self.peek() != Some(':') {
                // Missing colon: either EOF (truncated) or malformed.
                if self.eof() {
                    return Ok((Value::Object(map), true));
                }
                return Err(JsonParseError::Malformed("expected ':'".into()));
            }
            self.pos += 1;
            self.skip_ws();
            if self.eof() {
                return Ok((Value::Object(map), true));
            }
            match self.parse_value() {
                Ok((value, value_healed)) => {
                    map.insert(key, value);
                    healed |= value_healed;
                    if value_healed {
                        return Ok((Value::Object(map), true));
                    }
                }
                Err(JsonParseError::Truncated) => {
                    return Ok((Value::Object(map), true));
                }
                Err(e) => return Err(e),
            }
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                }
                Some('}') => {
                    self.pos += 1;
                    return Ok((Value::Object(map), healed));
                }
                None => return Ok((Value::Object(map), true)),
                Some(c) => return Err(JsonParseError::Malformed(format!("unexpected '{c}' in object"))),
            }
        }
    }

    fn parse_array(&mut self) -> Result<(Value, bool), JsonParseError> {
        debug_assert_eq!(self.peek(), Some('['));
        self.pos += 1;
        let mut items = Vec::new();
        let mut healed = false;
        self.skip_ws();
        if self.peek() == Some(']') {
            self.pos += 1;
            return Ok((Value::Array(items), false));
        }
        loop {
            self.skip_ws();
            if self.eof() {
                return Ok((Value::Array(items), true));
            }
            match self.parse_value() {
                Ok((value, value_healed)) => {
                    items.push(value);
                    healed |= value_healed;
                    if value_healed {
                        return Ok((Value::Array(items), true));
                    }
                }
                Err(JsonParseError::Truncated) => {
                    return Ok((Value::Array(items), true));
                }
                Err(e) => return Err(e),
            }
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                }
                Some(']') => {
                    self.pos += 1;
                    return Ok((Value::Array(items), healed));
                }
                None => return Ok((Value::Array(items), true)),
                Some(c) => return Err(JsonParseError::Malformed(format!("unexpected '{c}' in array"))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_complete_object() {
        let out = parse_partial(r#"{"a": 1, "b": "x"}"#, "MARK").unwrap();
        assert!(out.healing_marker.is_none());
        assert_eq!(out.value["a"], 1);
        assert_eq!(out.value["b"], "x");
    }

    #[test]
    fn heals_truncated_string_value() {
        let out = parse_partial(r#"{"city":"Pa"#, "MARK").unwrap();
        let hm = out.healing_marker.unwrap();
        assert_eq!(out.value["city"], format!("Pa{}", hm.marker));
    }

    #[test]
    fn heals_truncated_string_at_top_level() {
        let out = parse_partial(r#""Par"#, "MARK").unwrap();
        let hm = out.healing_marker.unwrap();
        assert_eq!(out.value, format!("Par{}", hm.marker));
    }

    #[test]
    fn closes_object_missing_final_brace() {
        let out = parse_partial(r#"{"a": 1, "b": 2"#, "MARK").unwrap();
        assert!(out.healing_marker.is_some());
        assert_eq!(out.value["a"], 1);
        assert_eq!(out.value["b"], 2);
    }

    #[test]
    fn drops_dangling_key_with_no_value() {
        let out = parse_partial(r#"{"a": 1, "b":"#, "MARK").unwrap();
        assert!(out.healing_marker.is_some());
        assert_eq!(out.value["a"], 1);
        assert!(out.value.get("b").is_none());
    }

    #[test]
    fn heals_nested_array_of_objects() {
        let out = parse_partial(r#"[{"a":1},{"b":"#, "MARK").unwrap();
        assert!(out.healing_marker.is_some());
        let arr = out.value.as_array().unwrap();
        assert_eq!(arr.len(), 1);
        assert_eq!(arr[0]["a"], 1);
    }

    #[test]
    fn malformed_non_truncated_json_fails() {
        let err = parse_partial(r#"{"a": }"#, "MARK");
        assert!(err.is_err());
    }

    #[test]
    fn unicode_escape_decodes() {
        let out = parse_partial(r#"{"a":"café"}"#, "MARK").unwrap();
        assert_eq!(out.value["a"], "café");
    }

    #[test]
    fn bare_truncated_literal_is_an_error() {
        // A standalone "tru" has no container to close and nothing to heal.
        assert!(parse_partial("tru", "MARK").is_err());
    }
}
