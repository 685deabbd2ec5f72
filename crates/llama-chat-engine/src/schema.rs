//! JSON-Schema-to-GBNF conversion, used wherever a dialect constrains tool
//! arguments (or the whole response) by schema rather than by a literal
//! sentinel grammar.
//!
//! The upstream runtime's `schema_to_grammar` is a large, general
//! subset-of-JSON-Schema compiler; this implementation covers the subset
//! tool-call arguments actually use (objects/properties/required, and the
//! primitive/array/enum/const leaf types), which is all any dialect in this
//! crate needs it for.

use serde_json::Value;

pub trait SchemaToGrammar: Send + Sync {
    /// Emit a GBNF rule body (the right-hand side of `<name> ::= ...`) that
    /// accepts exactly the values `schema` describes. Any nested rules the
    /// implementation needs may be inlined directly into the body; this
    /// trait doesn't require a multi-rule sink because the tool schemas
    /// this crate renders are shallow (object of scalars/arrays/enums).
    fn to_grammar(&self, schema: &Value, name: &str) -> String;
}

pub struct JsonSchemaToGbnf;

impl SchemaToGrammar for JsonSchemaToGbnf {
    fn to_grammar(&self, schema: &Value, name: &str) -> String {
        render(schema, name)
    }
}

fn render(schema: &Value, name: &str) -> String {
    if let Some(values) = schema.get("enum").and_then(Value::as_array) {
        return values
            .iter()
            .map(|v| quote(&value_literal(v)))
            .collect::<Vec<_>>()
            .join(" | ");
    }
    if let Some(constant) = schema.get("const") {
        return quote(&value_literal(constant));
    }
    match schema.get("type").and_then(Value::as_str) {
        Some("object") => render_object(schema, name),
        Some("array") => render_array(schema, name),
        Some("string") => "\"\\\"\" [^\"\\\\]* \"\\\"\"".to_string(),
        Some("integer") => "\"-\"? [0-9]+".to_string(),
        Some("number") => "\"-\"? [0-9]+ (\".\" [0-9]+)? ([eE] [+-]? [0-9]+)?".to_string(),
        Some("boolean") => "\"true\" | \"false\"".to_string(),
        Some("null") => "\"null\"".to_string(),
        _ => "value".to_string(),
    }
}

fn render_object(schema: &Value, name: &str) -> String {
    let empty = serde_json::Map::new();
    let properties = schema.get("properties").and_then(Value::as_object).unwrap_or(&empty);
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if properties.is_empty() {
        return "\"{\" \"}\"".to_string();
    }

    let mut members = Vec::new();
    for (key, sub_schema) in properties {
        let sub_name = format!("{name}-{key}");
        let sub_body = render(sub_schema, &sub_name);
        let member = format!("\"\\\"{key}\\\":\" {sub_body}");
        if required.contains(&key.as_str()) {
            members.push(member);
        } else {
            members.push(format!("({member})?"));
        }
    }
    let joined = members.join(" \",\" ");
    format!("\"{{\" {joined} \"}}\"")
}

fn render_array(schema: &Value, name: &str) -> String {
    let items_name = format!("{name}-item");
    let item_body = schema
        .get("items")
        .map(|items| render(items, &items_name))
        .unwrap_or_else(|| "value".to_string());
    format!("\"[\" ( {item_body} (\",\" {item_body})* )? \"]\"")
}

fn value_literal(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn quote(s: &str) -> String {
    let mut out = String::from("\"\\\"");
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\\\\\""),
            '\\' => out.push_str("\\\\\\\\"),
            c => out.push(c),
        }
    }
    out.push_str("\\\"\"");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_object_with_required_and_optional_fields() {
        let schema = json!({
            "type": "object",
            "properties": {
                "city": {"type": "string"},
                "days": {"type": "integer"}
            },
            "required": ["city"]
        });
        let g = JsonSchemaToGbnf.to_grammar(&schema, "forecast");
        assert!(g.contains("\"city\""));
        assert!(g.contains("days"));
    }

    #[test]
    fn renders_enum_as_alternation() {
        let schema = json!({"enum": ["celsius", "fahrenheit"]});
        let g = JsonSchemaToGbnf.to_grammar(&schema, "unit");
        assert!(g.contains("celsius"));
        assert!(g.contains(" | "));
    }

    #[test]
    fn renders_array_of_strings() {
        let schema = json!({"type": "array", "items": {"type": "string"}});
        let g = JsonSchemaToGbnf.to_grammar(&schema, "tags");
        assert!(g.starts_with("\"[\""));
    }
}
