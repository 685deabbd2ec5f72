//! Jinja2 chat-template rendering, treating the template engine itself as a
//! black box behind [`ChatTemplateEngine`] and backing it with `minijinja`.

use std::collections::HashMap;

use llama_chat_types::RenderError;
use minijinja::{context, Environment, Error as MinijinjaError, ErrorKind, Value as MjValue};
use regex::Regex;
use serde_json::Value;

/// A parsed-template cache, created once per model and consumed read-only
/// thereafter: two owned templates (`default`, optional `tool_use`) plus the
/// add-bos/add-eos/has-explicit-template flags that gate the registry
/// waterfall and the final prompt trimming step.
pub struct ChatTemplates {
    default_source: String,
    tool_use_source: Option<String>,
    pub has_explicit_template: bool,
    pub add_bos: bool,
    pub add_eos: bool,
    pub bos_token: String,
    pub eos_token: String,
}

impl ChatTemplates {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        default_source: String,
        tool_use_source: Option<String>,
        has_explicit_template: bool,
        add_bos: bool,
        add_eos: bool,
        bos_token: String,
        eos_token: String,
    ) -> Self {
        Self { default_source, tool_use_source, has_explicit_template, add_bos, add_eos, bos_token, eos_token }
    }

    /// The template the registry's waterfall inspects to pick a dialect:
    /// `tool_use_source` when present, else `default_source`.
    pub fn waterfall_source(&self) -> &str {
        self.tool_use_source.as_deref().unwrap_or(&self.default_source)
    }

    fn source_for(&self, prefer_tool_use: bool) -> &str {
        if prefer_tool_use {
            self.tool_use_source.as_deref().unwrap_or(&self.default_source)
        } else {
            &self.default_source
        }
    }
}

pub trait ChatTemplateEngine: Send + Sync {
    fn render(&self, template_source: &str, context: &Value) -> Result<String, RenderError>;
}

/// Minijinja-backed implementation. Source templates are GGUF-embedded
/// Jinja2 written for Python Jinja2's stdlib semantics; `preprocess`
/// rewrites the handful of Python-only constructs minijinja doesn't parse
/// natively before handing the template to the engine.
#[derive(Default)]
pub struct MinijinjaEngine;

impl ChatTemplateEngine for MinijinjaEngine {
    fn render(&self, template_source: &str, context: &Value) -> Result<String, RenderError> {
        let processed = preprocess(template_source);
        let mut env = Environment::new();
        register_globals(&mut env);
        env.add_template("chat_template", &processed)
            .map_err(|e| RenderError::Template(format!("failed to parse chat template: {e}")))?;
        let template = env
            .get_template("chat_template")
            .map_err(|e| RenderError::Template(format!("failed to load chat template: {e}")))?;
        let ctx = MjValue::from_serialize(context);
        template
            .render(ctx)
            .map_err(|e| RenderError::Template(format!("failed to render chat template: {e}")))
    }
}

/// Fixes Python-specific syntax that minijinja doesn't support natively:
/// `tojson(ensure_ascii=False|True)` → `tojson`, `.endswith(...)` →
/// ` is endingwith(...)`, `.startswith(...)` → ` is startingwith(...)`,
/// `.strip()` → ` | trim`, `.items()` → ` | items`.
fn preprocess(template: &str) -> String {
    let mut result = template
        .replace("tojson(ensure_ascii=False)", "tojson")
        .replace("tojson(ensure_ascii=True)", "tojson");

    let endswith = Regex::new(r"\.endswith\(").expect("static regex");
    result = endswith.replace_all(&result, " is endingwith(").to_string();

    let startswith = Regex::new(r"\.startswith\(").expect("static regex");
    result = startswith.replace_all(&result, " is startingwith(").to_string();

    result = result.replace(".strip()", " | trim");
    result = result.replace(".items()", " | items");
    result
}

fn register_globals(env: &mut Environment) {
    env.add_function("raise_exception", |msg: String| -> Result<String, MinijinjaError> {
        Err(MinijinjaError::new(ErrorKind::InvalidOperation, msg))
    });

    env.add_function("strftime_now", strftime_now_placeholder);
}

thread_local! {
    static NOW_OVERRIDE: std::cell::Cell<i64> = const { std::cell::Cell::new(0) };
}

fn strftime_now_placeholder(fmt: String) -> String {
    let secs = NOW_OVERRIDE.with(|n| n.get());
    format_epoch(secs, &fmt)
}

fn format_epoch(secs: i64, fmt: &str) -> String {
    let days = secs.div_euclid(86400);
    let (year, month, day) = epoch_days_to_ymd(days);
    if fmt.contains("%Y") || fmt.contains("%m") || fmt.contains("%d") {
        fmt.replace("%Y", &format!("{year:04}"))
            .replace("%m", &format!("{month:02}"))
            .replace("%d", &format!("{day:02}"))
    } else {
        format!("{year:04}-{month:02}-{day:02}")
    }
}

/// Civil-calendar algorithm (Howard Hinnant), converting days since the
/// Unix epoch into a Gregorian (year, month, day).
fn epoch_days_to_ymd(days: i64) -> (i64, u32, u32) {
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if m <= 2 { y + 1 } else { y };
    (year, m, d)
}

/// Render `inputs` against `templates`, setting `now` as the pinned clock
/// `strftime_now` reads (keeping rendering pure and reproducible).
pub fn render_with_engine(
    engine: &dyn ChatTemplateEngine,
    template_source: &str,
    messages: &Value,
    tools: &Value,
    add_generation_prompt: bool,
    bos_token: &str,
    eos_token: &str,
    enable_thinking: bool,
    now: i64,
    extra_kwargs: &HashMap<String, Value>,
) -> Result<String, RenderError> {
    NOW_OVERRIDE.with(|n| n.set(now));
    let mut ctx = serde_json::Map::new();
    ctx.insert("messages".into(), messages.clone());
    ctx.insert("tools".into(), tools.clone());
    ctx.insert("available_tools".into(), tools.clone());
    ctx.insert("add_generation_prompt".into(), Value::Bool(add_generation_prompt));
    ctx.insert("bos_token".into(), Value::String(bos_token.to_string()));
    ctx.insert("eos_token".into(), Value::String(eos_token.to_string()));
    ctx.insert("enable_thinking".into(), Value::Bool(enable_thinking));
    for (k, v) in extra_kwargs {
        ctx.insert(k.clone(), v.clone());
    }
    engine.render(template_source, &Value::Object(ctx))
}

pub fn select_template<'a>(templates: &'a ChatTemplates, prefer_tool_use: bool) -> &'a str {
    templates.source_for(prefer_tool_use)
}

/// Shared entry point every dialect renderer calls through: picks the
/// right template source, renders it, and strips a single leading BOS /
/// trailing EOS the template itself emitted when the tokenizer is already
/// configured to re-add them (`templates.add_bos`/`add_eos`).
#[allow(clippy::too_many_arguments)]
pub fn apply(
    engine: &dyn ChatTemplateEngine,
    templates: &ChatTemplates,
    messages: &Value,
    tools: &Value,
    add_generation_prompt: bool,
    enable_thinking: bool,
    now: i64,
    extra_kwargs: &HashMap<String, Value>,
    prefer_tool_use: bool,
) -> Result<String, RenderError> {
    let source = select_template(templates, prefer_tool_use);
    let mut prompt = render_with_engine(
        engine,
        source,
        messages,
        tools,
        add_generation_prompt,
        &templates.bos_token,
        &templates.eos_token,
        enable_thinking,
        now,
        extra_kwargs,
    )?;
    if templates.add_bos && !templates.bos_token.is_empty() && prompt.starts_with(templates.bos_token.as_str()) {
        prompt = prompt[templates.bos_token.len()..].to_string();
    }
    if templates.add_eos && !templates.eos_token.is_empty() && prompt.ends_with(templates.eos_token.as_str()) {
        prompt.truncate(prompt.len() - templates.eos_token.len());
    }
    Ok(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn preprocess_strips_ensure_ascii() {
        let input = r#"{{ tool | tojson(ensure_ascii=False) }}"#;
        assert_eq!(preprocess(input), "{{ tool | tojson }}");
    }

    #[test]
    fn preprocess_converts_endswith_and_startswith() {
        assert_eq!(
            preprocess(r#"x.endswith("/nothink")"#),
            r#"x is endingwith("/nothink")"#
        );
        assert_eq!(
            preprocess(r#"x.startswith('<tool_response>')"#),
            r#"x is startingwith('<tool_response>')"#
        );
    }

    #[test]
    fn preprocess_converts_strip_and_items() {
        assert_eq!(preprocess("{{ content.strip() }}"), "{{ content | trim }}");
        assert_eq!(preprocess("{% for k, v in d.items() %}"), "{% for k, v in d | items %}");
    }

    #[test]
    fn renders_simple_chatml_template() {
        let template = r#"{%- for message in messages %}
<|im_start|>{{ message.role }}
{{ message.content }}<|im_end|>
{%- endfor %}
{%- if add_generation_prompt %}
<|im_start|>assistant
{%- endif %}"#;
        let messages = json!([
            {"role": "system", "content": "You are helpful."},
            {"role": "user", "content": "Hello!"}
        ]);
        let result = render_with_engine(
            &MinijinjaEngine,
            template,
            &messages,
            &json!([]),
            true,
            "<s>",
            "</s>",
            false,
            0,
            &HashMap::new(),
        )
        .unwrap();
        assert!(result.contains("<|im_start|>system"));
        assert!(result.contains("You are helpful."));
        assert!(result.contains("<|im_start|>assistant"));
    }

    #[test]
    fn raise_exception_surfaces_as_render_error() {
        let template = r#"{{ raise_exception("bad input") }}"#;
        let err = render_with_engine(
            &MinijinjaEngine,
            template,
            &json!([]),
            &json!([]),
            false,
            "",
            "",
            false,
            0,
            &HashMap::new(),
        )
        .unwrap_err();
        match err {
            RenderError::Template(msg) => assert!(msg.contains("bad input")),
            other => panic!("expected Template error, got {other:?}"),
        }
    }

    #[test]
    fn apply_strips_leading_bos_when_add_bos_is_set() {
        let template = r#"<s>{%- for message in messages %}{{ message.content }}{%- endfor %}"#;
        let templates = ChatTemplates::new(template.to_string(), None, true, true, false, "<s>".into(), "</s>".into());
        let prompt = apply(
            &MinijinjaEngine,
            &templates,
            &json!([{"role": "user", "content": "hi"}]),
            &json!([]),
            false,
            false,
            0,
            &HashMap::new(),
            false,
        )
        .unwrap();
        assert_eq!(prompt, "hi");
    }

    #[test]
    fn strftime_now_uses_pinned_clock() {
        let template = r#"{{ strftime_now("%Y-%m-%d") }}"#;
        let result = render_with_engine(
            &MinijinjaEngine,
            template,
            &json!([]),
            &json!([]),
            false,
            "",
            "",
            false,
            1_772_323_200,
            &HashMap::new(),
        )
        .unwrap();
        assert_eq!(result, "2026-02-28");
    }
}
