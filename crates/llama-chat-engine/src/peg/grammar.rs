//! GBNF emission for a built [`PegArena`]. The PEG arena describes both a
//! parser and (via this module) the constraint grammar a sampler should be
//! restricted to while producing the text that parser will later read back.

use std::collections::HashMap;

use super::arena::{ParserId, ParserNode, PegArena};
use crate::schema::SchemaToGrammar;

struct GrammarEmitter<'a> {
    arena: &'a PegArena,
    schema_to_grammar: &'a dyn SchemaToGrammar,
    /// Rule name -> body, in first-seen order (`order` tracks insertion).
    defs: HashMap<String, String>,
    order: Vec<String>,
}

impl<'a> GrammarEmitter<'a> {
    fn ensure_rule(&mut self, name: &str, child: ParserId) {
        if self.defs.contains_key(name) {
            return;
        }
        // Placeholder breaks recursive (self-referential) rule cycles.
        self.defs.insert(name.to_string(), String::new());
        self.order.push(name.to_string());
        let body = self.expr(child);
        self.defs.insert(name.to_string(), body);
    }

    fn expr(&mut self, id: ParserId) -> String {
        match self.arena.get(id).clone() {
            ParserNode::Rule { name, child, .. } => {
                self.ensure_rule(&name, child);
                name
            }
            ParserNode::Ref { name } => name,
            ParserNode::Tag { child, .. } | ParserNode::Atomic { child } => self.expr(child),
            ParserNode::Schema { child, name, schema, raw } => {
                let grammar_name = format!("{name}-schema");
                if !self.defs.contains_key(&grammar_name) {
                    self.defs.insert(grammar_name.clone(), String::new());
                    self.order.push(grammar_name.clone());
                    let mut body = self.schema_to_grammar.to_grammar(&schema, &grammar_name);
                    if raw {
                        let raw_expr = self.expr(child);
                        body = format!("{body} | {raw_expr}");
                    }
                    self.defs.insert(grammar_name.clone(), body);
                }
                grammar_name
            }
            ParserNode::Sequence { children } => {
                children.into_iter().map(|c| self.expr(c)).collect::<Vec<_>>().join(" ")
            }
            ParserNode::Choice { children } => {
                children.into_iter().map(|c| self.expr(c)).collect::<Vec<_>>().join(" | ")
            }
            ParserNode::Repetition { child, min, max } => {
                let inner = format!("({})", self.expr(child));
                match (min, max) {
                    (0, 1) => format!("{inner}?"),
                    (0, -1) => format!("{inner}*"),
                    (1, -1) => format!("{inner}+"),
                    (mn, -1) => format!("{inner}{{{mn},}}"),
                    (mn, mx) => format!("{inner}{{{mn},{mx}}}"),
                }
            }
            ParserNode::Literal { value } => gbnf_quote(&value),
            ParserNode::Any => ".".to_string(),
            ParserNode::Space => "[ \\t\\n\\r]*".to_string(),
            ParserNode::Chars { ranges, negated, min, max } => {
                gbnf_char_class(&ranges, negated, min, max)
            }
            ParserNode::JsonString => "[^\"\\\\]*".to_string(),
            ParserNode::Until { .. } => ".*".to_string(),
            ParserNode::Epsilon | ParserNode::Start | ParserNode::End => "\"\"".to_string(),
            ParserNode::And { .. } | ParserNode::Not { .. } => "\"\"".to_string(),
        }
    }
}

fn gbnf_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn gbnf_char_class(ranges: &[(u32, u32)], negated: bool, min: i64, max: i64) -> String {
    let mut class = String::from("[");
    if negated {
        class.push('^');
    }
    for &(lo, hi) in ranges {
        if lo == hi {
            class.push_str(&format!("\\u{lo:04x}"));
        } else {
            class.push_str(&format!("\\u{lo:04x}-\\u{hi:04x}"));
        }
    }
    class.push(']');
    match (min, max) {
        (1, 1) => class,
        (0, 1) => format!("{class}?"),
        (0, -1) => format!("{class}*"),
        (1, -1) => format!("{class}+"),
        (mn, -1) => format!("{class}{{{mn},}}"),
        (mn, mx) => format!("{class}{{{mn},{mx}}}"),
    }
}

/// Walk reachable rules from `arena.root()` and emit a GBNF grammar. In
/// `lazy` mode, the root is the sorted disjunction of `trigger=true` rules
/// and only their descendants are emitted; otherwise the root parser's own
/// expansion is used.
pub fn build_grammar(arena: &PegArena, schema_to_grammar: &dyn SchemaToGrammar, lazy: bool) -> String {
    let mut emitter = GrammarEmitter { arena, schema_to_grammar, defs: HashMap::new(), order: Vec::new() };

    let root_body = if lazy {
        let mut triggers: Vec<(String, ParserId)> = Vec::new();
        for (id, node) in enumerate_parsers(arena) {
            if let ParserNode::Rule { name, child, trigger: true } = node {
                triggers.push((name.clone(), *child));
                let _ = id;
            }
        }
        triggers.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, child) in &triggers {
            emitter.ensure_rule(name, *child);
        }
        triggers.into_iter().map(|(name, _)| name).collect::<Vec<_>>().join(" | ")
    } else {
        let root_id = arena.root().expect("arena has no root set");
        emitter.expr(root_id)
    };

    let mut out = format!("root ::= {root_body}\n");
    for name in &emitter.order {
        let body = &emitter.defs[name];
        out.push_str(&format!("{name} ::= {body}\n"));
    }
    out
}

fn enumerate_parsers(arena: &PegArena) -> Vec<(ParserId, &ParserNode)> {
    (0..arena.size()).map(|id| (id, arena.get(id))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peg::builder::PegBuilder;
    use crate::schema::JsonSchemaToGbnf;

    #[test]
    fn emits_root_for_simple_literal() {
        let mut b = PegBuilder::new();
        let lit = b.literal("hello");
        b.set_root(&lit);
        let arena = b.build();
        let sink = JsonSchemaToGbnf;
        let g = build_grammar(&arena, &sink, false);
        assert!(g.starts_with("root ::= \"hello\""));
    }

    #[test]
    fn lazy_mode_unions_trigger_rules() {
        let mut b = PegBuilder::new();
        let a = b.literal("a");
        let rule_a = b.trigger_rule("rule_a", &a);
        let c = b.literal("c");
        let rule_c = b.trigger_rule("rule_c", &c);
        let both = b.choice(vec![rule_a.id(), rule_c.id()]);
        b.set_root(&both);
        let arena = b.build();
        let sink = JsonSchemaToGbnf;
        let g = build_grammar(&arena, &sink, true);
        assert!(g.starts_with("root ::= rule_a | rule_c"));
        assert!(g.contains("rule_a ::= \"a\""));
        assert!(g.contains("rule_c ::= \"c\""));
    }
}
