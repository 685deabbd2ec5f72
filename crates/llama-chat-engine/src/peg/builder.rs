//! Ergonomic construction API for [`super::arena::PegArena`]. Dialect
//! parsers describe their grammar once, as a tree of `Node`s, and hand the
//! result to [`PegArena::parse`]/[`PegArena::build_grammar`].

use super::arena::{ParserId, ParserNode, PegArena};

/// A handle to a node already inserted into the arena being built.
#[derive(Debug, Clone, Copy)]
pub struct Node(ParserId);

impl Node {
    pub fn id(&self) -> ParserId {
        self.0
    }
}

impl From<Node> for ParserId {
    fn from(n: Node) -> Self {
        n.0
    }
}

#[derive(Debug, Default)]
pub struct PegBuilder {
    arena: PegArena,
}

impl PegBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, node: ParserNode) -> Node {
        Node(self.arena.add_parser(node))
    }

    pub fn eps(&mut self) -> Node {
        self.add(ParserNode::Epsilon)
    }

    pub fn start(&mut self) -> Node {
        self.add(ParserNode::Start)
    }

    pub fn end(&mut self) -> Node {
        self.add(ParserNode::End)
    }

    pub fn literal(&mut self, s: &str) -> Node {
        self.add(ParserNode::Literal { value: s.to_string() })
    }

    pub fn sequence(&mut self, parsers: Vec<ParserId>) -> Node {
        self.add(ParserNode::Sequence { children: parsers })
    }

    pub fn choice(&mut self, parsers: Vec<ParserId>) -> Node {
        self.add(ParserNode::Choice { children: parsers })
    }

    pub fn repeat(&mut self, p: &Node, min: i64, max: i64) -> Node {
        self.add(ParserNode::Repetition { child: p.id(), min, max })
    }

    pub fn repeat_exactly(&mut self, p: &Node, n: i64) -> Node {
        self.repeat(p, n, n)
    }

    pub fn one_or_more(&mut self, p: &Node) -> Node {
        self.repeat(p, 1, -1)
    }

    pub fn zero_or_more(&mut self, p: &Node) -> Node {
        self.repeat(p, 0, -1)
    }

    pub fn optional(&mut self, p: &Node) -> Node {
        self.repeat(p, 0, 1)
    }

    pub fn peek(&mut self, p: &Node) -> Node {
        self.add(ParserNode::And { child: p.id() })
    }

    pub fn negate(&mut self, p: &Node) -> Node {
        self.add(ParserNode::Not { child: p.id() })
    }

    pub fn any(&mut self) -> Node {
        self.add(ParserNode::Any)
    }

    pub fn space(&mut self) -> Node {
        self.add(ParserNode::Space)
    }

    /// `ranges` are inclusive codepoint bounds, e.g. `[('a' as u32, 'z' as u32)]`.
    pub fn chars(&mut self, ranges: Vec<(u32, u32)>, negated: bool, min: i64, max: i64) -> Node {
        self.add(ParserNode::Chars { ranges, negated, min, max })
    }

    pub fn reference(&mut self, name: &str) -> Node {
        self.add(ParserNode::Ref { name: name.to_string() })
    }

    pub fn until(&mut self, delimiter: &str) -> Node {
        self.add(ParserNode::Until { delimiters: vec![delimiter.to_string()] })
    }

    pub fn until_one_of(&mut self, delimiters: &[&str]) -> Node {
        self.add(ParserNode::Until { delimiters: delimiters.iter().map(|s| s.to_string()).collect() })
    }

    pub fn rest(&mut self) -> Node {
        self.add(ParserNode::Until { delimiters: Vec::new() })
    }

    pub fn json_string_content(&mut self) -> Node {
        self.add(ParserNode::JsonString)
    }

    pub fn json_string(&mut self) -> Node {
        let quote = self.literal("\"");
        let content = self.json_string_content();
        let close = self.literal("\"");
        self.sequence(vec![quote.id(), content.id(), close.id()])
    }

    pub fn json_number(&mut self) -> Node {
        let minus = self.optional_literal("-");
        let digits = self.chars(vec![('0' as u32, '9' as u32)], false, 1, -1);
        let dot = self.literal(".");
        let frac = self.chars(vec![('0' as u32, '9' as u32)], false, 1, -1);
        let frac_group = self.sequence(vec![dot.id(), frac.id()]);
        let frac_opt = self.optional(&frac_group);
        let exp_e = self.chars(vec![('e' as u32, 'e' as u32), ('E' as u32, 'E' as u32)], false, 1, 1);
        let exp_sign = self.chars(vec![('+' as u32, '+' as u32), ('-' as u32, '-' as u32)], false, 0, 1);
        let exp_digits = self.chars(vec![('0' as u32, '9' as u32)], false, 1, -1);
        let exp_group = self.sequence(vec![exp_e.id(), exp_sign.id(), exp_digits.id()]);
        let exp_opt = self.optional(&exp_group);
        self.sequence(vec![minus.id(), digits.id(), frac_opt.id(), exp_opt.id()])
    }

    fn optional_literal(&mut self, s: &str) -> Node {
        let lit = self.literal(s);
        self.optional(&lit)
    }

    pub fn json_bool(&mut self) -> Node {
        let t = self.literal("true");
        let f = self.literal("false");
        self.choice(vec![t.id(), f.id()])
    }

    pub fn json_null(&mut self) -> Node {
        self.literal("null")
    }

    pub fn json_array(&mut self) -> Node {
        let open = self.literal("[");
        let sp1 = self.space();
        let value = self.json();
        let comma_sp = self.space();
        let comma = self.literal(",");
        let comma_sp2 = self.space();
        let elem = self.sequence(vec![comma.id(), comma_sp2.id(), value.id()]);
        let rest = self.zero_or_more(&elem);
        let items = self.sequence(vec![value.id(), rest.id()]);
        let items_opt = self.optional(&items);
        let sp2 = self.space();
        let close = self.literal("]");
        let _ = comma_sp;
        self.sequence(vec![open.id(), sp1.id(), items_opt.id(), sp2.id(), close.id()])
    }

    pub fn json_member(&mut self, key: &str, value: &Node) -> Node {
        let key_lit = self.literal(&format!("\"{key}\""));
        let sp1 = self.space();
        let colon = self.literal(":");
        let sp2 = self.space();
        self.sequence(vec![key_lit.id(), sp1.id(), colon.id(), sp2.id(), value.id()])
    }

    pub fn json_object(&mut self) -> Node {
        let open = self.literal("{");
        let sp1 = self.space();
        let key = self.json_string();
        let sp2 = self.space();
        let colon = self.literal(":");
        let sp3 = self.space();
        let value = self.json();
        let member = self.sequence(vec![key.id(), sp2.id(), colon.id(), sp3.id(), value.id()]);
        let sp4 = self.space();
        let comma = self.literal(",");
        let sp5 = self.space();
        let next_member = self.sequence(vec![comma.id(), sp5.id(), member.id()]);
        let more = self.zero_or_more(&next_member);
        let members = self.sequence(vec![member.id(), more.id()]);
        let members_opt = self.optional(&members);
        let sp6 = self.space();
        let close = self.literal("}");
        let _ = sp4;
        self.sequence(vec![open.id(), sp1.id(), members_opt.id(), sp6.id(), close.id()])
    }

    pub fn json(&mut self) -> Node {
        let object = self.json_object();
        let array = self.json_array();
        let string = self.json_string();
        let number = self.json_number();
        let boolean = self.json_bool();
        let null = self.json_null();
        self.choice(vec![object.id(), array.id(), string.id(), number.id(), boolean.id(), null.id()])
    }

    pub fn schema(&mut self, p: &Node, name: &str, schema: serde_json::Value, raw: bool) -> Node {
        self.add(ParserNode::Schema { child: p.id(), name: name.to_string(), schema, raw })
    }

    pub fn rule(&mut self, name: &str, p: &Node, trigger: bool) -> Node {
        let node = self.add(ParserNode::Rule { name: name.to_string(), child: p.id(), trigger });
        self.arena.add_rule(name, node.id());
        node
    }

    pub fn trigger_rule(&mut self, name: &str, p: &Node) -> Node {
        self.rule(name, p, true)
    }

    pub fn atomic(&mut self, p: &Node) -> Node {
        self.add(ParserNode::Atomic { child: p.id() })
    }

    pub fn tag(&mut self, tag: &str, p: &Node) -> Node {
        self.add(ParserNode::Tag { child: p.id(), tag: tag.to_string() })
    }

    pub fn set_root(&mut self, p: &Node) {
        self.arena.set_root(p.id());
    }

    pub fn build(mut self) -> PegArena {
        self.arena.resolve_refs();
        self.arena
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peg::arena::ParseContext;

    #[test]
    fn json_object_parses_nested_values() {
        let mut b = PegBuilder::new();
        let v = b.json();
        b.set_root(&v);
        let arena = b.build();
        let mut ctx = ParseContext::new(r#"{"a": [1, 2, "x"], "b": true}"#, false);
        let r = arena.parse(&mut ctx, 0);
        assert!(r.is_success());
        assert_eq!(r.end, ctx.input.len());
    }

    #[test]
    fn json_member_matches_specific_key() {
        let mut b = PegBuilder::new();
        let num = b.json_number();
        let member = b.json_member("count", &num);
        b.set_root(&member);
        let arena = b.build();
        let mut ctx = ParseContext::new(r#""count": 42"#, false);
        assert!(arena.parse(&mut ctx, 0).is_success());
    }
}
