//! The parser node arena: storage, parse dispatch, ref resolution and
//! (de)serialization. See `peg::builder` for the ergonomic construction API
//! and `peg::grammar` for GBNF emission.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::regex_partial::find_partial_stop;

pub type ParserId = usize;
pub type AstId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseResultType {
    Fail,
    Success,
    NeedMoreInput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AstNode {
    pub id: AstId,
    pub rule: String,
    pub tag: String,
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub children: Vec<AstId>,
    pub is_partial: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AstArena {
    nodes: Vec<AstNode>,
}

impl AstArena {
    #[allow(clippy::too_many_arguments)]
    pub fn add_node(
        &mut self,
        rule: &str,
        tag: &str,
        start: usize,
        end: usize,
        text: &str,
        children: Vec<AstId>,
        is_partial: bool,
    ) -> AstId {
        let id = self.nodes.len();
        self.nodes.push(AstNode {
            id,
            rule: rule.to_string(),
            tag: tag.to_string(),
            start,
            end,
            text: text.to_string(),
            children,
            is_partial,
        });
        id
    }

    pub fn get(&self, id: AstId) -> &AstNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Depth-first walk starting at `id`, visiting children before the
    /// parent is returned to the caller? No: parent first, matching the
    /// order nodes were produced (outer rule, then its children).
    pub fn visit(&self, id: AstId, visitor: &mut impl FnMut(&AstNode)) {
        let node = self.get(id);
        visitor(node);
        for &child in &node.children.clone() {
            self.visit(child, visitor);
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParseResult {
    pub ty: ParseResultType,
    pub start: usize,
    pub end: usize,
    pub nodes: Vec<AstId>,
}

impl ParseResult {
    pub fn fail(start: usize) -> Self {
        Self { ty: ParseResultType::Fail, start, end: start, nodes: Vec::new() }
    }

    pub fn success(start: usize, end: usize, nodes: Vec<AstId>) -> Self {
        Self { ty: ParseResultType::Success, start, end, nodes }
    }

    pub fn need_more_input(start: usize, end: usize, nodes: Vec<AstId>) -> Self {
        Self { ty: ParseResultType::NeedMoreInput, start, end, nodes }
    }

    pub fn is_fail(&self) -> bool {
        self.ty == ParseResultType::Fail
    }

    pub fn is_success(&self) -> bool {
        self.ty == ParseResultType::Success
    }

    pub fn is_need_more_input(&self) -> bool {
        self.ty == ParseResultType::NeedMoreInput
    }
}

pub struct ParseContext<'a> {
    pub input: &'a str,
    pub is_partial: bool,
    pub ast: AstArena,
    depth: usize,
}

impl<'a> ParseContext<'a> {
    pub fn new(input: &'a str, is_partial: bool) -> Self {
        Self { input, is_partial, ast: AstArena::default(), depth: 0 }
    }
}

const MAX_PARSE_DEPTH: usize = 512;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ParserNode {
    Epsilon,
    Start,
    End,
    Literal { value: String },
    Sequence { children: Vec<ParserId> },
    Choice { children: Vec<ParserId> },
    Repetition { child: ParserId, min: i64, max: i64 },
    And { child: ParserId },
    Not { child: ParserId },
    Any,
    Space,
    Chars { ranges: Vec<(u32, u32)>, negated: bool, min: i64, max: i64 },
    JsonString,
    Until { delimiters: Vec<String> },
    Schema { child: ParserId, name: String, schema: serde_json::Value, raw: bool },
    Rule { name: String, child: ParserId, trigger: bool },
    Ref { name: String },
    Atomic { child: ParserId },
    Tag { child: ParserId, tag: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PegArena {
    parsers: Vec<ParserNode>,
    rules: HashMap<String, ParserId>,
    root: Option<ParserId>,
}

impl PegArena {
    pub fn get(&self, id: ParserId) -> &ParserNode {
        &self.parsers[id]
    }

    pub fn get_mut(&mut self, id: ParserId) -> &mut ParserNode {
        &mut self.parsers[id]
    }

    pub fn size(&self) -> usize {
        self.parsers.len()
    }

    pub fn add_parser(&mut self, node: ParserNode) -> ParserId {
        let id = self.parsers.len();
        self.parsers.push(node);
        id
    }

    pub fn add_rule(&mut self, name: &str, id: ParserId) {
        self.rules.insert(name.to_string(), id);
    }

    pub fn get_rule(&self, name: &str) -> Option<ParserId> {
        self.rules.get(name).copied()
    }

    pub fn has_rule(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &String> {
        self.rules.keys()
    }

    pub fn root(&self) -> Option<ParserId> {
        self.root
    }

    pub fn set_root(&mut self, id: ParserId) {
        self.root = Some(id);
    }

    /// Rewires every `Ref(name)` occurrence reachable as a child id into the
    /// resolved rule id directly. Ref nodes themselves are left in place
    /// (parsing a `Ref` id still works, it just indirects once more).
    pub fn resolve_refs(&mut self) {
        let resolved: HashMap<ParserId, ParserId> = self
            .parsers
            .iter()
            .enumerate()
            .filter_map(|(id, p)| match p {
                ParserNode::Ref { name } => self.rules.get(name).map(|&target| (id, target)),
                _ => None,
            })
            .collect();
        if resolved.is_empty() {
            return;
        }
        let remap = |id: &mut ParserId| {
            // Follow chains in case a Ref points at another Ref.
            let mut cur = *id;
            let mut guard = 0;
            while let Some(&next) = resolved.get(&cur) {
                cur = next;
                guard += 1;
                if guard > self.parsers.len() + 1 {
                    break;
                }
            }
            *id = cur;
        };
        for parser in &mut self.parsers {
            match parser {
                ParserNode::Sequence { children } | ParserNode::Choice { children } => {
                    for c in children {
                        remap(c);
                    }
                }
                ParserNode::Repetition { child, .. }
                | ParserNode::And { child }
                | ParserNode::Not { child }
                | ParserNode::Schema { child, .. }
                | ParserNode::Rule { child, .. }
                | ParserNode::Atomic { child }
                | ParserNode::Tag { child, .. } => remap(child),
                _ => {}
            }
        }
        if let Some(root) = &mut self.root {
            remap(root);
        }
    }

    pub fn parse(&self, ctx: &mut ParseContext, start: usize) -> ParseResult {
        let root = self.root.expect("arena has no root set");
        self.parse_id(root, ctx, start)
    }

    pub fn parse_id(&self, id: ParserId, ctx: &mut ParseContext, start: usize) -> ParseResult {
        if ctx.depth >= MAX_PARSE_DEPTH {
            return ParseResult::fail(start);
        }
        ctx.depth += 1;
        let result = self.parse_id_inner(id, ctx, start);
        ctx.depth -= 1;
        result
    }

    fn parse_id_inner(&self, id: ParserId, ctx: &mut ParseContext, start: usize) -> ParseResult {
        let input = ctx.input;
        let len = input.len();
        match &self.parsers[id] {
            ParserNode::Epsilon => ParseResult::success(start, start, Vec::new()),
            ParserNode::Start => {
                if start == 0 {
                    ParseResult::success(start, start, Vec::new())
                } else {
                    ParseResult::fail(start)
                }
            }
            ParserNode::End => {
                if start == len {
                    ParseResult::success(start, start, Vec::new())
                } else {
                    ParseResult::fail(start)
                }
            }
            ParserNode::Literal { value } => self.parse_literal(value, ctx, start),
            ParserNode::Sequence { children } => self.parse_sequence(children, ctx, start),
            ParserNode::Choice { children } => self.parse_choice(children, ctx, start),
            ParserNode::Repetition { child, min, max } => {
                self.parse_repetition(*child, *min, *max, ctx, start)
            }
            ParserNode::And { child } => {
                let r = self.parse_id(*child, ctx, start);
                match r.ty {
                    ParseResultType::Success => ParseResult::success(start, start, Vec::new()),
                    ParseResultType::Fail => ParseResult::fail(start),
                    ParseResultType::NeedMoreInput => ParseResult::need_more_input(start, start, Vec::new()),
                }
            }
            ParserNode::Not { child } => {
                let r = self.parse_id(*child, ctx, start);
                match r.ty {
                    ParseResultType::Success => ParseResult::fail(start),
                    ParseResultType::Fail => ParseResult::success(start, start, Vec::new()),
                    ParseResultType::NeedMoreInput => ParseResult::need_more_input(start, start, Vec::new()),
                }
            }
            ParserNode::Any => {
                match input[start..].chars().next() {
                    Some(c) => ParseResult::success(start, start + c.len_utf8(), Vec::new()),
                    None => {
                        if ctx.is_partial {
                            ParseResult::need_more_input(start, start, Vec::new())
                        } else {
                            ParseResult::fail(start)
                        }
                    }
                }
            }
            ParserNode::Space => {
                let whitespace = [(0x09, 0x0d), (0x20, 0x20)];
                self.parse_chars(&whitespace, false, 0, -1, ctx, start)
            }
            ParserNode::Chars { ranges, negated, min, max } => {
                self.parse_chars(ranges, *negated, *min, *max, ctx, start)
            }
            ParserNode::JsonString => self.parse_json_string_content(ctx, start),
            ParserNode::Until { delimiters } => self.parse_until(delimiters, ctx, start),
            ParserNode::Schema { child, .. } => self.parse_id(*child, ctx, start),
            ParserNode::Rule { name, child, .. } => self.parse_rule(name, "", *child, ctx, start),
            ParserNode::Tag { child, tag } => self.parse_rule("", tag, *child, ctx, start),
            ParserNode::Atomic { child } => {
                let r = self.parse_id(*child, ctx, start);
                if r.is_need_more_input() {
                    ParseResult::need_more_input(r.start, r.end, Vec::new())
                } else {
                    r
                }
            }
            ParserNode::Ref { name } => match self.rules.get(name) {
                Some(&target) => self.parse_id(target, ctx, start),
                None => ParseResult::fail(start),
            },
        }
    }

    fn parse_literal(&self, literal: &str, ctx: &ParseContext, start: usize) -> ParseResult {
        let rest = &ctx.input[start..];
        if literal.is_empty() {
            return ParseResult::success(start, start, Vec::new());
        }
        if rest.len() >= literal.len() {
            if rest.as_bytes()[..literal.len()] == *literal.as_bytes() {
                ParseResult::success(start, start + literal.len(), Vec::new())
            } else {
                ParseResult::fail(start)
            }
        } else if literal.as_bytes()[..rest.len()] == *rest.as_bytes() {
            if ctx.is_partial {
                ParseResult::need_more_input(start, ctx.input.len(), Vec::new())
            } else {
                ParseResult::fail(start)
            }
        } else {
            ParseResult::fail(start)
        }
    }

    fn parse_sequence(&self, children: &[ParserId], ctx: &mut ParseContext, start: usize) -> ParseResult {
        let mut cur = start;
        let mut nodes = Vec::new();
        for &child in children {
            let r = self.parse_id(child, ctx, cur);
            match r.ty {
                ParseResultType::Fail => return ParseResult::fail(start),
                ParseResultType::NeedMoreInput => {
                    nodes.extend(r.nodes);
                    return ParseResult::need_more_input(start, r.end, nodes);
                }
                ParseResultType::Success => {
                    cur = r.end;
                    nodes.extend(r.nodes);
                }
            }
        }
        ParseResult::success(start, cur, nodes)
    }

    fn parse_choice(&self, children: &[ParserId], ctx: &mut ParseContext, start: usize) -> ParseResult {
        for &child in children {
            let r = self.parse_id(child, ctx, start);
            if !r.is_fail() {
                return r;
            }
        }
        ParseResult::fail(start)
    }

    fn parse_repetition(
        &self,
        child: ParserId,
        min: i64,
        max: i64,
        ctx: &mut ParseContext,
        start: usize,
    ) -> ParseResult {
        let mut cur = start;
        let mut count = 0i64;
        let mut nodes = Vec::new();
        loop {
            if max >= 0 && count >= max {
                break;
            }
            let r = self.parse_id(child, ctx, cur);
            match r.ty {
                ParseResultType::Success => {
                    if r.end == cur {
                        // Zero-width match: stop, otherwise this loops forever.
                        break;
                    }
                    cur = r.end;
                    nodes.extend(r.nodes);
                    count += 1;
                }
                ParseResultType::NeedMoreInput => {
                    nodes.extend(r.nodes);
                    return ParseResult::need_more_input(start, r.end, nodes);
                }
                ParseResultType::Fail => break,
            }
        }
        if count >= min {
            ParseResult::success(start, cur, nodes)
        } else {
            ParseResult::fail(start)
        }
    }

    fn parse_chars(
        &self,
        ranges: &[(u32, u32)],
        negated: bool,
        min: i64,
        max: i64,
        ctx: &ParseContext,
        start: usize,
    ) -> ParseResult {
        let input = ctx.input;
        let mut cur = start;
        let mut count = 0i64;
        loop {
            if max >= 0 && count >= max {
                break;
            }
            match input[cur..].chars().next() {
                Some(c) => {
                    let in_class = ranges.iter().any(|&(lo, hi)| (c as u32) >= lo && (c as u32) <= hi);
                    if in_class != negated {
                        cur += c.len_utf8();
                        count += 1;
                    } else {
                        break;
                    }
                }
                None => {
                    if ctx.is_partial {
                        return ParseResult::need_more_input(start, cur, Vec::new());
                    }
                    break;
                }
            }
        }
        if count >= min {
            ParseResult::success(start, cur, Vec::new())
        } else {
            ParseResult::fail(start)
        }
    }

    fn parse_json_string_content(&self, ctx: &ParseContext, start: usize) -> ParseResult {
        let input = ctx.input;
        let mut cur = start;
        loop {
            match input[cur..].chars().next() {
                None => {
                    return if ctx.is_partial {
                        ParseResult::need_more_input(start, cur, Vec::new())
                    } else {
                        ParseResult::fail(start)
                    };
                }
                Some('"') => return ParseResult::success(start, cur, Vec::new()),
                Some('\\') => {
                    let esc_start = cur;
                    cur += 1;
                    match input[cur..].chars().next() {
                        None => {
                            return if ctx.is_partial {
                                ParseResult::need_more_input(start, esc_start, Vec::new())
                            } else {
                                ParseResult::fail(start)
                            };
                        }
                        Some('u') => {
                            let hex_start = cur + 1;
                            if input.len() - hex_start < 4 {
                                return if ctx.is_partial {
                                    ParseResult::need_more_input(start, esc_start, Vec::new())
                                } else {
                                    ParseResult::fail(start)
                                };
                            }
                            cur = hex_start + 4;
                        }
                        Some(c) => cur += c.len_utf8(),
                    }
                }
                Some(c) => cur += c.len_utf8(),
            }
        }
    }

    fn parse_until(&self, delimiters: &[String], ctx: &ParseContext, start: usize) -> ParseResult {
        let input = ctx.input;
        let len = input.len();
        let mut cur = start;
        loop {
            if !delimiters.is_empty() && delimiters.iter().any(|d| input[cur..].starts_with(d.as_str())) {
                return ParseResult::success(start, cur, Vec::new());
            }
            if cur >= len {
                if ctx.is_partial {
                    let mut boundary = cur;
                    for d in delimiters {
                        if let Some(b) = find_partial_stop(&input[start..cur], d) {
                            boundary = boundary.min(start + b);
                        }
                    }
                    return ParseResult::need_more_input(start, boundary, Vec::new());
                }
                return ParseResult::success(start, cur, Vec::new());
            }
            let c = input[cur..].chars().next().expect("cur < len");
            cur += c.len_utf8();
        }
    }

    fn parse_rule(
        &self,
        rule: &str,
        tag: &str,
        child: ParserId,
        ctx: &mut ParseContext,
        start: usize,
    ) -> ParseResult {
        let r = self.parse_id(child, ctx, start);
        if r.is_fail() {
            return r;
        }
        let is_partial = r.is_need_more_input();
        let text = ctx.input[start..r.end].to_string();
        let node_id = ctx.ast.add_node(rule, tag, start, r.end, &text, r.nodes, is_partial);
        ParseResult { ty: r.ty, start, end: r.end, nodes: vec![node_id] }
    }

    pub fn dump(&self, id: ParserId) -> String {
        format!("{:?}", self.parsers[id])
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("arena always serializes")
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }

    pub fn save(&self) -> String {
        serde_json::to_string(self).expect("arena always serializes")
    }

    pub fn load(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peg::builder::PegBuilder;

    #[test]
    fn literal_matches_exactly() {
        let mut b = PegBuilder::new();
        let p = b.literal("hi");
        b.set_root(&p);
        let arena = b.build();
        let mut ctx = ParseContext::new("hi there", false);
        let r = arena.parse(&mut ctx, 0);
        assert!(r.is_success());
        assert_eq!(r.end, 2);
    }

    #[test]
    fn literal_partial_tail_needs_more_input() {
        let mut b = PegBuilder::new();
        let p = b.literal("hello");
        b.set_root(&p);
        let arena = b.build();
        let mut ctx = ParseContext::new("hel", true);
        let r = arena.parse(&mut ctx, 0);
        assert!(r.is_need_more_input());
    }

    #[test]
    fn sequence_propagates_fail() {
        let mut b = PegBuilder::new();
        let a = b.literal("a");
        let z = b.literal("z");
        let seq = b.sequence(vec![a.id(), z.id()]);
        b.set_root(&seq);
        let arena = b.build();
        let mut ctx = ParseContext::new("ab", false);
        assert!(arena.parse(&mut ctx, 0).is_fail());
    }

    #[test]
    fn choice_picks_first_non_fail() {
        let mut b = PegBuilder::new();
        let a = b.literal("a");
        let c = b.literal("b");
        let choice = b.choice(vec![a.id(), c.id()]);
        b.set_root(&choice);
        let arena = b.build();
        let mut ctx = ParseContext::new("b", false);
        let r = arena.parse(&mut ctx, 0);
        assert!(r.is_success());
        assert_eq!(r.end, 1);
    }

    #[test]
    fn rule_produces_ast_node() {
        let mut b = PegBuilder::new();
        let lit = b.literal("x");
        let rule = b.rule("x_rule", &lit, false);
        b.set_root(&rule);
        let arena = b.build();
        let mut ctx = ParseContext::new("x", false);
        let r = arena.parse(&mut ctx, 0);
        assert_eq!(r.nodes.len(), 1);
        let node = ctx.ast.get(r.nodes[0]);
        assert_eq!(node.rule, "x_rule");
        assert_eq!(node.text, "x");
    }

    #[test]
    fn ref_resolves_to_named_rule() {
        let mut b = PegBuilder::new();
        let lit = b.literal("y");
        let rule = b.rule("y_rule", &lit, false);
        b.set_root(&rule);
        let reference = b.reference("y_rule");
        let arena_root_via_ref = {
            let mut b2 = PegBuilder::new();
            let lit2 = b2.literal("y");
            b2.rule("y_rule", &lit2, false);
            let r = b2.reference("y_rule");
            b2.set_root(&r);
            let mut a2 = b2.build();
            a2.resolve_refs();
            a2
        };
        let _ = reference;
        let mut ctx = ParseContext::new("y", false);
        assert!(arena_root_via_ref.parse(&mut ctx, 0).is_success());
        let _ = rule;
    }

    #[test]
    fn atomic_suppresses_partial_ast() {
        let mut b = PegBuilder::new();
        let lit = b.literal("abc");
        let rule = b.rule("r", &lit, false);
        let atomic = b.atomic(&rule);
        b.set_root(&atomic);
        let arena = b.build();
        let mut ctx = ParseContext::new("ab", true);
        let r = arena.parse(&mut ctx, 0);
        assert!(r.is_need_more_input());
        assert!(r.nodes.is_empty());
    }

    #[test]
    fn until_stops_before_delimiter() {
        let mut b = PegBuilder::new();
        let u = b.until("STOP");
        b.set_root(&u);
        let arena = b.build();
        let mut ctx = ParseContext::new("helloSTOP", false);
        let r = arena.parse(&mut ctx, 0);
        assert!(r.is_success());
        assert_eq!(&ctx.input[r.start..r.end], "hello");
    }

    #[test]
    fn until_detects_partial_trailing_delimiter() {
        let mut b = PegBuilder::new();
        let u = b.until("STOP");
        b.set_root(&u);
        let arena = b.build();
        let mut ctx = ParseContext::new("helloST", true);
        let r = arena.parse(&mut ctx, 0);
        assert!(r.is_need_more_input());
        assert_eq!(&ctx.input[r.start..r.end], "hello");
    }

    #[test]
    fn repetition_enforces_minimum() {
        let mut b = PegBuilder::new();
        let a = b.literal("a");
        let rep = b.repeat(&a, 2, -1);
        b.set_root(&rep);
        let arena = b.build();
        let mut ctx = ParseContext::new("a", false);
        assert!(arena.parse(&mut ctx, 0).is_fail());
    }

    #[test]
    fn save_and_load_round_trips() {
        let mut b = PegBuilder::new();
        let lit = b.literal("z");
        let rule = b.rule("z_rule", &lit, true);
        b.set_root(&rule);
        let arena = b.build();
        let dumped = arena.save();
        let loaded = PegArena::load(&dumped).unwrap();
        let mut ctx = ParseContext::new("z", false);
        assert!(loaded.parse(&mut ctx, 0).is_success());
    }
}
