//! Reasoning-tag parsing, shared by every dialect that wraps chain-of-thought
//! in a pair of sentinel tags (`<think>...</think>`, `<seed:think>...`, etc.)
//! rather than using a dedicated channel.

use llama_chat_types::{ParseError, ReasoningFormat};

use crate::parser::Parser;
use crate::regex_partial::find_partial_stop;

#[derive(Debug, Clone)]
pub struct ReasoningTagFormat {
    pub start_think: String,
    pub end_think: String,
    pub thinking_forced_open: bool,
    pub reasoning_format: ReasoningFormat,
    pub reasoning_in_content: bool,
}

/// Consume zero or more `start_think ... end_think` blocks anywhere ahead of
/// the cursor, routing each block's body to `reasoning_content` or, when
/// `reasoning_in_content`, back into `content` wrapped in the original tags.
/// Text between blocks (and after the last one) is shunted to `content` as
/// it's passed over, so several blocks separated by plain text each become
/// their own reasoning segment instead of only the first one being found.
/// Returns `Ok(true)` if at least one reasoning block (or a forced-open
/// tail) was consumed.
pub fn try_consume_reasoning(parser: &mut Parser, format: &ReasoningTagFormat) -> Result<bool, ParseError> {
    if matches!(format.reasoning_format, ReasoningFormat::None) {
        return Ok(false);
    }

    let mut consumed_any = false;
    loop {
        let before = parser.pos();
        match parser.try_find_literal(&format.start_think) {
            Ok(Some(prelude)) => {
                parser.add_content(&prelude);
                consume_one_block(parser, format, true)?;
                consumed_any = true;
            }
            Ok(None) => {
                if !consumed_any && format.thinking_forced_open && before == 0 {
                    consume_one_block(parser, format, false)?;
                    consumed_any = true;
                }
                break;
            }
            Err(ParseError::Partial) => return Err(ParseError::Partial),
            Err(e) => return Err(e),
        }
    }
    Ok(consumed_any)
}

/// `tag_already_consumed`: whether `start_think` was already consumed by the
/// caller (forced-open mode synthesizes the open tag instead of matching it).
fn consume_one_block(parser: &mut Parser, format: &ReasoningTagFormat, tag_already_consumed: bool) -> Result<(), ParseError> {
    match parser.try_find_literal(&format.end_think) {
        Ok(Some(body)) => {
            emit_reasoning(parser, format, &body, tag_already_consumed, true);
            Ok(())
        }
        Ok(None) | Err(ParseError::Partial) => {
            let remaining = parser.remaining();
            let boundary = find_partial_stop(remaining, &format.end_think).unwrap_or(remaining.len());
            let body = remaining[..boundary].to_string();
            parser.set_pos(parser.input().len());
            emit_reasoning(parser, format, &body, tag_already_consumed, false);
            if parser.is_partial() {
                Err(ParseError::Partial)
            } else {
                Ok(())
            }
        }
        Err(e) => Err(e),
    }
}

fn emit_reasoning(parser: &mut Parser, format: &ReasoningTagFormat, body: &str, tag_already_consumed: bool, tag_closed: bool) {
    if format.reasoning_in_content {
        if tag_already_consumed {
            parser.add_content(&format.start_think);
        }
        parser.add_content(body);
        if tag_closed {
            parser.add_content(&format.end_think);
        }
    } else {
        parser.add_reasoning_content(body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format() -> ReasoningTagFormat {
        ReasoningTagFormat {
            start_think: "<think>".into(),
            end_think: "</think>".into(),
            thinking_forced_open: false,
            reasoning_format: ReasoningFormat::Auto,
            reasoning_in_content: false,
        }
    }

    #[test]
    fn single_block_routes_to_reasoning_content() {
        let mut p = Parser::new("<think>hmm</think>answer", false);
        assert!(try_consume_reasoning(&mut p, &format()).unwrap());
        assert_eq!(p.result.reasoning_content, "hmm");
        assert_eq!(p.remaining(), "answer");
    }

    #[test]
    fn multiple_blocks_each_become_separate_reasoning() {
        let mut p = Parser::new("<think>a</think>mid<think>b</think>end", false);
        assert!(try_consume_reasoning(&mut p, &format()).unwrap());
        assert_eq!(p.result.reasoning_content, "ab");
        assert_eq!(p.result.content, "mid");
        assert_eq!(p.remaining(), "end");
    }

    #[test]
    fn no_start_tag_is_a_noop() {
        let mut p = Parser::new("plain content", false);
        assert!(!try_consume_reasoning(&mut p, &format()).unwrap());
        assert_eq!(p.remaining(), "plain content");
    }

    #[test]
    fn partial_closing_tag_waits_for_more_input() {
        let mut p = Parser::new("<think>still thinking</th", true);
        let err = try_consume_reasoning(&mut p, &format()).unwrap_err();
        assert!(matches!(err, ParseError::Partial));
        assert_eq!(p.result.reasoning_content, "still thinking");
    }

    #[test]
    fn forced_open_with_no_start_tag_treats_whole_tail_as_reasoning() {
        let mut fmt = format();
        fmt.thinking_forced_open = true;
        let mut p = Parser::new("still reasoning here</think>answer", false);
        assert!(try_consume_reasoning(&mut p, &fmt).unwrap());
        assert_eq!(p.result.reasoning_content, "still reasoning here");
        assert_eq!(p.remaining(), "answer");
    }

    #[test]
    fn reasoning_in_content_wraps_body_back_in_tags() {
        let mut fmt = format();
        fmt.reasoning_in_content = true;
        let mut p = Parser::new("<think>hmm</think>answer", false);
        assert!(try_consume_reasoning(&mut p, &fmt).unwrap());
        assert_eq!(p.result.content, "<think>hmm</think>");
        assert_eq!(p.remaining(), "answer");
    }
}
