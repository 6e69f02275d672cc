//! Textual path grammar: `$.a.b[0:2]['x','y'][?(@.n > 1)]` and similar,
//! compiled into a [`Step`] list. See spec grammar in the crate's
//! top-level documentation for the full EBNF.
//!
//! On an unrecognised token, parsing stops at that offset and returns
//! the steps accumulated so far ([`parse`] returns the residual
//! alongside them) — the one exception is a reserved `**` token, which
//! is rejected outright rather than silently truncating the path,
//! since it is *recognised* grammar, just not yet given semantics.

use std::rc::Rc;

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{alpha1, alphanumeric1, char, digit1, multispace0};
use nom::combinator::{map, opt, recognize};
use nom::error::{Error as NomError, ErrorKind};
use nom::multi::many0;
use nom::sequence::{pair, preceded};
use nom::IResult;

use crate::error::{Error, Result};
use crate::node::Scalar;
use crate::path::step::{Match, Step};
use crate::predicate::Expr;

type PResult<'a, T> = IResult<&'a str, T>;

/// The result of parsing a path: the compiled steps plus whatever
/// suffix was left unread.
#[derive(Debug)]
pub struct Parsed {
    pub steps: Vec<Step>,
    pub residual: String,
}

pub fn parse(input: &str) -> Result<Parsed> {
    let rest = match input.strip_prefix('$').or_else(|| input.strip_prefix('@')) {
        Some(rest) => rest,
        None => {
            return Err(Error::Parse { offset: 0, message: "path must start with '$' or '@'".into() })
        }
    };
    let (steps, residual) = parse_steps(rest)?;
    Ok(Parsed { steps, residual: residual.to_string() })
}

/// Shared by the top-level parser and embedded `$...`/`@...` sub-paths
/// inside a predicate term: consume as many `step` productions as
/// possible and stop (without erroring) at the first byte that isn't
/// the start of a valid step — operators, `)`, `&&`, `||` all fall out
/// naturally this way, since every step starts with `.`, `/`, or `[`.
fn parse_steps(mut input: &str) -> Result<(Vec<Step>, &str)> {
    let mut steps = Vec::new();
    let mut last_was_deep = false;
    loop {
        if input.starts_with("**") {
            return Err(Error::Parse {
                offset: 0,
                message: "'**' is reserved and has no defined behavior".into(),
            });
        }
        // `..`/`//` already act as the separator for what follows, so a
        // bare key/index/`*` may immediately trail a `deep` step with no
        // further `.`/`/` in between (`$..items`, not `$../items`).
        let parsed = if last_was_deep { step_after_deep(input) } else { step(input) };
        match parsed {
            Ok((rest, s)) => {
                let (rest2, filter) = opt(predicate_suffix)(rest)
                    .map_err(|_| Error::Parse { offset: 0, message: "malformed predicate".into() })?;
                last_was_deep = matches!(s.kind, Match::Deep);
                steps.push(s);
                // `key[?…]` filters the *children* of what `key` yields,
                // not `key` itself — compile it the same as `key[*][?…]`:
                // a synthetic wildcard step carries the filter, so the
                // step engine binds `@` to each child in turn.
                if let Some(expr) = filter {
                    last_was_deep = false;
                    let wildcard = Match::Slice { start: 0, end: -1, step: 1 };
                    steps.push(Step::new(wildcard).with_filter(expr));
                }
                input = rest2;
            }
            Err(_) => break,
        }
    }
    Ok((steps, input))
}

fn step(input: &str) -> PResult<Step> {
    alt((deep_step, bracket_step, sep_step))(input).map(|(rest, kind)| (rest, Step::new(kind)))
}

/// Same as [`step`], plus a bare key/index/`*` with no leading separator
/// — only valid directly after a `deep` step, whose `..`/`//` token
/// already serves as the separator.
fn step_after_deep(input: &str) -> PResult<Step> {
    alt((deep_step, bracket_step, sep_step, bare_step))(input).map(|(rest, kind)| (rest, Step::new(kind)))
}

fn bare_step(input: &str) -> PResult<Match> {
    alt((
        map(char('*'), |_| Match::Slice { start: 0, end: -1, step: 1 }),
        map(array_index, Match::Index),
        map(ident, |s: &str| Match::Key(s.to_string())),
    ))(input)
}

fn deep_step(input: &str) -> PResult<Match> {
    map(alt((tag(".."), tag("//"))), |_| Match::Deep)(input)
}

fn sep(input: &str) -> PResult<char> {
    alt((char('.'), char('/')))(input)
}

fn sep_step(input: &str) -> PResult<Match> {
    let (input, _) = sep(input)?;
    alt((
        map(char('*'), |_| Match::Slice { start: 0, end: -1, step: 1 }),
        map(array_index, Match::Index),
        map(ident, |s: &str| Match::Key(s.to_string())),
    ))(input)
}

fn bracket_step(input: &str) -> PResult<Match> {
    let (input, _) = char('[')(input)?;
    let (input, m) = bracket_body(input)?;
    let (input, _) = char(']')(input)?;
    Ok((input, m))
}

fn bracket_body(input: &str) -> PResult<Match> {
    alt((
        map(char('*'), |_| Match::Slice { start: 0, end: -1, step: 1 }),
        quoted_keys,
        numeric_bracket,
    ))(input)
}

fn ident(input: &str) -> PResult<&str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn array_index(input: &str) -> PResult<i64> {
    let (input, text) = recognize(pair(opt(char('-')), digit1))(input)?;
    text.parse::<i64>()
        .map(|v| (input, v))
        .map_err(|_| nom::Err::Error(NomError::new(input, ErrorKind::Digit)))
}

fn numeric_bracket(input: &str) -> PResult<Match> {
    let (input, first) = array_index(input)?;
    if let Ok((input, _)) = char::<&str, NomError<&str>>(':')(input) {
        let (input, end) = opt(array_index)(input)?;
        let (input, second_colon) = opt(char(':'))(input)?;
        let (input, step) = if second_colon.is_some() {
            opt(array_index)(input)?
        } else {
            (input, None)
        };
        let m = Match::Slice { start: first, end: end.unwrap_or(-1), step: step.unwrap_or(1) };
        return Ok((input, m));
    }
    let (input, rest) = many0(preceded(char(','), array_index))(input)?;
    if rest.is_empty() {
        Ok((input, Match::Index(first)))
    } else {
        let mut all = vec![first];
        all.extend(rest);
        Ok((input, Match::Indexes(all)))
    }
}

fn quoted_keys(input: &str) -> PResult<Match> {
    let (input, first) = quoted_key(input)?;
    let (input, rest) = many0(preceded(char(','), quoted_key))(input)?;
    if rest.is_empty() {
        Ok((input, Match::Key(first)))
    } else {
        let mut all = vec![first];
        all.extend(rest);
        Ok((input, Match::Keys(all)))
    }
}

/// `'...'`, where `\X` is an escape that simply emits `X` literally —
/// there is no interpreted escape table beyond "the backslash itself
/// does not appear in the value".
fn quoted_key(input: &str) -> PResult<String> {
    let rest = input
        .strip_prefix('\'')
        .ok_or_else(|| nom::Err::Error(NomError::new(input, ErrorKind::Char)))?;
    let mut value = String::new();
    let mut skip = false;
    for (i, c) in rest.char_indices() {
        if skip {
            value.push(c);
            skip = false;
            continue;
        }
        match c {
            '\\' => skip = true,
            '\'' => return Ok((&rest[i + c.len_utf8()..], value)),
            _ => value.push(c),
        }
    }
    Err(nom::Err::Error(NomError::new(input, ErrorKind::Eof)))
}

/// `[?` condition `]`, attached to the step that was just parsed.
fn predicate_suffix(input: &str) -> PResult<Expr> {
    let (input, _) = tag("[?")(input)?;
    let (input, _) = multispace0(input)?;
    let (input, has_paren) = opt(char('('))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, expr) = condition(input)?;
    let (input, _) = multispace0(input)?;
    let input = if has_paren.is_some() { char(')')(input)?.0 } else { input };
    let (input, _) = multispace0(input)?;
    let (input, _) = char(']')(input)?;
    Ok((input, expr))
}

fn condition(input: &str) -> PResult<Expr> {
    let (mut input, mut lhs) = test(input)?;
    loop {
        let (rest, _) = multispace0(input)?;
        let Ok((rest, op)) = alt((tag("&&"), tag("||")))(rest) else { break };
        let (rest, _) = multispace0(rest)?;
        let (rest, rhs) = test(rest)?;
        lhs = if op == "&&" {
            Expr::And(Box::new(lhs), Box::new(rhs))
        } else {
            Expr::Or(Box::new(lhs), Box::new(rhs))
        };
        input = rest;
    }
    Ok((input, lhs))
}

fn test(input: &str) -> PResult<Expr> {
    let (input, lhs) = term(input)?;
    let (input, _) = multispace0(input)?;
    let op = alt((
        tag("=="),
        tag("!="),
        tag("<="),
        tag(">="),
        tag("<"),
        tag(">"),
        tag("~="),
    ))(input);
    match op {
        Ok((input, op)) => {
            let (input, _) = multispace0(input)?;
            let (input, rhs) = term(input)?;
            let expr = match op {
                "==" => Expr::Eq(Box::new(lhs), Box::new(rhs)),
                "!=" => Expr::Neq(Box::new(lhs), Box::new(rhs)),
                "<" => Expr::Lt(Box::new(lhs), Box::new(rhs)),
                "<=" => Expr::Lte(Box::new(lhs), Box::new(rhs)),
                ">" => Expr::Gt(Box::new(lhs), Box::new(rhs)),
                ">=" => Expr::Gte(Box::new(lhs), Box::new(rhs)),
                "~=" => {
                    let pattern = match &rhs {
                        Expr::Literal(Scalar::String(s)) => s.clone(),
                        _ => {
                            return Err(nom::Err::Failure(NomError::new(
                                input,
                                ErrorKind::Tag,
                            )))
                        }
                    };
                    // `is_match` is an unanchored search, matching the
                    // POSIX-extended substring semantics this operator
                    // has in the original tool.
                    let re = regex::Regex::new(&pattern)
                        .map_err(|_| nom::Err::Failure(NomError::new(input, ErrorKind::Tag)))?;
                    Expr::Regex(Box::new(lhs), Rc::new(re))
                }
                _ => unreachable!(),
            };
            Ok((input, expr))
        }
        Err(_) => Ok((input, lhs)),
    }
}

fn term(input: &str) -> PResult<Expr> {
    let (input, _) = multispace0(input)?;
    alt((
        map(preceded(char('!'), term), |e| Expr::Not(Box::new(e))),
        sub_path_term,
        number_term,
        string_term,
        map(tag("true"), |_| Expr::Literal(Scalar::Bool(true))),
        map(tag("false"), |_| Expr::Literal(Scalar::Bool(false))),
        map(tag("null"), |_| Expr::Literal(Scalar::Null)),
        paren_term,
    ))(input)
}

fn sub_path_term(input: &str) -> PResult<Expr> {
    let (input, root) = alt((char('$'), char('@')))(input)?;
    let (steps, residual) =
        parse_steps(input).map_err(|_| nom::Err::Error(NomError::new(input, ErrorKind::Fail)))?;
    Ok((residual, Expr::SubPath { absolute: root == '$', steps: Rc::from(steps) }))
}

fn number_term(input: &str) -> PResult<Expr> {
    let (input, text) =
        recognize(pair(opt(char('-')), pair(digit1, opt(pair(char('.'), digit1)))))(input)?;
    let value: f64 = text.parse().map_err(|_| nom::Err::Error(NomError::new(input, ErrorKind::Float)))?;
    let integer = !text.contains('.');
    Ok((input, Expr::Literal(Scalar::Number { value, integer })))
}

fn string_term(input: &str) -> PResult<Expr> {
    map(quoted_key, |s| Expr::Literal(Scalar::String(s)))(input)
}

fn paren_term(input: &str) -> PResult<Expr> {
    let (input, _) = char('(')(input)?;
    let (input, _) = multispace0(input)?;
    let (input, expr) = condition(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char(')')(input)?;
    Ok((input, expr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_dot_path() {
        let parsed = parse("$.items[0].id").unwrap();
        assert_eq!(parsed.steps.len(), 3);
        assert!(matches!(parsed.steps[0].kind, Match::Key(ref k) if k == "items"));
        assert!(matches!(parsed.steps[1].kind, Match::Index(0)));
        assert!(matches!(parsed.steps[2].kind, Match::Key(ref k) if k == "id"));
        assert_eq!(parsed.residual, "");
    }

    #[test]
    fn parses_slice() {
        let parsed = parse("$[1:4:2]").unwrap();
        assert_eq!(parsed.steps.len(), 1);
        assert!(matches!(parsed.steps[0].kind, Match::Slice { start: 1, end: 4, step: 2 }));
    }

    #[test]
    fn parses_key_list() {
        let parsed = parse("$['x','z']").unwrap();
        assert!(matches!(&parsed.steps[0].kind, Match::Keys(v) if v == &["x".to_string(), "z".to_string()]));
    }

    #[test]
    fn parses_deep_with_filter() {
        let parsed = parse("$..items[?(@.type=='a')].id").unwrap();
        // `items[?…]` compiles as `items` followed by a synthetic
        // wildcard step carrying the filter, so the predicate is
        // evaluated against each element of `items` rather than the
        // array itself.
        assert_eq!(parsed.steps.len(), 4);
        assert!(matches!(parsed.steps[0].kind, Match::Deep));
        assert!(matches!(parsed.steps[1].kind, Match::Key(ref k) if k == "items"));
        assert!(parsed.steps[1].filter.is_none());
        assert!(matches!(parsed.steps[2].kind, Match::Slice { start: 0, end: -1, step: 1 }));
        assert!(parsed.steps[2].filter.is_some());
        assert!(matches!(parsed.steps[3].kind, Match::Key(ref k) if k == "id"));
    }

    #[test]
    fn rejects_reserved_double_star() {
        assert!(parse("$.a**").is_err());
    }

    #[test]
    fn stops_at_unrecognised_token() {
        let parsed = parse("$.a???").unwrap();
        assert_eq!(parsed.steps.len(), 1);
        assert_eq!(parsed.residual, "???");
    }
}
