//! Textual surface for facts and rules.
//!
//! ```text
//! # comments and blank lines are ignored
//! fact: (isa cube block)
//! rule: ((isa ?x block) (on ?x ?y)) -> (covered ?y)
//! ```
//!
//! Symbols starting with `?` are variables; everything else is a constant.

use crate::error::{KbError, KbResult};
use crate::knowledge::Knowledge;
use crate::term::{Statement, Term};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, multispace0},
    combinator::{all_consuming, map},
    multi::{many0, many1},
    sequence::{delimited, pair, preceded},
    IResult,
};
use std::str::FromStr;

fn ws<'a, O>(
    inner: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    delimited(multispace0, inner, multispace0)
}

fn symbol(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && c != '(' && c != ')')(input)
}

fn term(input: &str) -> IResult<&str, Term> {
    map(symbol, |text: &str| match text.strip_prefix('?') {
        Some(var) => Term::var(var),
        None => Term::constant(text),
    })(input)
}

fn statement(input: &str) -> IResult<&str, Statement> {
    map(
        delimited(
            ws(char('(')),
            pair(ws(symbol), many0(ws(term))),
            ws(char(')')),
        ),
        |(predicate, terms)| Statement::new(predicate, terms),
    )(input)
}

fn rule(input: &str) -> IResult<&str, Knowledge> {
    map(
        pair(
            delimited(ws(char('(')), many1(statement), ws(char(')'))),
            preceded(ws(tag("->")), statement),
        ),
        |(lhs, rhs)| Knowledge::Rule { lhs, rhs },
    )(input)
}

fn knowledge(input: &str) -> IResult<&str, Knowledge> {
    alt((
        preceded(ws(tag("fact:")), map(statement, Knowledge::Fact)),
        preceded(ws(tag("rule:")), rule),
    ))(input)
}

fn finish<O>(input: &str, result: IResult<&str, O>) -> KbResult<O> {
    result
        .map(|(_, output)| output)
        .map_err(|err| KbError::Parse(format!("{input:?}: {err}")))
}

/// Parses a single statement such as `(on ?x table)`.
///
/// # Errors
///
/// Returns [`KbError::Parse`] if the input is not exactly one statement.
pub fn parse_statement(input: &str) -> KbResult<Statement> {
    finish(input, all_consuming(statement)(input))
}

/// Parses one `fact: ...` or `rule: ... -> ...` line.
///
/// # Errors
///
/// Returns [`KbError::Parse`] if the line is neither.
pub fn parse_knowledge(input: &str) -> KbResult<Knowledge> {
    finish(input, all_consuming(knowledge)(input))
}

/// Parses a whole program, one fact or rule per line.
///
/// # Errors
///
/// Returns [`KbError::Parse`] naming the first line that fails.
pub fn parse_program(input: &str) -> KbResult<Vec<Knowledge>> {
    input
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(number, line)| {
            parse_knowledge(line).map_err(|err| KbError::Parse(format!("line {number}: {err}")))
        })
        .collect()
}

impl FromStr for Statement {
    type Err = KbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_statement(s)
    }
}

impl FromStr for Knowledge {
    type Err = KbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_knowledge(s)
    }
}
