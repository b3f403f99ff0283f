//! Reader for the textual program format.
//!
//! ```text
//! % facts
//! edge(a, b).
//! edge(b, c).
//! % rules; `~` negates a body literal
//! path(A, B) :- edge(A, B).
//! path(A, B) :- edge(A, C), path(C, B).
//! unreachable(X) :- node(X), ~path(a, X).
//! ```
//!
//! Tokens starting with an uppercase letter or `_` are variables, all others
//! are constants. Identifiers may contain letters, digits, `_` and `-`.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char as character, multispace1, not_line_ending, satisfy},
    combinator::{all_consuming, map, opt, recognize, value, verify},
    error::Error as NomError,
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated},
    Finish, IResult, Parser,
};

use crate::dataset::Dataset;
use crate::error::{ParseError, Result};
use crate::term::{is_variable_token, Atom, Literal, Rule, Term};

type Res<'a, T> = IResult<&'a str, T>;

/// Whitespace and `%` line comments
fn skip(input: &str) -> Res<'_, ()> {
    value(
        (),
        many0(alt((multispace1, preceded(character('%'), not_line_ending)))),
    )(input)
}

fn lexeme<'a, O, P>(inner: P) -> impl FnMut(&'a str) -> Res<'a, O>
where
    P: Parser<&'a str, O, NomError<&'a str>>,
{
    delimited(skip, inner, skip)
}

fn identifier(input: &str) -> Res<'_, &str> {
    recognize(pair(
        satisfy(|c: char| c.is_alphanumeric() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '-'),
    ))(input)
}

fn term(input: &str) -> Res<'_, Term> {
    map(lexeme(identifier), Term::from_token)(input)
}

fn atom(input: &str) -> Res<'_, Atom> {
    let predicate = verify(lexeme(identifier), |name: &str| !is_variable_token(name));
    let arguments = delimited(
        lexeme(character('(')),
        separated_list0(lexeme(character(',')), term),
        lexeme(character(')')),
    );
    map(pair(predicate, opt(arguments)), |(predicate, terms)| {
        Atom::new(predicate, terms.unwrap_or_default())
    })(input)
}

fn literal(input: &str) -> Res<'_, Literal> {
    alt((
        map(preceded(lexeme(character('~')), atom), Literal::Negative),
        map(atom, Literal::Positive),
    ))(input)
}

fn clause(input: &str) -> Res<'_, (Atom, Option<Vec<Literal>>)> {
    let body = preceded(
        lexeme(tag(":-")),
        separated_list1(lexeme(character(',')), literal),
    );
    terminated(pair(atom, opt(body)), lexeme(character('.')))(input)
}

fn error_at(source: &str, rest: &str) -> ParseError {
    let offset = source.len() - rest.len();
    let consumed = &source[..offset];
    let line = consumed.matches('\n').count() + 1;
    let column = consumed
        .rsplit('\n')
        .next()
        .map_or(0, |last| last.chars().count())
        + 1;
    let snippet: String = rest.lines().next().unwrap_or_default().chars().take(24).collect();
    let message = if snippet.trim().is_empty() {
        "unexpected end of input".to_string()
    } else {
        format!("unexpected input `{snippet}`")
    };
    ParseError {
        line,
        column,
        message,
    }
}

/// Splits program text into facts and rules, in source order.
///
/// A clause without a body is returned as a fact even if it contains
/// variables; [`Dataset::new`] rejects those.
///
/// # Errors
///
/// Returns [`ParseError`] pointing at the first clause that cannot be read.
pub fn parse_clauses(source: &str) -> Result<(Vec<Atom>, Vec<Rule>), ParseError> {
    let (_, clauses) = all_consuming(terminated(many0(clause), skip))(source)
        .finish()
        .map_err(|err| error_at(source, err.input))?;

    let mut facts = Vec::new();
    let mut rules = Vec::new();
    for (head, body) in clauses {
        match body {
            Some(body) => rules.push(Rule::new(head, body)),
            None => facts.push(head),
        }
    }
    Ok((facts, rules))
}

/// Reads a whole program into a [`Dataset`]
///
/// # Errors
///
/// Fails on malformed text, non-ground facts or unsafe rules.
pub fn parse_program(source: &str) -> Result<Dataset> {
    let (facts, rules) = parse_clauses(source)?;
    Ok(Dataset::new(facts, rules)?)
}

/// Reads a query atom such as `path(a, X)`, optionally ending in `?` or `.`
///
/// # Errors
///
/// Returns [`ParseError`] if the text is not a single atom.
pub fn parse_query(source: &str) -> Result<Atom, ParseError> {
    let terminator = opt(lexeme(alt((character('?'), character('.')))));
    all_consuming(terminated(atom, terminator))(source)
        .finish()
        .map(|(_, atom)| atom)
        .map_err(|err| error_at(source, err.input))
}
