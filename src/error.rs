use thiserror::Error;

use crate::term::PredicateKey;

/// Shorthand result type for fallible engine operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A dataset was rejected at construction time
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SafetyError {
    /// A head variable is not bound by any positive body literal
    #[error("unsafe rule `{rule}`: variable `{variable}` appears in the head but in no positive body literal")]
    UnboundHeadVariable {
        /// The offending rule, in program syntax
        rule: String,
        /// The unbound variable
        variable: String,
    },
    /// A fact contains a variable
    #[error("fact `{fact}` is not ground")]
    NonGroundFact {
        /// The offending fact, in program syntax
        fact: String,
    },
}

/// A predicate depends negatively on itself, directly or transitively
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("negation cycle: {}", render_cycle(.cycle))]
pub struct NegationCycleError {
    /// Predicates along the cycle; each depends on the next, the last on the first
    pub cycle: Vec<PredicateKey>,
}

fn render_cycle(cycle: &[PredicateKey]) -> String {
    let mut parts: Vec<String> = cycle.iter().map(ToString::to_string).collect();
    if let Some(first) = parts.first().cloned() {
        parts.push(first);
    }
    parts.join(" -> ")
}

/// Malformed program or query text
#[cfg(feature = "parsing")]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at line {line}, column {column}: {message}")]
pub struct ParseError {
    /// 1-based line
    pub line: usize,
    /// 1-based column, in characters
    pub column: usize,
    /// What went wrong
    pub message: String,
}

/// Any error the engine can report
#[derive(Debug, Error)]
pub enum Error {
    /// Unsafe rule or non-ground fact
    #[error(transparent)]
    Safety(#[from] SafetyError),
    /// The program is not stratifiable
    #[error(transparent)]
    NegationCycle(#[from] NegationCycleError),
    /// Program text could not be read
    #[cfg(feature = "parsing")]
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// A JSON program could not be decoded
    #[cfg(feature = "serde")]
    #[error("invalid JSON program: {0}")]
    Json(#[from] serde_json::Error),
}
