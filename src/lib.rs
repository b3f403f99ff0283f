//! # Stratalog
//!
//! A small deductive query engine for Datalog programs with stratified
//! negation.
//!
//! ## Features
//!
//! - Unification of query patterns against stored and derived facts
//! - Conjunctive rule bodies evaluated as nested-loop joins
//! - Negation-as-failure (`~p(X)`) with automatic stratification
//! - Semi-naive fixpoint evaluation of recursive rules
//! - Optional program text reader (`parsing` feature) and JSON loading
//!   (`serde` feature)
//!
//! ## Example
//!
//! ```rust
//! use stratalog::{evaluate, Atom, Dataset, Literal, Rule};
//!
//! let facts = vec![
//!     Atom::from_tokens("edge", &["a", "b"]),
//!     Atom::from_tokens("edge", &["b", "c"]),
//! ];
//! let rules = vec![
//!     Rule::new(
//!         Atom::from_tokens("path", &["A", "B"]),
//!         vec![Literal::Positive(Atom::from_tokens("edge", &["A", "B"]))],
//!     ),
//!     Rule::new(
//!         Atom::from_tokens("path", &["A", "B"]),
//!         vec![
//!             Literal::Positive(Atom::from_tokens("edge", &["A", "C"])),
//!             Literal::Positive(Atom::from_tokens("path", &["C", "B"])),
//!         ],
//!     ),
//! ];
//! let dataset = Dataset::new(facts, rules)?;
//!
//! let reached: Vec<String> = evaluate(&dataset, &Atom::from_tokens("path", &["a", "X"]))?
//!     .map(|(atom, _)| atom.to_string())
//!     .collect();
//! assert_eq!(reached, vec!["path(a, b)", "path(a, c)"]);
//! # Ok::<(), stratalog::Error>(())
//! ```

mod body;
/// Programs: facts and rules grouped by predicate.
pub mod dataset;
/// Query evaluation.
pub mod engine;
/// Error types.
pub mod error;
mod fixpoint;
#[cfg(feature = "parsing")]
pub mod parser;
mod store;
pub mod stratify;
mod substitution;
mod term;
pub mod unify;

#[cfg(feature = "serde")]
pub use dataset::Program;
pub use dataset::Dataset;
pub use engine::{evaluate, Answers};
#[cfg(feature = "parsing")]
pub use error::ParseError;
pub use error::{Error, NegationCycleError, Result, SafetyError};
pub use store::FactStore;
pub use stratify::{stratify, Stratification};
pub use substitution::{Conflict, Substitution};
pub use term::{Atom, Constant, LVar, Literal, PredicateKey, Rule, Term};
pub use unify::{join_substitutions, match_atom};
