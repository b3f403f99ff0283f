use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An atomic value identified by its text (e.g. `alice`, `42`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct Constant(Arc<str>);

impl Constant {
    /// Creates a constant from its textual form
    pub fn new(text: impl AsRef<str>) -> Self {
        Self(Arc::from(text.as_ref()))
    }

    /// The textual form of the constant
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Constant {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A logical variable, scoped to the rule body or query it appears in
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct LVar(Arc<str>);

impl LVar {
    /// Creates a variable with the given name
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The variable name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LVar {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for LVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A Datalog term: either a constant or a variable
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Term {
    /// A concrete value (e.g. `alice`)
    Constant(Constant),
    /// A variable to be bound during evaluation (e.g. `X`)
    Var(LVar),
}

impl Term {
    /// Shorthand for a constant term
    pub fn constant(text: impl AsRef<str>) -> Self {
        Term::Constant(Constant::new(text))
    }

    /// Shorthand for a variable term
    pub fn var(name: impl AsRef<str>) -> Self {
        Term::Var(LVar::new(name))
    }

    /// Classifies a bare token the way program text does: tokens starting
    /// with an uppercase letter or `_` are variables, everything else is a
    /// constant.
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        if is_variable_token(token) {
            Term::var(token)
        } else {
            Term::constant(token)
        }
    }

    /// Returns `true` for constants
    #[must_use]
    pub fn is_ground(&self) -> bool {
        matches!(self, Term::Constant(_))
    }

    /// The variable, if this term is one
    #[must_use]
    pub fn as_var(&self) -> Option<&LVar> {
        match self {
            Term::Var(var) => Some(var),
            Term::Constant(_) => None,
        }
    }
}

pub(crate) fn is_variable_token(token: &str) -> bool {
    token
        .chars()
        .next()
        .is_some_and(|c| c.is_uppercase() || c == '_')
}

impl From<Constant> for Term {
    fn from(constant: Constant) -> Self {
        Term::Constant(constant)
    }
}

impl From<LVar> for Term {
    fn from(var: LVar) -> Self {
        Term::Var(var)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Constant(c) => c.fmt(f),
            Term::Var(v) => v.fmt(f),
        }
    }
}

/// Identifies a relation: predicate name plus number of arguments
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PredicateKey {
    /// Predicate symbol
    pub name: Constant,
    /// Number of arguments
    pub arity: usize,
}

impl PredicateKey {
    /// Creates a key for `name/arity`
    pub fn new(name: impl Into<Constant>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
        }
    }
}

impl fmt::Display for PredicateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

/// A predicate applied to arguments (e.g. `edge(a, X)`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Atom {
    /// The predicate symbol (e.g. `edge`)
    pub predicate: Constant,
    /// The arguments
    pub terms: Vec<Term>,
}

impl Atom {
    /// Creates an atom from a predicate and its arguments
    pub fn new(predicate: impl Into<Constant>, terms: impl IntoIterator<Item = Term>) -> Self {
        Self {
            predicate: predicate.into(),
            terms: terms.into_iter().collect(),
        }
    }

    /// Builds an atom from bare tokens, classifying each with [`Term::from_token`]
    #[must_use]
    pub fn from_tokens(predicate: &str, args: &[&str]) -> Self {
        Self::new(predicate, args.iter().map(|arg| Term::from_token(arg)))
    }

    /// Number of arguments
    #[must_use]
    pub fn arity(&self) -> usize {
        self.terms.len()
    }

    /// The relation this atom belongs to
    #[must_use]
    pub fn key(&self) -> PredicateKey {
        PredicateKey::new(self.predicate.clone(), self.arity())
    }

    /// Returns `true` when no argument is a variable
    #[must_use]
    pub fn is_ground(&self) -> bool {
        self.terms.iter().all(Term::is_ground)
    }

    /// Variables in first-occurrence order, without repeats
    pub fn variables(&self) -> impl Iterator<Item = &LVar> {
        self.terms
            .iter()
            .enumerate()
            .filter_map(|(pos, term)| {
                let var = term.as_var()?;
                let seen = self.terms[..pos].iter().any(|t| t.as_var() == Some(var));
                (!seen).then_some(var)
            })
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.predicate)?;
        if self.terms.is_empty() {
            return Ok(());
        }
        write!(f, "(")?;
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{term}")?;
        }
        write!(f, ")")
    }
}

/// A body literal; negative literals are checked by negation-as-failure
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Literal {
    /// Holds when a matching row exists, binding its variables
    Positive(Atom),
    /// Holds when no matching row exists (`~atom` in program text)
    Negative(Atom),
}

impl Literal {
    /// The underlying atom regardless of polarity
    #[must_use]
    pub fn atom(&self) -> &Atom {
        match self {
            Literal::Positive(atom) | Literal::Negative(atom) => atom,
        }
    }

    /// Returns `true` for negated literals
    #[must_use]
    pub fn is_negative(&self) -> bool {
        matches!(self, Literal::Negative(_))
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Positive(atom) => write!(f, "{atom}"),
            Literal::Negative(atom) => write!(f, "~{atom}"),
        }
    }
}

/// A Datalog rule (e.g. `path(A, B) :- edge(A, C), path(C, B)`)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rule {
    /// The conclusion
    pub head: Atom,
    /// Conditions, evaluated left to right
    pub body: Vec<Literal>,
}

impl Rule {
    /// Creates a rule
    pub fn new(head: Atom, body: impl IntoIterator<Item = Literal>) -> Self {
        Self {
            head,
            body: body.into_iter().collect(),
        }
    }

    /// Positive body literals, in body order
    pub fn positive_atoms(&self) -> impl Iterator<Item = &Atom> {
        self.body.iter().filter_map(|literal| match literal {
            Literal::Positive(atom) => Some(atom),
            Literal::Negative(_) => None,
        })
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head)?;
        for (i, literal) in self.body.iter().enumerate() {
            let sep = if i == 0 { " :- " } else { ", " };
            write!(f, "{sep}{literal}")?;
        }
        write!(f, ".")
    }
}
