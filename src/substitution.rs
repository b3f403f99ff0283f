use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::term::{Atom, Constant, LVar, Term};

/// Variable bindings produced while matching one rule body or query.
///
/// Bindings are kept inline in insertion order; rule bodies rarely bind more
/// than a handful of variables, so lookups are a linear scan. Values are
/// always constants.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct Substitution {
    bindings: SmallVec<[(LVar, Constant); 8]>,
}

/// Returned by [`Substitution::extend`] when a variable is already bound to
/// a different constant. This is a failed match, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// The variable that was being bound
    pub var: LVar,
    /// Its existing value
    pub bound: Constant,
    /// The value that disagreed
    pub attempted: Constant,
}

impl Substitution {
    /// Creates an empty substitution
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The value bound to `var`, if any
    #[must_use]
    pub fn get(&self, var: &LVar) -> Option<&Constant> {
        self.bindings
            .iter()
            .find_map(|(bound_var, value)| (bound_var == var).then_some(value))
    }

    /// Number of bound variables
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` when nothing is bound
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bindings in the order they were made
    pub fn iter(&self) -> impl Iterator<Item = (&LVar, &Constant)> {
        self.bindings.iter().map(|(var, value)| (var, value))
    }

    /// Returns a copy with `var` bound to `value`.
    ///
    /// # Errors
    ///
    /// Returns a [`Conflict`] if `var` is already bound to a different value.
    pub fn extend(&self, var: &LVar, value: &Constant) -> Result<Substitution, Conflict> {
        let mut next = self.clone();
        next.bind(var, value)?;
        Ok(next)
    }

    /// In-place form of [`Substitution::extend`]
    pub(crate) fn bind(&mut self, var: &LVar, value: &Constant) -> Result<(), Conflict> {
        match self.get(var) {
            Some(bound) if bound == value => Ok(()),
            Some(bound) => Err(Conflict {
                var: var.clone(),
                bound: bound.clone(),
                attempted: value.clone(),
            }),
            None => {
                self.bindings.push((var.clone(), value.clone()));
                Ok(())
            }
        }
    }

    /// Replaces a bound variable with its value; anything else is returned as is
    #[must_use]
    pub fn apply(&self, term: &Term) -> Term {
        match term {
            Term::Var(var) => self
                .get(var)
                .map_or_else(|| term.clone(), |value| Term::Constant(value.clone())),
            Term::Constant(_) => term.clone(),
        }
    }

    /// Applies the substitution to every argument of `atom`
    #[must_use]
    pub fn apply_atom(&self, atom: &Atom) -> Atom {
        Atom {
            predicate: atom.predicate.clone(),
            terms: atom.terms.iter().map(|term| self.apply(term)).collect(),
        }
    }

    /// Keeps only the bindings for `vars`, in this substitution's order
    #[must_use]
    pub fn restrict_to<'v>(&self, vars: impl IntoIterator<Item = &'v LVar>) -> Substitution {
        let keep: SmallVec<[&LVar; 8]> = vars.into_iter().collect();
        self.bindings
            .iter()
            .filter(|(var, _)| keep.contains(&var))
            .cloned()
            .collect()
    }
}

impl PartialEq for Substitution {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .bindings
                .iter()
                .all(|(var, value)| other.get(var) == Some(value))
    }
}

impl Eq for Substitution {}

impl FromIterator<(LVar, Constant)> for Substitution {
    /// Later bindings for an already bound variable are ignored
    fn from_iter<I: IntoIterator<Item = (LVar, Constant)>>(iter: I) -> Self {
        let mut subst = Substitution::new();
        for (var, value) in iter {
            if subst.get(&var).is_none() {
                subst.bindings.push((var, value));
            }
        }
        subst
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (var, value)) in self.bindings.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{var}: {value}")?;
        }
        write!(f, "}}")
    }
}
