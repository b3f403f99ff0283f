//! One-way unification of patterns against ground rows.

use crate::substitution::Substitution;
use crate::term::{Atom, Term};

/// Matches `pattern` against a ground `row`, extending `subst`.
///
/// Returns `None` when the predicates or arities differ, when a constant
/// disagrees, or when a variable is already bound to a different value.
/// A repeated variable therefore only matches rows holding equal values at
/// every position it occupies.
#[must_use]
pub fn match_atom(pattern: &Atom, row: &Atom, subst: &Substitution) -> Option<Substitution> {
    if pattern.predicate != row.predicate || pattern.terms.len() != row.terms.len() {
        return None;
    }

    let mut extended = subst.clone();

    pattern
        .terms
        .iter()
        .zip(&row.terms)
        .try_for_each(|(term, value)| {
            // Rows are ground; a variable on the row side never matches
            let Term::Constant(value) = value else {
                return Err(());
            };
            match term {
                Term::Constant(constant) => (constant == value).then_some(()).ok_or(()),
                Term::Var(var) => extended.bind(var, value).map_err(|_| ()),
            }
        })
        .ok()?;

    Some(extended)
}

/// Combines two substitutions; `None` if a shared variable disagrees
#[must_use]
pub fn join_substitutions(a: &Substitution, b: &Substitution) -> Option<Substitution> {
    let mut joined = a.clone();
    for (var, value) in b.iter() {
        joined.bind(var, value).ok()?;
    }
    Some(joined)
}
