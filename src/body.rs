use std::iter;

use crate::store::{FactStore, Relation, Window};
use crate::substitution::Substitution;
use crate::term::{Atom, Literal};
use crate::unify::{join_substitutions, match_atom};

/// Restricts one positive body literal to a window of its relation, so a
/// semi-naive round only joins against rows derived in the previous round
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Delta {
    pub(crate) position: usize,
    pub(crate) window: Window,
}

/// Evaluates rule bodies left to right against a fact store.
///
/// Positive literals join against matching rows; negative literals keep a
/// substitution only if no row matches (negation-as-failure) and never bind
/// anything. Predicates used under negation must already be complete.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BodyEvaluator<'a> {
    store: &'a FactStore,
    delta: Option<&'a Delta>,
}

impl<'a> BodyEvaluator<'a> {
    pub(crate) fn new(store: &'a FactStore) -> Self {
        Self { store, delta: None }
    }

    pub(crate) fn with_delta(store: &'a FactStore, delta: &'a Delta) -> Self {
        Self {
            store,
            delta: Some(delta),
        }
    }

    /// Lazily yields every substitution extending `start` that satisfies `body`
    pub(crate) fn solutions(
        self,
        body: &'a [Literal],
        start: Substitution,
    ) -> Box<dyn Iterator<Item = Substitution> + 'a> {
        self.extend(body, 0, start)
    }

    fn extend(
        self,
        body: &'a [Literal],
        position: usize,
        subst: Substitution,
    ) -> Box<dyn Iterator<Item = Substitution> + 'a> {
        let Some(literal) = body.get(position) else {
            return Box::new(iter::once(subst));
        };

        match literal {
            Literal::Positive(atom) => {
                let Some(relation) = self.store.relation(&atom.key()) else {
                    return Box::new(iter::empty());
                };
                let pattern = subst.apply_atom(atom);
                let window = self.window_for(position, relation);
                let empty = Substitution::new();
                Box::new(
                    relation
                        .candidates(&pattern, window)
                        .filter_map(move |row| {
                            let local = match_atom(&pattern, row, &empty)?;
                            join_substitutions(&subst, &local)
                        })
                        .flat_map(move |next| self.extend(body, position + 1, next)),
                )
            }
            Literal::Negative(atom) => {
                if self.any_match(atom, &subst) {
                    Box::new(iter::empty())
                } else {
                    self.extend(body, position + 1, subst)
                }
            }
        }
    }

    fn window_for(&self, position: usize, relation: &Relation) -> Window {
        match self.delta {
            Some(delta) if delta.position == position => delta.window.clone(),
            _ => relation.full_window(),
        }
    }

    /// Whether some row matches `atom` under `subst`; variables `subst`
    /// leaves unbound are existential for this check only
    fn any_match(&self, atom: &Atom, subst: &Substitution) -> bool {
        let Some(relation) = self.store.relation(&atom.key()) else {
            return false;
        };
        let pattern = subst.apply_atom(atom);
        let empty = Substitution::new();
        relation
            .candidates(&pattern, relation.full_window())
            .any(|row| match_atom(&pattern, row, &empty).is_some())
    }
}
