use indexmap::IndexSet;
use log::{debug, trace};

use crate::dataset::Dataset;
use crate::error::Result;
use crate::fixpoint;
use crate::store::Relation;
use crate::substitution::Substitution;
use crate::term::{Atom, PredicateKey};
use crate::unify::match_atom;

/// Answers every stored or derivable fact matching `query`.
///
/// Extensional predicates are looked up directly. For intensional ones the
/// predicates `query` depends on are evaluated stratum by stratum, each
/// stratum to fixpoint, before the query is matched. Every call starts from
/// the dataset's stored facts, so calling it again yields the same answers.
///
/// Answers come in row order: stored facts in insertion order, then derived
/// facts in the order they were first derived. Each substitution binds
/// exactly the variables of `query`.
///
/// # Errors
///
/// Returns [`crate::Error::NegationCycle`] if the query needs rules and the
/// program cannot be stratified.
pub fn evaluate<'d>(dataset: &'d Dataset, query: &Atom) -> Result<Answers<'d>> {
    let key = query.key();

    if !dataset.is_intensional(&key) {
        debug!("{query}: extensional lookup");
        let rows = dataset.relation(&key).map_or(Rows::Empty, Rows::Stored);
        return Ok(Answers::new(query, rows));
    }

    let stratification = dataset.stratification()?;
    let relevant = stratification.depends_on(&key);
    let mut store = dataset.fact_store();

    for (level, layer) in stratification.strata().iter().enumerate() {
        let group: Vec<PredicateKey> = layer
            .iter()
            .filter(|predicate| relevant.contains(*predicate))
            .cloned()
            .collect();
        if group.is_empty() {
            continue;
        }
        trace!("{query}: evaluating stratum {level}");
        fixpoint::saturate(&mut store, dataset, &group);
    }

    let rows = store.take_relation(&key).map_or(Rows::Empty, Rows::Derived);
    debug!("{query}: {} candidate rows after evaluation", rows.len());
    Ok(Answers::new(query, rows))
}

#[derive(Debug)]
enum Rows<'d> {
    Empty,
    Stored(&'d Relation),
    Derived(Relation),
}

impl Rows<'_> {
    fn relation(&self) -> Option<&Relation> {
        match self {
            Rows::Empty => None,
            Rows::Stored(relation) => Some(*relation),
            Rows::Derived(relation) => Some(relation),
        }
    }

    fn len(&self) -> usize {
        self.relation().map_or(0, Relation::len)
    }
}

/// Lazy sequence of `(matched atom, bindings)` pairs returned by [`evaluate`].
///
/// Rows are matched against the query only as the iterator is advanced.
/// Evaluate again to restart.
#[derive(Debug)]
pub struct Answers<'d> {
    query: Atom,
    rows: Rows<'d>,
    ordinals: std::vec::IntoIter<usize>,
}

impl<'d> Answers<'d> {
    fn new(query: &Atom, rows: Rows<'d>) -> Self {
        let ordinals = rows
            .relation()
            .map(|relation| relation.candidate_ordinals(query, relation.full_window()))
            .unwrap_or_default();
        Self {
            query: query.clone(),
            rows,
            ordinals: ordinals.into_iter(),
        }
    }

    /// The query being answered
    #[must_use]
    pub fn query(&self) -> &Atom {
        &self.query
    }

    /// Collects just the matched atoms, dropping the bindings
    #[must_use]
    pub fn atoms(self) -> IndexSet<Atom> {
        self.map(|(atom, _)| atom).collect()
    }
}

impl Iterator for Answers<'_> {
    type Item = (Atom, Substitution);

    fn next(&mut self) -> Option<Self::Item> {
        let relation = self.rows.relation()?;
        let empty = Substitution::new();
        for ordinal in self.ordinals.by_ref() {
            let Some(row) = relation.get(ordinal) else {
                continue;
            };
            if let Some(subst) = match_atom(&self.query, row, &empty) {
                return Some((row.clone(), subst));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.ordinals.len()))
    }
}
