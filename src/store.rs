use std::ops::Range;

use indexmap::{IndexMap, IndexSet};

use crate::term::{Atom, Constant, PredicateKey, Term};

/// Index for fast row lookup by argument position and value
#[derive(Debug, Clone)]
struct PredicateIndex {
    /// For each argument position, maps values to row ordinals (ascending).
    /// For rows `edge(a,b), edge(a,c), edge(b,c)`:
    /// - Position 0: `{a -> [0, 1], b -> [2]}`
    /// - Position 1: `{b -> [0], c -> [1, 2]}`
    by_position: Vec<IndexMap<Constant, Vec<usize>>>,
}

impl PredicateIndex {
    fn new(arity: usize) -> Self {
        Self {
            by_position: (0..arity).map(|_| IndexMap::new()).collect(),
        }
    }

    fn add_row(&mut self, ordinal: usize, row: &Atom) {
        for (pos, term) in row.terms.iter().enumerate() {
            if let (Term::Constant(value), Some(pos_map)) = (term, self.by_position.get_mut(pos)) {
                pos_map.entry(value.clone()).or_default().push(ordinal);
            }
        }
    }

    /// Picks the smallest ordinal list among the constant positions of
    /// `pattern`. `None` means no position is constant and every row is a
    /// candidate; a constant missing from the index yields an empty list.
    fn most_selective(&self, pattern: &Atom) -> Option<&[usize]> {
        let mut best: Option<&[usize]> = None;
        for (pos, term) in pattern.terms.iter().enumerate() {
            let Term::Constant(value) = term else {
                continue;
            };
            let ordinals = self
                .by_position
                .get(pos)
                .and_then(|pos_map| pos_map.get(value))
                .map(Vec::as_slice)
                .unwrap_or_default();
            if best.map_or(true, |current| ordinals.len() < current.len()) {
                best = Some(ordinals);
            }
        }
        best
    }
}

/// Half-open range of row ordinals within one relation.
///
/// Rows are only ever appended, so the rows added during one fixpoint round
/// form a contiguous window.
pub(crate) type Window = Range<usize>;

/// The rows of one predicate, deduplicated and in insertion order
#[derive(Debug, Clone)]
pub(crate) struct Relation {
    rows: IndexSet<Atom>,
    index: PredicateIndex,
}

impl Relation {
    pub(crate) fn new(arity: usize) -> Self {
        Self {
            rows: IndexSet::new(),
            index: PredicateIndex::new(arity),
        }
    }

    /// Appends a row; returns `false` if it was already present
    pub(crate) fn insert(&mut self, row: Atom) -> bool {
        if self.rows.contains(&row) {
            return false;
        }
        let ordinal = self.rows.len();
        self.index.add_row(ordinal, &row);
        self.rows.insert(row);
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn contains(&self, row: &Atom) -> bool {
        self.rows.contains(row)
    }

    pub(crate) fn rows(&self) -> impl Iterator<Item = &Atom> {
        self.rows.iter()
    }

    pub(crate) fn get(&self, ordinal: usize) -> Option<&Atom> {
        self.rows.get_index(ordinal)
    }

    /// Ordinals of rows inside `window` that may match `pattern`, ascending
    pub(crate) fn candidate_ordinals(&self, pattern: &Atom, window: Window) -> Vec<usize> {
        let window = window.start..window.end.min(self.len());
        match self.index.most_selective(pattern) {
            Some(ordinals) => ordinals
                .iter()
                .copied()
                .filter(|ordinal| window.contains(ordinal))
                .collect(),
            None => window.collect(),
        }
    }

    /// Rows inside `window` that may match `pattern`, in insertion order.
    /// Callers still have to unify; the index only narrows the scan.
    pub(crate) fn candidates<'r>(
        &'r self,
        pattern: &Atom,
        window: Window,
    ) -> impl Iterator<Item = &'r Atom> + 'r {
        self.candidate_ordinals(pattern, window)
            .into_iter()
            .filter_map(move |ordinal| self.get(ordinal))
    }

    pub(crate) fn full_window(&self) -> Window {
        0..self.len()
    }
}

/// Working fact store for one evaluation: the dataset's stored rows plus
/// everything derived so far, grouped by predicate.
#[derive(Debug, Clone, Default)]
pub struct FactStore {
    relations: IndexMap<PredicateKey, Relation>,
}

impl FactStore {
    pub(crate) fn from_relations(relations: IndexMap<PredicateKey, Relation>) -> Self {
        Self { relations }
    }

    pub(crate) fn relation(&self, key: &PredicateKey) -> Option<&Relation> {
        self.relations.get(key)
    }

    pub(crate) fn take_relation(&mut self, key: &PredicateKey) -> Option<Relation> {
        self.relations.swap_remove(key)
    }

    /// Stored rows for `key` in insertion order, then derived rows in the
    /// order they were first produced
    pub fn facts_for(&self, key: &PredicateKey) -> impl Iterator<Item = &Atom> {
        self.relations.get(key).into_iter().flat_map(|relation| relation.rows())
    }

    /// Number of rows currently held for `key`
    #[must_use]
    pub fn count(&self, key: &PredicateKey) -> usize {
        self.relations.get(key).map_or(0, Relation::len)
    }

    /// Returns `true` if `atom` is stored or has been derived
    #[must_use]
    pub fn contains(&self, atom: &Atom) -> bool {
        self.relations
            .get(&atom.key())
            .is_some_and(|relation| relation.contains(atom))
    }

    /// Records a derived ground atom. Adding an atom that is already present
    /// is a no-op and returns `false`.
    pub fn add_derived(&mut self, atom: Atom) -> bool {
        debug_assert!(atom.is_ground(), "derived atom {atom} is not ground");
        let arity = atom.arity();
        self.relations
            .entry(atom.key())
            .or_insert_with(|| Relation::new(arity))
            .insert(atom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pred: &str, args: &[&str]) -> Atom {
        Atom::from_tokens(pred, args)
    }

    fn likes() -> Relation {
        let mut relation = Relation::new(2);
        relation.insert(row("likes", &["alice", "pizza"]));
        relation.insert(row("likes", &["bob", "burger"]));
        relation.insert(row("likes", &["alice", "pasta"]));
        relation
    }

    #[test]
    fn test_insert_deduplicates() {
        let mut relation = likes();
        assert!(!relation.insert(row("likes", &["bob", "burger"])));
        assert_eq!(relation.len(), 3);
    }

    #[test]
    fn test_index_by_position() {
        let relation = likes();
        let alice = relation.candidate_ordinals(&row("likes", &["alice", "X"]), relation.full_window());
        assert_eq!(alice, vec![0, 2]);
        let pizza = relation.candidate_ordinals(&row("likes", &["X", "pizza"]), relation.full_window());
        assert_eq!(pizza, vec![0]);
    }

    #[test]
    fn test_index_chooses_most_selective_position() {
        let relation = likes();
        // alice has two rows, pasta only one
        let ordinals =
            relation.candidate_ordinals(&row("likes", &["alice", "pasta"]), relation.full_window());
        assert_eq!(ordinals, vec![2]);
    }

    #[test]
    fn test_unknown_constant_has_no_candidates() {
        let relation = likes();
        let ordinals =
            relation.candidate_ordinals(&row("likes", &["carol", "X"]), relation.full_window());
        assert!(ordinals.is_empty());
    }

    #[test]
    fn test_unbound_pattern_scans_window() {
        let relation = likes();
        assert_eq!(relation.candidate_ordinals(&row("likes", &["X", "Y"]), 1..3), vec![1, 2]);
        // Windows past the end are clamped
        assert_eq!(relation.candidate_ordinals(&row("likes", &["X", "Y"]), 2..10), vec![2]);
    }

    #[test]
    fn test_window_filters_indexed_candidates() {
        let relation = likes();
        let ordinals = relation.candidate_ordinals(&row("likes", &["alice", "X"]), 1..3);
        assert_eq!(ordinals, vec![2]);
    }

    #[test]
    fn test_add_derived_is_idempotent() {
        let mut store = FactStore::default();
        assert!(store.add_derived(row("path", &["a", "b"])));
        assert!(!store.add_derived(row("path", &["a", "b"])));
        assert!(store.add_derived(row("path", &["a", "c"])));

        let key = PredicateKey::new("path", 2);
        assert_eq!(store.count(&key), 2);
        let rows: Vec<String> = store.facts_for(&key).map(ToString::to_string).collect();
        assert_eq!(rows, vec!["path(a, b)", "path(a, c)"]);
    }

    #[test]
    fn test_facts_for_unknown_predicate_is_empty() {
        let store = FactStore::default();
        assert_eq!(store.facts_for(&PredicateKey::new("nope", 1)).count(), 0);
        assert!(!store.contains(&row("nope", &["a"])));
    }
}
