//! Stratification of predicates for programs with negation.
//!
//! Predicates are layered so that every predicate used under negation is
//! fully evaluated before any predicate that negates it:
//!
//! - `q(..) :- .., p(..), ..` requires `stratum(p) <= stratum(q)`
//! - `q(..) :- .., ~p(..), ..` requires `stratum(p) < stratum(q)`
//!
//! A program with a dependency cycle that passes through a negated edge has
//! no stratification and is rejected.

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};
use log::debug;

use crate::dataset::Dataset;
use crate::error::NegationCycleError;
use crate::term::{Literal, PredicateKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Polarity {
    Positive,
    Negative,
}

/// Predicate dependency graph: head predicate to the body predicates its
/// rules reference
#[derive(Debug, Clone, Default)]
struct DependencyGraph {
    edges: IndexMap<PredicateKey, Vec<(PredicateKey, Polarity)>>,
    predicates: IndexSet<PredicateKey>,
}

impl DependencyGraph {
    fn build(dataset: &Dataset) -> Self {
        let mut graph = Self::default();
        for key in dataset.predicates() {
            graph.predicates.insert(key.clone());
        }
        for rule in dataset.rules() {
            let head = rule.head.key();
            for literal in &rule.body {
                let polarity = match literal {
                    Literal::Positive(_) => Polarity::Positive,
                    Literal::Negative(_) => Polarity::Negative,
                };
                let dep = literal.atom().key();
                graph.predicates.insert(dep.clone());
                graph
                    .edges
                    .entry(head.clone())
                    .or_default()
                    .push((dep, polarity));
            }
        }
        graph
    }

    fn dependencies(&self, key: &PredicateKey) -> &[(PredicateKey, Polarity)] {
        self.edges.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Shortest dependency path from `from` to `to`, both ends included
    fn path(&self, from: &PredicateKey, to: &PredicateKey) -> Option<Vec<PredicateKey>> {
        let mut parents: IndexMap<&PredicateKey, Option<&PredicateKey>> = IndexMap::new();
        let mut queue = VecDeque::from([from]);
        parents.insert(from, None);

        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = vec![current.clone()];
                let mut cursor = current;
                while let Some(Some(parent)) = parents.get(cursor) {
                    path.push((*parent).clone());
                    cursor = *parent;
                }
                path.reverse();
                return Some(path);
            }
            for (dep, _) in self.dependencies(current) {
                if !parents.contains_key(dep) {
                    parents.insert(dep, Some(current));
                    queue.push_back(dep);
                }
            }
        }
        None
    }

    /// A cycle through at least one negated edge, if any.
    ///
    /// For each edge `q -> ~p`, the program is unstratifiable exactly when
    /// `p` reaches `q` again.
    fn negative_cycle(&self) -> Option<Vec<PredicateKey>> {
        for (head, deps) in &self.edges {
            for (dep, polarity) in deps {
                if *polarity != Polarity::Negative {
                    continue;
                }
                if let Some(path) = self.path(dep, head) {
                    let mut cycle = vec![head.clone()];
                    cycle.extend(path.into_iter().take_while(|key| key != head));
                    return Some(cycle);
                }
            }
        }
        None
    }

    /// Relaxes strata until every edge constraint holds. Only called on
    /// graphs without negative cycles, where the values are bounded by the
    /// number of negated edges.
    fn assign_strata(&self) -> IndexMap<PredicateKey, usize> {
        let mut strata: IndexMap<PredicateKey, usize> = self
            .predicates
            .iter()
            .map(|key| (key.clone(), 0))
            .collect();

        let mut changed = true;
        while changed {
            changed = false;
            for (head, deps) in &self.edges {
                let required = deps
                    .iter()
                    .map(|(dep, polarity)| {
                        let dep_stratum = strata.get(dep).copied().unwrap_or(0);
                        match polarity {
                            Polarity::Positive => dep_stratum,
                            Polarity::Negative => dep_stratum + 1,
                        }
                    })
                    .max()
                    .unwrap_or(0);
                if let Some(current) = strata.get_mut(head) {
                    if required > *current {
                        *current = required;
                        changed = true;
                    }
                }
            }
        }
        strata
    }
}

/// Result of stratification: a stratum for every predicate and the
/// intensional predicates grouped by stratum.
#[derive(Debug, Clone)]
pub struct Stratification {
    strata: IndexMap<PredicateKey, usize>,
    layers: Vec<Vec<PredicateKey>>,
    graph: DependencyGraph,
}

impl Stratification {
    /// The stratum of `key`, or `None` for a predicate the program never mentions
    #[must_use]
    pub fn stratum_of(&self, key: &PredicateKey) -> Option<usize> {
        self.strata.get(key).copied()
    }

    /// Intensional predicates grouped by stratum, lowest first. Within a
    /// stratum, predicates keep rule definition order.
    #[must_use]
    pub fn strata(&self) -> &[Vec<PredicateKey>] {
        &self.layers
    }

    /// Number of strata holding intensional predicates
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns `true` for programs without rules
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(Vec::is_empty)
    }

    /// Intensional predicates in evaluation order
    pub fn ordering(&self) -> impl Iterator<Item = &PredicateKey> {
        self.layers.iter().flatten()
    }

    /// `key` and every predicate it depends on, directly or transitively
    #[must_use]
    pub fn depends_on(&self, key: &PredicateKey) -> IndexSet<PredicateKey> {
        let mut seen = IndexSet::new();
        let mut stack = vec![key.clone()];
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            for (dep, _) in self.graph.dependencies(&current) {
                if !seen.contains(dep) {
                    stack.push(dep.clone());
                }
            }
        }
        seen
    }
}

/// Computes the strata of `dataset`.
///
/// # Errors
///
/// Returns [`NegationCycleError`] with the offending cycle if some predicate
/// depends negatively on itself.
pub fn stratify(dataset: &Dataset) -> Result<Stratification, NegationCycleError> {
    let graph = DependencyGraph::build(dataset);

    if let Some(cycle) = graph.negative_cycle() {
        let err = NegationCycleError { cycle };
        debug!("stratification failed: {err}");
        return Err(err);
    }

    let strata = graph.assign_strata();
    let height = strata.values().max().map_or(0, |max| max + 1);
    let mut layers = vec![Vec::new(); height];
    let intensional: IndexSet<PredicateKey> =
        dataset.rules().map(|rule| rule.head.key()).collect();
    for key in intensional {
        let stratum = strata.get(&key).copied().unwrap_or(0);
        layers[stratum].push(key);
    }

    debug!(
        "stratified {} predicates into {} strata",
        strata.len(),
        layers.len()
    );

    Ok(Stratification {
        strata,
        layers,
        graph,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{Atom, Rule};

    fn pos(pred: &str, args: &[&str]) -> Literal {
        Literal::Positive(Atom::from_tokens(pred, args))
    }

    fn neg(pred: &str, args: &[&str]) -> Literal {
        Literal::Negative(Atom::from_tokens(pred, args))
    }

    fn rule(head: (&str, &[&str]), body: Vec<Literal>) -> Rule {
        Rule::new(Atom::from_tokens(head.0, head.1), body)
    }

    fn key(name: &str, arity: usize) -> PredicateKey {
        PredicateKey::new(name, arity)
    }

    #[test]
    fn test_no_negation_single_stratum() {
        let dataset = Dataset::new(
            vec![],
            vec![
                rule(("ancestor", &["X", "Y"]), vec![pos("parent", &["X", "Y"])]),
                rule(
                    ("ancestor", &["X", "Z"]),
                    vec![pos("ancestor", &["X", "Y"]), pos("parent", &["Y", "Z"])],
                ),
            ],
        )
        .unwrap();

        let strata = stratify(&dataset).unwrap();
        assert_eq!(strata.len(), 1);
        assert_eq!(strata.stratum_of(&key("ancestor", 2)), Some(0));
        assert_eq!(strata.stratum_of(&key("parent", 2)), Some(0));
        assert_eq!(strata.strata()[0], vec![key("ancestor", 2)]);
    }

    #[test]
    fn test_negation_raises_stratum() {
        let dataset = Dataset::new(
            vec![],
            vec![rule(
                ("not_parent", &["X"]),
                vec![pos("person", &["X"]), neg("parent", &["X", "Y"])],
            )],
        )
        .unwrap();

        let strata = stratify(&dataset).unwrap();
        assert_eq!(strata.stratum_of(&key("parent", 2)), Some(0));
        assert_eq!(strata.stratum_of(&key("not_parent", 1)), Some(1));
    }

    #[test]
    fn test_nested_negation_stacks_strata() {
        let dataset = Dataset::new(
            vec![],
            vec![
                rule(("quacks", &["X"]), vec![pos("duck", &["X"])]),
                rule(
                    ("b-not-quack", &["X"]),
                    vec![pos("b", &["X"]), neg("quacks", &["X"])],
                ),
                rule(
                    ("a-not-b-not-quack", &["X"]),
                    vec![pos("a", &["X"]), neg("b-not-quack", &["X"])],
                ),
            ],
        )
        .unwrap();

        let strata = stratify(&dataset).unwrap();
        assert_eq!(strata.stratum_of(&key("quacks", 1)), Some(0));
        assert_eq!(strata.stratum_of(&key("b-not-quack", 1)), Some(1));
        assert_eq!(strata.stratum_of(&key("a-not-b-not-quack", 1)), Some(2));
        let order: Vec<String> = strata.ordering().map(ToString::to_string).collect();
        assert_eq!(order, vec!["quacks/1", "b-not-quack/1", "a-not-b-not-quack/1"]);
    }

    #[test]
    fn test_positive_dependency_never_lowers_stratum() {
        let dataset = Dataset::new(
            vec![],
            vec![
                rule(("r", &["X"]), vec![pos("s", &["X"]), neg("t", &["X"])]),
                rule(("u", &["X"]), vec![pos("r", &["X"])]),
            ],
        )
        .unwrap();

        let strata = stratify(&dataset).unwrap();
        assert_eq!(strata.stratum_of(&key("r", 1)), Some(1));
        assert_eq!(strata.stratum_of(&key("u", 1)), Some(1));
    }

    #[test]
    fn test_cycle_through_negation_error() {
        let dataset = Dataset::new(
            vec![],
            vec![
                rule(("p", &["X"]), vec![pos("d", &["X"]), neg("q", &["X"])]),
                rule(("q", &["X"]), vec![pos("d", &["X"]), neg("p", &["X"])]),
            ],
        )
        .unwrap();

        let err = stratify(&dataset).unwrap_err();
        assert_eq!(err.cycle, vec![key("p", 1), key("q", 1)]);
    }

    #[test]
    fn test_self_negation_is_a_cycle() {
        let dataset = Dataset::new(
            vec![],
            vec![rule(("p", &["X"]), vec![pos("d", &["X"]), neg("p", &["X"])])],
        )
        .unwrap();

        let err = stratify(&dataset).unwrap_err();
        assert_eq!(err.cycle, vec![key("p", 1)]);
    }

    #[test]
    fn test_transitive_negative_cycle_is_detected() {
        let dataset = Dataset::new(
            vec![],
            vec![
                rule(("p", &["X"]), vec![pos("q", &["X"])]),
                rule(("q", &["X"]), vec![pos("r", &["X"])]),
                rule(("r", &["X"]), vec![pos("d", &["X"]), neg("p", &["X"])]),
            ],
        )
        .unwrap();

        let err = stratify(&dataset).unwrap_err();
        assert_eq!(err.cycle, vec![key("r", 1), key("p", 1), key("q", 1)]);
    }

    #[test]
    fn test_positive_recursion_is_fine() {
        let dataset = Dataset::new(
            vec![],
            vec![
                rule(("even", &["X"]), vec![pos("zero", &["X"])]),
                rule(("even", &["X"]), vec![pos("succ", &["Y", "X"]), pos("odd", &["Y"])]),
                rule(("odd", &["X"]), vec![pos("succ", &["Y", "X"]), pos("even", &["Y"])]),
            ],
        )
        .unwrap();

        let strata = stratify(&dataset).unwrap();
        assert_eq!(strata.len(), 1);
        let deps = strata.depends_on(&key("even", 1));
        assert!(deps.contains(&key("odd", 1)));
        assert!(deps.contains(&key("succ", 2)));
        assert!(deps.contains(&key("zero", 1)));
    }

    #[test]
    fn test_depends_on_excludes_unrelated_predicates() {
        let dataset = Dataset::new(
            vec![],
            vec![
                rule(("a", &["X"]), vec![pos("b", &["X"])]),
                rule(("c", &["X"]), vec![pos("d", &["X"])]),
            ],
        )
        .unwrap();

        let strata = stratify(&dataset).unwrap();
        let deps = strata.depends_on(&key("a", 1));
        assert_eq!(deps.len(), 2);
        assert!(!deps.contains(&key("c", 1)));
    }
}
