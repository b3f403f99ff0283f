use indexmap::{IndexMap, IndexSet};
use log::{debug, trace};

use crate::body::{BodyEvaluator, Delta};
use crate::dataset::Dataset;
use crate::store::{FactStore, Window};
use crate::substitution::Substitution;
use crate::term::{Atom, Literal, PredicateKey, Rule};

/// Summary of one [`saturate`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FixpointStats {
    /// Passes over the rules, including the final one that added nothing
    pub(crate) rounds: usize,
    /// Atoms newly added to the store
    pub(crate) derived: usize,
}

/// Ground head atoms produced by one rule, in body-solution order, each with
/// the substitution that produced it
pub(crate) fn consequences<'a>(
    rule: &'a Rule,
    evaluator: BodyEvaluator<'a>,
) -> impl Iterator<Item = (Atom, Substitution)> + 'a {
    evaluator
        .solutions(&rule.body, Substitution::new())
        .map(move |subst| (subst.apply_atom(&rule.head), subst))
        .filter(|(head, _)| head.is_ground())
}

/// Evaluates the rules of `predicates` until no new atom can be derived.
///
/// Every predicate those rules use under negation must already be complete
/// in `store`. Alternative rules for one predicate are unioned through the
/// store's deduplication.
///
/// The first round runs every rule against the whole store. Later rounds are
/// semi-naive: a rule is re-run once per positive literal over a predicate of
/// this group, with that literal restricted to the rows the previous round
/// added. A rule with no such literal cannot produce anything new after the
/// first round.
pub(crate) fn saturate(
    store: &mut FactStore,
    dataset: &Dataset,
    predicates: &[PredicateKey],
) -> FixpointStats {
    let group: IndexSet<&PredicateKey> = predicates.iter().collect();
    let rules: Vec<&Rule> = predicates
        .iter()
        .flat_map(|key| dataset.rules_for(key))
        .collect();

    let mut stats = FixpointStats::default();

    let marks = watermarks(store, &group);
    for rule in &rules {
        stats.derived += apply(store, rule, None);
    }
    stats.rounds += 1;
    let mut deltas = windows_since(store, &marks);

    while deltas.values().any(|window| !window.is_empty()) {
        trace!(
            "round {}: {}",
            stats.rounds,
            deltas
                .iter()
                .map(|(key, window)| format!("{key} +{}", window.len()))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let marks = watermarks(store, &group);
        for rule in &rules {
            for (position, literal) in rule.body.iter().enumerate() {
                let Literal::Positive(atom) = literal else {
                    continue;
                };
                let Some(window) = deltas.get(&atom.key()) else {
                    continue;
                };
                if window.is_empty() {
                    continue;
                }
                let delta = Delta {
                    position,
                    window: window.clone(),
                };
                stats.derived += apply(store, rule, Some(&delta));
            }
        }
        stats.rounds += 1;
        deltas = windows_since(store, &marks);
    }

    debug!(
        "saturated [{}] in {} rounds, {} new atoms",
        predicates
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", "),
        stats.rounds,
        stats.derived
    );
    stats
}

/// Runs one rule and records its consequences; returns how many were new
fn apply(store: &mut FactStore, rule: &Rule, delta: Option<&Delta>) -> usize {
    let heads: Vec<Atom> = {
        let evaluator = match delta {
            Some(delta) => BodyEvaluator::with_delta(store, delta),
            None => BodyEvaluator::new(store),
        };
        consequences(rule, evaluator).map(|(head, _)| head).collect()
    };
    heads
        .into_iter()
        .map(|head| store.add_derived(head))
        .filter(|added| *added)
        .count()
}

fn watermarks(store: &FactStore, group: &IndexSet<&PredicateKey>) -> IndexMap<PredicateKey, usize> {
    group
        .iter()
        .map(|key| ((*key).clone(), store.count(key)))
        .collect()
}

fn windows_since(
    store: &FactStore,
    marks: &IndexMap<PredicateKey, usize>,
) -> IndexMap<PredicateKey, Window> {
    marks
        .iter()
        .map(|(key, &start)| (key.clone(), start..store.count(key)))
        .collect()
}
