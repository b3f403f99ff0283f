use std::cell::OnceCell;

use indexmap::IndexMap;
use log::debug;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::{self, Answers};
use crate::error::{NegationCycleError, Result, SafetyError};
use crate::store::{FactStore, Relation};
use crate::stratify::{stratify, Stratification};
use crate::term::{Atom, PredicateKey, Rule};

/// An immutable Datalog program: ground facts plus rules, grouped by predicate.
///
/// A predicate may be purely extensional (facts only), intensional (rules
/// only) or intensional with seed facts. Strata are computed on the first
/// query that needs them and cached for the lifetime of the dataset.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    facts: IndexMap<PredicateKey, Relation>,
    rules: IndexMap<PredicateKey, Vec<Rule>>,
    strata: OnceCell<Result<Stratification, NegationCycleError>>,
}

/// The serialized form of a program, as read by [`Dataset::from_json`]
#[cfg(feature = "serde")]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    /// Ground facts
    #[serde(default)]
    pub facts: Vec<Atom>,
    /// Rules, in definition order
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Dataset {
    /// Builds a dataset, rejecting non-ground facts and unsafe rules.
    ///
    /// Duplicate facts are collapsed; the first occurrence fixes the order.
    ///
    /// # Errors
    ///
    /// Returns [`SafetyError`] if a fact contains a variable or a rule's head
    /// variable is not bound by any positive body literal.
    pub fn new(
        facts: impl IntoIterator<Item = Atom>,
        rules: impl IntoIterator<Item = Rule>,
    ) -> Result<Self, SafetyError> {
        let mut dataset = Self::default();

        for fact in facts {
            if !fact.is_ground() {
                return Err(SafetyError::NonGroundFact {
                    fact: fact.to_string(),
                });
            }
            let arity = fact.arity();
            dataset
                .facts
                .entry(fact.key())
                .or_insert_with(|| Relation::new(arity))
                .insert(fact);
        }

        for rule in rules {
            check_safety(&rule)?;
            dataset.rules.entry(rule.head.key()).or_default().push(rule);
        }

        debug!(
            "dataset built: {} facts over {} relations, {} intensional predicates",
            dataset.fact_count(),
            dataset.facts.len(),
            dataset.rules.len()
        );
        Ok(dataset)
    }

    /// Reads a program from JSON of the form `{"facts": [...], "rules": [...]}`
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON or when the program is rejected by [`Dataset::new`].
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self> {
        let program: Program = serde_json::from_str(json)?;
        Ok(Self::new(program.facts, program.rules)?)
    }

    /// Stored facts for `key`, in insertion order
    pub fn facts_for(&self, key: &PredicateKey) -> impl Iterator<Item = &Atom> {
        self.facts.get(key).into_iter().flat_map(|relation| relation.rows())
    }

    /// Rules defining `key`, in definition order; empty for extensional predicates
    #[must_use]
    pub fn rules_for(&self, key: &PredicateKey) -> &[Rule] {
        self.rules.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// All rules, grouped by head predicate
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values().flatten()
    }

    /// Returns `true` if at least one rule defines `key`
    #[must_use]
    pub fn is_intensional(&self, key: &PredicateKey) -> bool {
        self.rules.contains_key(key)
    }

    /// Every predicate with stored facts or rules, facts first
    pub fn predicates(&self) -> impl Iterator<Item = &PredicateKey> {
        self.facts
            .keys()
            .chain(self.rules.keys().filter(|key| !self.facts.contains_key(*key)))
    }

    /// Total number of stored facts
    #[must_use]
    pub fn fact_count(&self) -> usize {
        self.facts.values().map(Relation::len).sum()
    }

    /// The predicate strata, computed once and cached
    ///
    /// # Errors
    ///
    /// Returns [`NegationCycleError`] if a predicate depends negatively on
    /// itself. The error is cached as well.
    pub fn stratification(&self) -> Result<&Stratification, NegationCycleError> {
        self.strata
            .get_or_init(|| stratify(self))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// A fresh working store seeded with the stored facts
    pub(crate) fn fact_store(&self) -> FactStore {
        FactStore::from_relations(self.facts.clone())
    }

    pub(crate) fn relation(&self, key: &PredicateKey) -> Option<&Relation> {
        self.facts.get(key)
    }

    /// Same as [`engine::evaluate`]
    ///
    /// # Errors
    ///
    /// See [`engine::evaluate`].
    pub fn query(&self, query: &Atom) -> Result<Answers<'_>> {
        engine::evaluate(self, query)
    }

    /// Returns whether any fact, stored or derivable, matches `query`
    ///
    /// # Errors
    ///
    /// See [`engine::evaluate`].
    pub fn ask(&self, query: &Atom) -> Result<bool> {
        Ok(self.query(query)?.next().is_some())
    }
}

/// Every head variable must be bound by a positive body literal.
/// Variables that only occur under negation are existential and never
/// reach the head.
fn check_safety(rule: &Rule) -> Result<(), SafetyError> {
    for var in rule.head.variables() {
        let bound = rule
            .positive_atoms()
            .any(|atom| atom.terms.iter().any(|term| term.as_var() == Some(var)));
        if !bound {
            return Err(SafetyError::UnboundHeadVariable {
                rule: rule.to_string(),
                variable: var.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Literal;

    fn pos(pred: &str, args: &[&str]) -> Literal {
        Literal::Positive(Atom::from_tokens(pred, args))
    }

    fn neg(pred: &str, args: &[&str]) -> Literal {
        Literal::Negative(Atom::from_tokens(pred, args))
    }

    #[test]
    fn test_facts_keep_insertion_order_and_collapse_duplicates() {
        let dataset = Dataset::new(
            vec![
                Atom::from_tokens("a", &["c"]),
                Atom::from_tokens("a", &["b"]),
                Atom::from_tokens("a", &["c"]),
            ],
            vec![],
        )
        .unwrap();
        let rows: Vec<String> = dataset
            .facts_for(&PredicateKey::new("a", 1))
            .map(ToString::to_string)
            .collect();
        assert_eq!(rows, vec!["a(c)", "a(b)"]);
        assert_eq!(dataset.fact_count(), 2);
    }

    #[test]
    fn test_same_name_different_arity_are_distinct_relations() {
        let dataset = Dataset::new(
            vec![Atom::from_tokens("p", &["a"]), Atom::from_tokens("p", &["a", "b"])],
            vec![],
        )
        .unwrap();
        assert_eq!(dataset.facts_for(&PredicateKey::new("p", 1)).count(), 1);
        assert_eq!(dataset.facts_for(&PredicateKey::new("p", 2)).count(), 1);
        assert_eq!(dataset.predicates().count(), 2);
    }

    #[test]
    fn test_non_ground_fact_is_rejected() {
        let err = Dataset::new(vec![Atom::from_tokens("edge", &["a", "X"])], vec![]).unwrap_err();
        assert_eq!(
            err,
            SafetyError::NonGroundFact {
                fact: "edge(a, X)".to_string()
            }
        );
    }

    #[test]
    fn test_unbound_head_variable_is_rejected() {
        let rule = Rule::new(
            Atom::from_tokens("result", &["X", "Y"]),
            vec![pos("person", &["X"])],
        );
        let err = Dataset::new(vec![], vec![rule]).unwrap_err();
        assert!(matches!(
            err,
            SafetyError::UnboundHeadVariable { ref variable, .. } if variable == "Y"
        ));
    }

    #[test]
    fn test_head_variable_bound_only_under_negation_is_rejected() {
        let rule = Rule::new(
            Atom::from_tokens("lonely", &["X"]),
            vec![pos("person", &["Y"]), neg("friend", &["X", "Y"])],
        );
        assert!(Dataset::new(vec![], vec![rule]).is_err());
    }

    #[test]
    fn test_existential_variable_under_negation_is_safe() {
        let rule = Rule::new(
            Atom::from_tokens("no-b", &["X", "Y"]),
            vec![pos("a", &["X", "Y"]), neg("b", &["X", "Z"])],
        );
        assert!(Dataset::new(vec![], vec![rule]).is_ok());
    }

    #[test]
    fn test_rules_group_by_head_predicate() {
        let rules = vec![
            Rule::new(Atom::from_tokens("path", &["A", "B"]), vec![pos("edge", &["A", "B"])]),
            Rule::new(
                Atom::from_tokens("path", &["A", "B"]),
                vec![pos("edge", &["A", "C"]), pos("path", &["C", "B"])],
            ),
        ];
        let dataset = Dataset::new(vec![], rules).unwrap();
        let path = PredicateKey::new("path", 2);
        assert!(dataset.is_intensional(&path));
        assert!(!dataset.is_intensional(&PredicateKey::new("edge", 2)));
        assert_eq!(dataset.rules_for(&path).len(), 2);
        assert!(dataset.rules_for(&PredicateKey::new("edge", 2)).is_empty());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_from_json_builds_checked_dataset() {
        let json = r#"{
            "facts": [
                {"predicate": "edge", "terms": [{"constant": "a"}, {"constant": "b"}]}
            ],
            "rules": [
                {
                    "head": {"predicate": "path", "terms": [{"var": "X"}, {"var": "Y"}]},
                    "body": [
                        {"positive": {"predicate": "edge", "terms": [{"var": "X"}, {"var": "Y"}]}}
                    ]
                }
            ]
        }"#;
        let dataset = Dataset::from_json(json).unwrap();
        assert_eq!(dataset.fact_count(), 1);
        assert!(dataset.is_intensional(&PredicateKey::new("path", 2)));

        let unsafe_json = r#"{
            "rules": [
                {"head": {"predicate": "p", "terms": [{"var": "X"}]}, "body": []}
            ]
        }"#;
        assert!(matches!(
            Dataset::from_json(unsafe_json),
            Err(crate::Error::Safety(_))
        ));
        assert!(matches!(
            Dataset::from_json("{not json"),
            Err(crate::Error::Json(_))
        ));
    }
}
