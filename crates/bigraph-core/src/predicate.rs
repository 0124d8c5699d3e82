// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! State predicates evaluated by the model checker.
//!
//! Empty conjunctions and empty disjunctions both evaluate to `true`.
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::bigraph::Bigraph;
use crate::canonical::{canonical_key, CanonicalKey, StructuralSummary};
use crate::matching::{self, MatchError, Matcher};

/// Failures while evaluating a predicate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PredicateError {
    /// The pattern of a sub-bigraph predicate could not be matched.
    #[error("sub-bigraph predicate: {0}")]
    Match(#[from] MatchError),
    /// A custom predicate reported a failure.
    #[error("predicate {name} failed: {message}")]
    Custom {
        /// Name given to the custom predicate.
        name: String,
        /// Failure message.
        message: String,
    },
    /// Failure of a labelled predicate inside a [`PredicateChecker`].
    #[error("predicate {label}: {source}")]
    Labelled {
        /// Label of the failing predicate.
        label: String,
        /// Underlying failure.
        #[source]
        source: Box<PredicateError>,
    },
}

/// Holds when the agent is isomorphic to a fixed target.
#[derive(Debug, Clone)]
pub struct IsoPredicate {
    summary: StructuralSummary,
    key: CanonicalKey,
}

impl IsoPredicate {
    /// Precomputes the target's summary and canonical key.
    pub fn new(target: &Bigraph) -> Self {
        Self {
            summary: StructuralSummary::of(target),
            key: canonical_key(target),
        }
    }

    /// Canonical key of the target.
    pub fn key(&self) -> &CanonicalKey {
        &self.key
    }

    fn test(&self, agent: &Bigraph) -> bool {
        StructuralSummary::of(agent) == self.summary && canonical_key(agent) == self.key
    }
}

/// Custom test function: `Ok(bool)` or a failure message.
pub type CustomTest = dyn Fn(&Bigraph) -> Result<bool, String> + Send + Sync;

/// A boolean test over agents.
#[derive(Clone)]
pub enum Predicate {
    /// Agent isomorphic to a target.
    Iso(IsoPredicate),
    /// Pattern occurs somewhere in the agent.
    Sub(Bigraph),
    /// All operands hold.
    And(Vec<Predicate>),
    /// At least one operand holds.
    Or(Vec<Predicate>),
    /// Operand does not hold.
    Not(Box<Predicate>),
    /// User-supplied test.
    Custom {
        /// Name reported in errors.
        name: String,
        /// Test function.
        test: Arc<CustomTest>,
    },
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iso(p) => f.debug_tuple("Iso").field(p.key()).finish(),
            Self::Sub(pattern) => f
                .debug_struct("Sub")
                .field("nodes", &pattern.node_count())
                .field("roots", &pattern.root_count())
                .finish(),
            Self::And(ps) => f.debug_tuple("And").field(ps).finish(),
            Self::Or(ps) => f.debug_tuple("Or").field(ps).finish(),
            Self::Not(p) => f.debug_tuple("Not").field(p).finish(),
            Self::Custom { name, .. } => f.debug_tuple("Custom").field(name).finish(),
        }
    }
}

impl Predicate {
    /// Isomorphism with `target`.
    pub fn iso(target: &Bigraph) -> Self {
        Self::Iso(IsoPredicate::new(target))
    }

    /// Occurrence of `pattern`; the pattern must be a valid redex.
    pub fn sub(pattern: Bigraph) -> Result<Self, PredicateError> {
        matching::check_redex(&pattern)?;
        Ok(Self::Sub(pattern))
    }

    /// Named custom test.
    pub fn custom<F>(name: impl Into<String>, test: F) -> Self
    where
        F: Fn(&Bigraph) -> Result<bool, String> + Send + Sync + 'static,
    {
        Self::Custom {
            name: name.into(),
            test: Arc::new(test),
        }
    }

    /// Logical negation.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }

    /// Conjunction, flattening nested conjunctions.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::And(mut ps) => {
                ps.push(other);
                Self::And(ps)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Disjunction, flattening nested disjunctions.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match self {
            Self::Or(mut ps) => {
                ps.push(other);
                Self::Or(ps)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    /// Evaluates the predicate on `agent`. Combinators short-circuit.
    pub fn test(&self, agent: &Bigraph) -> Result<bool, PredicateError> {
        match self {
            Self::Iso(p) => Ok(p.test(agent)),
            Self::Sub(pattern) => Ok(Matcher::new(agent, pattern)?.has_match()),
            Self::And(ps) => {
                for p in ps {
                    if !p.test(agent)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or(ps) => {
                if ps.is_empty() {
                    return Ok(true);
                }
                for p in ps {
                    if p.test(agent)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Not(p) => Ok(!p.test(agent)?),
            Self::Custom { name, test } => test(agent).map_err(|message| PredicateError::Custom {
                name: name.clone(),
                message,
            }),
        }
    }
}

/// Evaluates a labelled predicate set and keeps the results of the last agent.
#[derive(Debug, Clone, Default)]
pub struct PredicateChecker {
    predicates: Vec<(String, Predicate)>,
    last: Vec<bool>,
}

impl PredicateChecker {
    /// Checker over `predicates`.
    pub fn new(predicates: Vec<(String, Predicate)>) -> Self {
        Self {
            predicates,
            last: Vec::new(),
        }
    }

    /// Number of predicates.
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    /// `true` when there is nothing to check.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Predicate labels in evaluation order.
    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.predicates.iter().map(|(l, _)| l.as_str())
    }

    /// Evaluates every predicate; returns whether all of them held.
    ///
    /// On failure the results of the previous agent are discarded.
    pub fn check_all(&mut self, agent: &Bigraph) -> Result<bool, PredicateError> {
        self.last.clear();
        let mut results = Vec::with_capacity(self.predicates.len());
        for (label, predicate) in &self.predicates {
            let held = predicate.test(agent).map_err(|e| PredicateError::Labelled {
                label: label.clone(),
                source: Box::new(e),
            })?;
            results.push(held);
        }
        self.last = results;
        Ok(self.last.iter().all(|b| *b))
    }

    /// `(label, held)` for the last agent checked.
    pub fn results(&self) -> impl Iterator<Item = (&str, bool)> + '_ {
        self.labels().zip(self.last.iter().copied())
    }

    /// Labels that did not hold on the last agent.
    pub fn violated(&self) -> impl Iterator<Item = &str> + '_ {
        self.results().filter(|(_, held)| !held).map(|(l, _)| l)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{BigraphBuilder, Signature};

    fn agent(controls: &[&str]) -> Bigraph {
        let sig = Signature::builder()
            .active("A", 0)
            .active("B", 0)
            .build()
            .unwrap();
        let mut b = BigraphBuilder::new(sig);
        let r = b.root();
        for c in controls {
            b.node(r, c).unwrap();
        }
        b.build().unwrap()
    }

    #[test]
    fn empty_combinators_hold() {
        let g = agent(&["A"]);
        assert!(Predicate::And(Vec::new()).test(&g).unwrap());
        assert!(Predicate::Or(Vec::new()).test(&g).unwrap());
    }

    #[test]
    fn iso_and_sub() {
        let g = agent(&["A", "B"]);
        assert!(Predicate::iso(&agent(&["B", "A"])).test(&g).unwrap());
        assert!(!Predicate::iso(&agent(&["A"])).test(&g).unwrap());

        let has_b = Predicate::sub(agent(&["B"])).unwrap();
        assert!(has_b.test(&g).unwrap());
        assert!(!has_b.clone().negate().test(&g).unwrap());
        assert!(!has_b.test(&agent(&["A"])).unwrap());
    }

    #[test]
    fn checker_reports_violations_and_failures() {
        let mut checker = PredicateChecker::new(vec![
            ("has-a".into(), Predicate::sub(agent(&["A"])).unwrap()),
            ("has-b".into(), Predicate::sub(agent(&["B"])).unwrap()),
        ]);
        assert!(!checker.check_all(&agent(&["A"])).unwrap());
        assert_eq!(checker.violated().collect::<Vec<_>>(), vec!["has-b"]);

        let mut failing = PredicateChecker::new(vec![(
            "boom".into(),
            Predicate::custom("boom", |_| Err("no".into())),
        )]);
        let err = failing.check_all(&agent(&["A"])).unwrap_err();
        assert!(matches!(err, PredicateError::Labelled { ref label, .. } if label == "boom"));
        assert_eq!(failing.results().count(), 0);
    }
}
