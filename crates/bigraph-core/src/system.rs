// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Agent, rules and predicates bundled for exploration.
use std::collections::BTreeSet;

use thiserror::Error;

use crate::bigraph::Bigraph;
use crate::predicate::Predicate;
use crate::rule::{ReactionRule, RuleError};

/// Errors raised while assembling a reactive system.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SystemError {
    /// The initial agent has sites or inner names.
    #[error("initial agent is not ground")]
    AgentNotGround,
    /// A rule uses a different signature than the agent.
    #[error("rule {0} uses a different signature than the agent")]
    SignatureMismatch(String),
    /// The inverse of a reversible rule could not be built.
    #[error(transparent)]
    Rule(#[from] RuleError),
}

/// Initial agent plus labelled rules and predicates.
#[derive(Debug, Clone)]
pub struct ReactiveSystem {
    agent: Bigraph,
    rules: Vec<ReactionRule>,
    predicates: Vec<(String, Predicate)>,
    labels: BTreeSet<String>,
    declared: usize,
}

impl ReactiveSystem {
    /// System starting from `agent`, which must be ground.
    pub fn new(agent: Bigraph) -> Result<Self, SystemError> {
        if !agent.is_ground() {
            return Err(SystemError::AgentNotGround);
        }
        Ok(Self {
            agent,
            rules: Vec::new(),
            predicates: Vec::new(),
            labels: BTreeSet::new(),
            declared: 0,
        })
    }

    /// Initial agent.
    pub fn agent(&self) -> &Bigraph {
        &self.agent
    }

    /// Adds a rule and, if it is reversible, its inverse.
    ///
    /// Unlabelled rules are named `r0`, `r1`, ...; a label already in use
    /// gets a numeric suffix. Returns the label assigned to `rule`.
    pub fn add_rule(&mut self, mut rule: ReactionRule) -> Result<String, SystemError> {
        let base = rule
            .label()
            .map_or_else(|| format!("r{}", self.declared), str::to_owned);
        let label = self.unique_label(base);
        if !rule.redex().signature().is_compatible(self.agent.signature()) {
            return Err(SystemError::SignatureMismatch(label));
        }
        rule.set_label(label.clone());
        self.declared += 1;
        let inverse = if rule.is_reversible() {
            Some(rule.inverse()?)
        } else {
            None
        };
        self.insert(rule);
        if let Some(mut inv) = inverse {
            let inv_label = self.unique_label(format!("{label}_inv"));
            inv.set_label(inv_label);
            self.insert(inv);
        }
        Ok(label)
    }

    fn insert(&mut self, rule: ReactionRule) {
        if let Some(l) = rule.label() {
            self.labels.insert(l.to_owned());
        }
        let at = self
            .rules
            .partition_point(|r| r.priority() >= rule.priority());
        self.rules.insert(at, rule);
    }

    fn unique_label(&self, base: String) -> String {
        if !self.labels.contains(&base) {
            return base;
        }
        (1..)
            .map(|i| format!("{base}_{i}"))
            .find(|candidate| !self.labels.contains(candidate))
            .unwrap_or(base)
    }

    /// Adds a predicate; unlabelled predicates are named `p0`, `p1`, ....
    pub fn add_predicate(&mut self, label: Option<&str>, predicate: Predicate) -> String {
        let label = label.map_or_else(|| format!("p{}", self.predicates.len()), str::to_owned);
        let label = if self.predicates.iter().any(|(l, _)| *l == label) {
            (1..)
                .map(|i| format!("{label}_{i}"))
                .find(|c| !self.predicates.iter().any(|(l, _)| l == c))
                .unwrap_or(label)
        } else {
            label
        };
        self.predicates.push((label.clone(), predicate));
        label
    }

    /// Rules in checking order: descending priority, then declaration.
    pub fn rules(&self) -> impl Iterator<Item = &ReactionRule> + '_ {
        self.rules.iter()
    }

    /// Number of rules, inverses included.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Labelled predicates in declaration order.
    pub fn predicates(&self) -> &[(String, Predicate)] {
        &self.predicates
    }
}
