// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reaction rules and instantiation maps.
//!
//! A rule is validated once, when it is built; matching and reaction never
//! re-check the redex or the instantiation map.
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::bigraph::Bigraph;
use crate::matching::{self, BigraphMatch, MatchError};
use crate::reaction::ReactionMode;

/// Rule-definition errors, reported before any matching is attempted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    /// Redex and reactum use different signatures.
    #[error("redex and reactum signatures differ")]
    SignatureMismatch,
    /// Redex and reactum differ in their number of roots.
    #[error("redex has {redex} roots, reactum has {reactum}")]
    WidthMismatch {
        /// Roots of the redex.
        redex: usize,
        /// Roots of the reactum.
        reactum: usize,
    },
    /// Redex and reactum differ in their outer names.
    #[error("outer name {0} is not shared by redex and reactum")]
    OuterNameMismatch(String),
    /// The redex cannot be matched.
    #[error("redex is not simple: {0}")]
    RedexNotSimple(MatchError),
    /// A reversible rule's reactum cannot serve as a redex.
    #[error("reactum of a reversible rule is not simple: {0}")]
    ReactumNotSimple(MatchError),
    /// The instantiation map does not cover the reactum sites exactly.
    #[error("instantiation map has {found} entries, reactum has {expected} sites")]
    InstantiationLength {
        /// Sites of the reactum.
        expected: usize,
        /// Entries in the map.
        found: usize,
    },
    /// An entry points past the last redex site.
    #[error("reactum site {site} maps to redex site {target}, redex has {width} sites")]
    InstantiationTarget {
        /// Reactum site.
        site: usize,
        /// Redex site it was mapped to.
        target: usize,
        /// Sites of the redex.
        width: usize,
    },
    /// A reversible rule must copy every parameter exactly once.
    #[error("instantiation map of a reversible rule is not a bijection")]
    NotBijective,
    /// `inverse` was called on a rule that was not declared reversible.
    #[error("rule is not reversible")]
    NotReversible,
}

/// Maps every reactum site to the redex site whose parameter fills it.
///
/// Targets may repeat (copying a parameter) or be missing (discarding one).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct InstantiationMap {
    targets: Vec<usize>,
}

impl InstantiationMap {
    /// `j ↦ j` for `j < width`.
    pub fn identity(width: usize) -> Self {
        Self {
            targets: (0..width).collect(),
        }
    }

    /// Map whose entry `j` is `targets[j]`.
    pub fn from_targets(targets: Vec<usize>) -> Self {
        Self { targets }
    }

    /// Sets `from ↦ to`; intermediate entries not yet defined map to themselves.
    #[must_use]
    pub fn with_mapping(mut self, from: usize, to: usize) -> Self {
        while self.targets.len() <= from {
            self.targets.push(self.targets.len());
        }
        self.targets[from] = to;
        self
    }

    /// Redex site used for reactum site `site`.
    pub fn target(&self, site: usize) -> Option<usize> {
        self.targets.get(site).copied()
    }

    /// All targets in reactum-site order.
    pub fn targets(&self) -> &[usize] {
        &self.targets
    }

    /// Number of reactum sites covered.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// `true` when no site is mapped.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// `true` when every site maps to itself.
    pub fn is_identity(&self) -> bool {
        self.targets.iter().enumerate().all(|(j, t)| j == *t)
    }

    /// `true` when the map is a permutation of `0..len`.
    pub fn is_bijective(&self) -> bool {
        let mut hit = vec![false; self.targets.len()];
        for t in &self.targets {
            match hit.get_mut(*t) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        true
    }

    /// Inverse permutation, if the map is bijective.
    pub fn inverse(&self) -> Option<Self> {
        if !self.is_bijective() {
            return None;
        }
        let mut targets = vec![0; self.targets.len()];
        for (j, t) in self.targets.iter().enumerate() {
            targets[*t] = j;
        }
        Some(Self { targets })
    }
}

/// Extra side condition on an occurrence: `(agent, rule, match)`.
///
/// Occurrences for which the condition returns `false` are not rewritten.
pub type RuleCondition = dyn Fn(&Bigraph, &ReactionRule, &BigraphMatch) -> bool + Send + Sync;

/// A validated rewrite `redex → reactum`.
#[derive(Clone)]
pub struct ReactionRule {
    label: Option<String>,
    redex: Bigraph,
    reactum: Bigraph,
    instantiation: InstantiationMap,
    priority: i32,
    reversible: bool,
    condition: Option<Arc<RuleCondition>>,
}

impl fmt::Debug for ReactionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactionRule")
            .field("label", &self.label)
            .field("redex", &self.redex)
            .field("reactum", &self.reactum)
            .field("instantiation", &self.instantiation)
            .field("priority", &self.priority)
            .field("reversible", &self.reversible)
            .field("conditional", &self.condition.is_some())
            .finish()
    }
}

impl ReactionRule {
    /// Starts a rule; the instantiation map defaults to the identity.
    pub fn builder(redex: Bigraph, reactum: Bigraph) -> ReactionRuleBuilder {
        ReactionRuleBuilder {
            label: None,
            redex,
            reactum,
            instantiation: None,
            priority: 0,
            reversible: false,
            condition: None,
        }
    }

    /// Shorthand for a rule with default settings.
    pub fn new(redex: Bigraph, reactum: Bigraph) -> Result<Self, RuleError> {
        Self::builder(redex, reactum).build()
    }

    /// Label, if one was given or assigned by a reactive system.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub(crate) fn set_label(&mut self, label: String) {
        self.label = Some(label);
    }

    /// Left-hand side.
    pub fn redex(&self) -> &Bigraph {
        &self.redex
    }

    /// Right-hand side.
    pub fn reactum(&self) -> &Bigraph {
        &self.reactum
    }

    /// Reactum-site to redex-site map.
    pub fn instantiation(&self) -> &InstantiationMap {
        &self.instantiation
    }

    /// Higher priorities are tried first.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Whether the rule also applies right to left.
    pub fn is_reversible(&self) -> bool {
        self.reversible
    }

    /// Whether a side condition is attached.
    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }

    /// Checks the side condition of an occurrence of this rule in `agent`.
    /// Unconditional rules accept every occurrence.
    pub fn is_satisfied(&self, agent: &Bigraph, occurrence: &BigraphMatch) -> bool {
        self.condition
            .as_ref()
            .is_none_or(|condition| condition(agent, self, occurrence))
    }

    /// Ground when the reactum has no sites, parametric otherwise.
    pub fn mode(&self) -> ReactionMode {
        if self.reactum.site_count() == 0 {
            ReactionMode::Ground
        } else {
            ReactionMode::Parametric
        }
    }

    /// The rule read right to left, labelled `<label>_inv`.
    pub fn inverse(&self) -> Result<Self, RuleError> {
        if !self.reversible {
            return Err(RuleError::NotReversible);
        }
        let instantiation = self.instantiation.inverse().ok_or(RuleError::NotBijective)?;
        let mut builder = Self::builder(self.reactum.clone(), self.redex.clone())
            .instantiation(instantiation)
            .priority(self.priority);
        if let Some(condition) = &self.condition {
            builder.condition = Some(Arc::clone(condition));
        }
        if let Some(label) = &self.label {
            builder = builder.label(format!("{label}_inv"));
        }
        builder.build()
    }
}

/// Builder returned by [`ReactionRule::builder`].
pub struct ReactionRuleBuilder {
    label: Option<String>,
    redex: Bigraph,
    reactum: Bigraph,
    instantiation: Option<InstantiationMap>,
    priority: i32,
    reversible: bool,
    condition: Option<Arc<RuleCondition>>,
}

impl fmt::Debug for ReactionRuleBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactionRuleBuilder")
            .field("label", &self.label)
            .field("priority", &self.priority)
            .field("reversible", &self.reversible)
            .field("conditional", &self.condition.is_some())
            .finish_non_exhaustive()
    }
}

impl ReactionRuleBuilder {
    /// Human-readable label used on reaction-graph transitions.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Explicit instantiation map.
    #[must_use]
    pub fn instantiation(mut self, map: InstantiationMap) -> Self {
        self.instantiation = Some(map);
        self
    }

    /// Priority; rules with higher values are checked first.
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Declares the rule reversible.
    #[must_use]
    pub fn reversible(mut self, reversible: bool) -> Self {
        self.reversible = reversible;
        self
    }

    /// Side condition checked on every occurrence before it is rewritten.
    #[must_use]
    pub fn condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&Bigraph, &ReactionRule, &BigraphMatch) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(condition));
        self
    }

    /// Validates and freezes the rule.
    pub fn build(self) -> Result<ReactionRule, RuleError> {
        let redex = &self.redex;
        let reactum = &self.reactum;
        if !redex.signature().is_compatible(reactum.signature()) {
            return Err(RuleError::SignatureMismatch);
        }
        if redex.root_count() != reactum.root_count() {
            return Err(RuleError::WidthMismatch {
                redex: redex.root_count(),
                reactum: reactum.root_count(),
            });
        }
        let (lhs, rhs) = (redex.outer_face().names, reactum.outer_face().names);
        if let Some(name) = lhs.symmetric_difference(&rhs).next() {
            return Err(RuleError::OuterNameMismatch(name.clone()));
        }
        matching::check_redex(redex).map_err(RuleError::RedexNotSimple)?;

        let instantiation = self
            .instantiation
            .unwrap_or_else(|| InstantiationMap::identity(reactum.site_count()));
        if instantiation.len() != reactum.site_count() {
            return Err(RuleError::InstantiationLength {
                expected: reactum.site_count(),
                found: instantiation.len(),
            });
        }
        let width = redex.site_count();
        if let Some((site, target)) = instantiation
            .targets()
            .iter()
            .enumerate()
            .find(|(_, t)| **t >= width)
        {
            return Err(RuleError::InstantiationTarget {
                site,
                target: *target,
                width,
            });
        }
        if self.reversible {
            if width != reactum.site_count() || !instantiation.is_bijective() {
                return Err(RuleError::NotBijective);
            }
            matching::check_redex(reactum).map_err(RuleError::ReactumNotSimple)?;
        }

        Ok(ReactionRule {
            label: self.label,
            redex: self.redex,
            reactum: self.reactum,
            instantiation,
            priority: self.priority,
            reversible: self.reversible,
            condition: self.condition,
        })
    }
}
