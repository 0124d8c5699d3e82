// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Applying a rule at a match.
//!
//! The successor of an agent `C ∘ (R ⊗ id_Z) ∘ d` is
//! `C ∘ (R' ⊗ id_Z) ∘ d'`, where `d'` places parameter `η(j)` in reactum site
//! `j`. Parameters can be copied, dropped or reordered; copies share their
//! links through the context. The result is lean.
use thiserror::Error;
use tracing::{debug, instrument};

use crate::algebra::{self, CompositionError};
use crate::bigraph::Bigraph;
use crate::matching::BigraphMatch;
use crate::rule::ReactionRule;

/// How the reactum is spliced into the hole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReactionMode {
    /// The reactum has no sites; every parameter is discarded.
    Ground,
    /// Reactum sites are filled with parameters through the instantiation map.
    Parametric,
}

/// Failures while rewriting an agent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReactionError {
    /// The instantiation map names a parameter the match does not have.
    #[error("reactum site {site} wants parameter {target}, match has {available}")]
    SiteOutOfRange {
        /// Reactum site.
        site: usize,
        /// Requested parameter.
        target: usize,
        /// Parameters in the match.
        available: usize,
    },
    /// The match came from a different redex.
    #[error("match has {found} parameters, redex has {expected} sites")]
    ParameterCount {
        /// Sites of the rule's redex.
        expected: usize,
        /// Parameters in the match.
        found: usize,
    },
    /// Interfaces did not fit while splicing.
    #[error(transparent)]
    Composition(#[from] CompositionError),
}

/// Rewrites the agent `m` was taken from with `rule`.
///
/// `m` must have been produced by matching `rule.redex()`; the matcher
/// should reserve the reactum's inner names so the shared names `Z` cannot
/// collide with them.
#[instrument(skip_all, fields(rule = rule.label().unwrap_or("-"), mode = ?rule.mode()))]
pub fn apply_reaction(m: &BigraphMatch, rule: &ReactionRule) -> Result<Bigraph, ReactionError> {
    let available = m.parameters().len();
    if available != rule.redex().site_count() {
        return Err(ReactionError::ParameterCount {
            expected: rule.redex().site_count(),
            found: available,
        });
    }
    let reactum = rule.reactum();
    let keep: Vec<String> = reactum.inner_names().map(|(n, _)| n.to_owned()).collect();

    let filled = match rule.mode() {
        ReactionMode::Ground => m.fill(reactum, &keep, &[])?,
        ReactionMode::Parametric => {
            let mut order = Vec::with_capacity(reactum.site_count());
            for site in 0..reactum.site_count() {
                let target = rule.instantiation().target(site).unwrap_or(site);
                if target >= available {
                    return Err(ReactionError::SiteOutOfRange {
                        site,
                        target,
                        available,
                    });
                }
                order.push(target);
            }
            m.fill(reactum, &keep, &order)?
        }
    };

    let result = algebra::lean(&algebra::compose(m.context(), &filled)?);
    debug!(
        nodes = result.node_count(),
        edges = result.edge_count(),
        "reaction applied"
    );
    Ok(result)
}
