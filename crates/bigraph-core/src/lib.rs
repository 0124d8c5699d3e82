// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! bigraph-core: bigraphical reactive systems.
//!
//! Immutable bigraphs over a fixed signature, contextual matching of
//! redexes, ground and parametric reaction, isomorphism-invariant canonical
//! keys and a model checker that explores the reaction graph of a reactive
//! system under transition and wall-clock budgets.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::many_single_char_names,
    clippy::module_name_repetitions,
    clippy::use_self
)]

/// Composition, products, identities and link surgery.
pub mod algebra;
mod bigraph;
mod builder;
mod canonical;
mod checker;
mod connectivity;
mod matching;
mod options;
/// Scoped worker fan-out used by matching and exploration.
pub mod parallel;
mod predicate;
mod prng;
mod reaction;
mod reaction_graph;
mod rule;
mod signature;
mod system;

/// Bigraph value, identifiers and interfaces.
pub use bigraph::{Bigraph, EdgeId, Interface, Link, NodeId, Parent, Place, Point};
/// Bigraph construction.
pub use builder::{BigraphBuilder, BuildError};
/// Canonical keys and isomorphism checks.
pub use canonical::{canonical_key, is_isomorphic, CanonicalKey, Digest, StructuralSummary};
/// Model checker, listener and exploration report.
pub use checker::{
    CheckerError, Counterexample, ExpansionError, ExpansionFailure, ExplorationListener,
    ExplorationReport, ExplorationStats, ModelChecker, Termination,
};
/// Union-find and link-connected components.
pub use connectivity::{connected_components, is_link_connected, LinkPartition, UnionFind};
/// Matching engine.
pub use matching::{check_redex, BigraphMatch, MatchError, Matcher, Matches};
/// Model-checking options.
pub use options::{ExplorationOrder, ModelCheckingOptions, RuleSelection};
/// State predicates.
pub use predicate::{CustomTest, IsoPredicate, Predicate, PredicateChecker, PredicateError};
/// Deterministic generator for the random exploration modes.
pub use prng::Prng;
/// Reaction application.
pub use reaction::{apply_reaction, ReactionError, ReactionMode};
/// Reaction graph.
pub use reaction_graph::{ReactionGraph, State, StateId, StateStatus, Transition};
/// Reaction rules.
pub use rule::{InstantiationMap, ReactionRule, ReactionRuleBuilder, RuleCondition, RuleError};
/// Signatures and controls.
pub use signature::{Control, ControlId, ControlStatus, Signature, SignatureBuilder, SignatureError};
/// Reactive systems.
pub use system::{ReactiveSystem, SystemError};
