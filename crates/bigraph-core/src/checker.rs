// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! State-space exploration.
//!
//! The checker pops frontier states, applies every rule at every match and
//! folds the successors into a [`ReactionGraph`]. Successors of a batch of
//! frontier states may be computed on worker threads; the graph, the
//! predicate checker and the listener are only touched by the coordinating
//! thread, which consumes the batch results in frontier order.
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::bigraph::Bigraph;
use crate::canonical::{canonical_key, CanonicalKey};
use crate::matching::{MatchError, Matcher};
use crate::options::{ExplorationOrder, ModelCheckingOptions, RuleSelection};
use crate::parallel;
use crate::predicate::{PredicateChecker, PredicateError};
use crate::prng::Prng;
use crate::reaction::{apply_reaction, ReactionError};
use crate::reaction_graph::{ReactionGraph, StateId, Transition};
use crate::rule::ReactionRule;
use crate::system::ReactiveSystem;

/// Invalid checker configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckerError {
    /// Parallel expansion was requested with zero workers.
    #[error("parallel exploration needs at least one worker")]
    ZeroWorkers,
}

/// Failure that aborted the expansion of one state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExpansionError {
    /// The rule's redex could not be matched against the state.
    #[error(transparent)]
    Match(#[from] MatchError),
    /// Rewriting failed.
    #[error(transparent)]
    Reaction(#[from] ReactionError),
    /// A predicate failed on a new state.
    #[error(transparent)]
    Predicate(#[from] PredicateError),
}

/// An [`ExpansionError`] with the state and rule it occurred at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionFailure {
    /// State being expanded or checked.
    pub state: StateId,
    /// Rule being applied, if any.
    pub rule: Option<String>,
    /// What went wrong.
    pub error: ExpansionError,
}

/// Why exploration stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Termination {
    /// The frontier is empty; the graph is complete.
    Completed,
    /// The transition budget was reached.
    TransitionBudget,
    /// The wall-clock budget was reached.
    TimeBudget,
}

/// Counters of one exploration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExplorationStats {
    /// Distinct states discovered.
    pub states: usize,
    /// Transitions recorded in the graph.
    pub transitions: usize,
    /// Rule applications performed.
    pub occurrences: usize,
    /// States whose successors were computed.
    pub expanded: usize,
    /// Wall-clock time, when measured.
    pub elapsed: Option<Duration>,
}

/// A state on which a predicate did not hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counterexample {
    /// Label of the predicate.
    pub predicate: String,
    /// Offending state.
    pub state: StateId,
    /// Shortest path from the initial state.
    pub trace: Vec<Transition>,
}

/// Outcome of [`ModelChecker::explore`].
#[derive(Debug, Clone)]
pub struct ExplorationReport {
    /// States and transitions discovered.
    pub graph: ReactionGraph,
    /// Why exploration stopped.
    pub termination: Termination,
    /// Counters.
    pub stats: ExplorationStats,
    /// Predicate violations in discovery order.
    pub violations: Vec<Counterexample>,
    /// Expansion steps that failed.
    pub failures: Vec<ExpansionFailure>,
}

impl ExplorationReport {
    /// `true` when the frontier was exhausted.
    pub fn is_complete(&self) -> bool {
        self.termination == Termination::Completed
    }
}

/// Callbacks fired on the coordinating thread during exploration.
///
/// Every method has an empty default body.
#[allow(unused_variables)]
pub trait ExplorationListener {
    /// Exploration begins at `initial`.
    fn on_started(&mut self, initial: &Bigraph) {}
    /// `rule` was tried on `state`.
    fn on_checking_rule(&mut self, state: StateId, rule: &str) {}
    /// `rule` matched `state` `occurrences` times.
    fn on_rule_applies(&mut self, state: StateId, rule: &str, occurrences: usize) {}
    /// Every predicate held on a new state.
    fn on_all_predicates_matched(&mut self, state: StateId) {}
    /// `predicate` held on a new state.
    fn on_predicate_matched(&mut self, state: StateId, predicate: &str) {}
    /// A predicate did not hold.
    fn on_predicate_violated(&mut self, counterexample: &Counterexample) {}
    /// An expansion step failed.
    fn on_error(&mut self, failure: &ExpansionFailure) {}
    /// Exploration ended.
    fn on_finished(&mut self, stats: &ExplorationStats, termination: Termination) {}
}

struct RuleOutcome {
    rule: String,
    successors: Vec<(CanonicalKey, Bigraph)>,
}

type StepResult = Result<Vec<RuleOutcome>, (Option<String>, ExpansionError)>;

/// Explores the state space of a [`ReactiveSystem`].
pub struct ModelChecker {
    system: ReactiveSystem,
    options: ModelCheckingOptions,
    listener: Option<Box<dyn ExplorationListener>>,
}

impl fmt::Debug for ModelChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelChecker")
            .field("system", &self.system)
            .field("options", &self.options)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl ModelChecker {
    /// Checker for `system` under `options`.
    pub fn new(system: ReactiveSystem, options: ModelCheckingOptions) -> Result<Self, CheckerError> {
        if options.parallel && options.workers == Some(0) {
            return Err(CheckerError::ZeroWorkers);
        }
        Ok(Self {
            system,
            options,
            listener: None,
        })
    }

    /// Installs a listener.
    #[must_use]
    pub fn with_listener(mut self, listener: Box<dyn ExplorationListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// System under exploration.
    pub fn system(&self) -> &ReactiveSystem {
        &self.system
    }

    /// Active options.
    pub fn options(&self) -> &ModelCheckingOptions {
        &self.options
    }

    /// Runs the exploration until the frontier is empty or a budget is hit.
    #[instrument(skip_all, fields(
        rules = self.system.rule_count(),
        predicates = self.system.predicates().len(),
        order = ?self.options.exploration_order,
    ))]
    pub fn explore(&mut self) -> ExplorationReport {
        let started = Instant::now();
        let workers = self.options.effective_workers();
        let rules: Vec<&ReactionRule> = self.system.rules().collect();
        let mut prng = Prng::from_seed(self.options.seed);
        let mut checker = PredicateChecker::new(self.system.predicates().to_vec());
        let mut listener = self.listener.take();
        info!(workers, "exploration started");
        if let Some(l) = listener.as_mut() {
            l.on_started(self.system.agent());
        }

        let mut run = Run {
            options: &self.options,
            graph: ReactionGraph::new(),
            checker: &mut checker,
            listener,
            stats: ExplorationStats::default(),
            violations: Vec::new(),
            failures: Vec::new(),
            root: None,
        };

        let initial = self.system.agent().clone();
        let (root, _) = run.graph.insert_state(canonical_key(&initial), initial);
        run.root = Some(root);
        run.check_predicates(root);

        let mut frontier = VecDeque::from([root]);
        let termination = loop {
            if frontier.is_empty() {
                break Termination::Completed;
            }
            if run.graph.transition_count() >= self.options.max_transitions {
                debug!(transitions = run.graph.transition_count(), "transition budget reached");
                break Termination::TransitionBudget;
            }
            if self
                .options
                .max_wall_clock
                .is_some_and(|budget| started.elapsed() >= budget)
            {
                debug!(elapsed = ?started.elapsed(), "time budget reached");
                break Termination::TimeBudget;
            }

            let mut batch = Vec::with_capacity(workers);
            while batch.len() < workers {
                let next = match self.options.exploration_order {
                    ExplorationOrder::Bfs => frontier.pop_front(),
                    ExplorationOrder::Dfs => frontier.pop_back(),
                    ExplorationOrder::Random => {
                        let i = prng.below(frontier.len());
                        frontier.swap_remove_back(i)
                    }
                };
                let Some(id) = next else { break };
                let mut order: Vec<usize> = (0..rules.len()).collect();
                if self.options.rule_selection == RuleSelection::Random {
                    prng.shuffle(&mut order);
                }
                let agent = run.graph.state(id).map(|s| s.agent.clone());
                if let Some(agent) = agent {
                    batch.push((id, agent, order));
                }
            }

            // Workers left idle by a short batch search for matches instead.
            let match_workers = (workers / batch.len().max(1)).max(1);
            let results: Vec<StepResult> = parallel::fan_out(batch.len(), workers, |i| {
                let (_, agent, order) = &batch[i];
                successors(agent, &rules, order, match_workers)
            });
            for ((id, _, _), result) in batch.iter().zip(results) {
                debug!(state = id.index(), "expanding state");
                run.absorb(*id, result, &mut frontier);
            }
        };

        run.stats.states = run.graph.state_count();
        run.stats.transitions = run.graph.transition_count();
        if self.options.measure_time {
            run.stats.elapsed = Some(started.elapsed());
        }
        info!(
            states = run.stats.states,
            transitions = run.stats.transitions,
            expanded = run.stats.expanded,
            ?termination,
            "exploration finished"
        );
        if let Some(l) = run.listener.as_mut() {
            l.on_finished(&run.stats, termination);
        }

        self.listener = run.listener.take();
        ExplorationReport {
            graph: run.graph,
            termination,
            stats: run.stats,
            violations: run.violations,
            failures: run.failures,
        }
    }
}

/// Every successor of `agent` under `rules`, taken in `order`. Matches are
/// searched on up to `match_workers` threads; occurrences whose rule
/// condition fails are skipped.
fn successors(
    agent: &Bigraph,
    rules: &[&ReactionRule],
    order: &[usize],
    match_workers: usize,
) -> StepResult {
    let mut outcomes = Vec::with_capacity(order.len());
    for i in order {
        let rule = rules[*i];
        let label = rule.label().unwrap_or_default().to_owned();
        let fail = |e: ExpansionError| (Some(label.clone()), e);
        let matcher = Matcher::new(agent, rule.redex())
            .map_err(|e| fail(e.into()))?
            .reserve_names(rule.reactum().inner_names().map(|(n, _)| n.to_owned()));
        let occurrences = if match_workers > 1 {
            matcher.collect_matches(match_workers)
        } else {
            matcher.matches().collect()
        };
        let mut found = Vec::new();
        for m in occurrences.iter().filter(|m| rule.is_satisfied(agent, m)) {
            let next = apply_reaction(m, rule).map_err(|e| fail(e.into()))?;
            found.push((canonical_key(&next), next));
        }
        outcomes.push(RuleOutcome {
            rule: label,
            successors: found,
        });
    }
    Ok(outcomes)
}

/// Mutable exploration state owned by the coordinating thread.
struct Run<'r> {
    options: &'r ModelCheckingOptions,
    graph: ReactionGraph,
    checker: &'r mut PredicateChecker,
    listener: Option<Box<dyn ExplorationListener>>,
    stats: ExplorationStats,
    violations: Vec<Counterexample>,
    failures: Vec<ExpansionFailure>,
    root: Option<StateId>,
}

impl Run<'_> {
    fn absorb(&mut self, id: StateId, result: StepResult, frontier: &mut VecDeque<StateId>) {
        self.stats.expanded += 1;
        self.graph.mark_expanded(id);
        let outcomes = match result {
            Ok(outcomes) => outcomes,
            Err((rule, error)) => {
                self.fail(id, rule, error);
                return;
            }
        };
        for outcome in outcomes {
            if let Some(l) = self.listener.as_mut() {
                l.on_checking_rule(id, &outcome.rule);
            }
            debug!(state = id.index(), rule = %outcome.rule, matches = outcome.successors.len(), "rule checked");
            if outcome.successors.is_empty() {
                continue;
            }
            if let Some(l) = self.listener.as_mut() {
                l.on_rule_applies(id, &outcome.rule, outcome.successors.len());
            }
            for (key, agent) in outcome.successors {
                self.stats.occurrences += 1;
                let (target, fresh) = self.graph.insert_state(key, agent);
                if fresh || self.options.reaction_graph_with_cycles {
                    self.graph
                        .add_transition(id, &outcome.rule, target, self.options.symmetry_reduction);
                }
                if fresh {
                    frontier.push_back(target);
                    self.check_predicates(target);
                }
            }
        }
    }

    fn check_predicates(&mut self, id: StateId) {
        if self.checker.is_empty() {
            return;
        }
        let Some(agent) = self.graph.state(id).map(|s| s.agent.clone()) else {
            return;
        };
        let all = match self.checker.check_all(&agent) {
            Ok(all) => all,
            Err(e) => {
                self.fail(id, None, ExpansionError::Predicate(e));
                return;
            }
        };
        let results: Vec<(String, bool)> = self
            .checker
            .results()
            .map(|(l, held)| (l.to_owned(), held))
            .collect();
        for (label, held) in results {
            if held {
                self.graph.record_predicate(id, &label);
                if let Some(l) = self.listener.as_mut() {
                    l.on_predicate_matched(id, &label);
                }
            } else {
                let trace = self
                    .root
                    .and_then(|root| self.graph.shortest_path(root, id))
                    .map(|path| path.into_iter().cloned().collect())
                    .unwrap_or_default();
                let counterexample = Counterexample {
                    predicate: label,
                    state: id,
                    trace,
                };
                debug!(state = id.index(), predicate = %counterexample.predicate, "predicate violated");
                if let Some(l) = self.listener.as_mut() {
                    l.on_predicate_violated(&counterexample);
                }
                self.violations.push(counterexample);
            }
        }
        if all {
            if let Some(l) = self.listener.as_mut() {
                l.on_all_predicates_matched(id);
            }
        }
    }

    fn fail(&mut self, state: StateId, rule: Option<String>, error: ExpansionError) {
        debug!(state = state.index(), %error, "expansion step failed");
        let failure = ExpansionFailure { state, rule, error };
        if let Some(l) = self.listener.as_mut() {
            l.on_error(&failure);
        }
        self.failures.push(failure);
    }
}
