// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Model-checking configuration.
use std::time::Duration;

/// Order in which frontier states are expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ExplorationOrder {
    /// First in, first out.
    #[default]
    Bfs,
    /// Last in, first out.
    Dfs,
    /// Uniformly random frontier entry, drawn from the seeded generator.
    Random,
}

/// Order in which rules are tried on one state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RuleSelection {
    /// Priority, then declaration order.
    #[default]
    InOrder,
    /// Shuffled per state with the seeded generator.
    Random,
}

/// Budgets and strategy switches for [`crate::ModelChecker`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ModelCheckingOptions {
    /// Stop once this many transitions have been recorded.
    pub max_transitions: usize,
    /// Stop once exploration has run this long.
    pub max_wall_clock: Option<Duration>,
    /// Frontier discipline.
    pub exploration_order: ExplorationOrder,
    /// Rule order per state.
    pub rule_selection: RuleSelection,
    /// Collapse repeated `(source, rule, target)` transitions into one edge.
    pub symmetry_reduction: bool,
    /// Record transitions into already known states.
    pub reaction_graph_with_cycles: bool,
    /// Compute successors of frontier batches on worker threads.
    pub parallel: bool,
    /// Worker count; `None` uses the available hardware parallelism.
    pub workers: Option<usize>,
    /// Seed for the random modes.
    pub seed: u64,
    /// Record elapsed wall-clock time in the statistics.
    pub measure_time: bool,
}

impl Default for ModelCheckingOptions {
    fn default() -> Self {
        Self {
            max_transitions: 1000,
            max_wall_clock: None,
            exploration_order: ExplorationOrder::Bfs,
            rule_selection: RuleSelection::InOrder,
            symmetry_reduction: true,
            reaction_graph_with_cycles: true,
            parallel: false,
            workers: None,
            seed: 0,
            measure_time: true,
        }
    }
}

impl ModelCheckingOptions {
    /// Sets the transition budget.
    pub fn with_max_transitions(mut self, max: usize) -> Self {
        self.max_transitions = max;
        self
    }

    /// Sets the wall-clock budget.
    pub fn with_max_wall_clock(mut self, budget: Duration) -> Self {
        self.max_wall_clock = Some(budget);
        self
    }

    /// Sets the frontier discipline.
    pub fn with_exploration_order(mut self, order: ExplorationOrder) -> Self {
        self.exploration_order = order;
        self
    }

    /// Sets the rule order.
    pub fn with_rule_selection(mut self, selection: RuleSelection) -> Self {
        self.rule_selection = selection;
        self
    }

    /// Enables or disables transition collapsing.
    pub fn with_symmetry_reduction(mut self, on: bool) -> Self {
        self.symmetry_reduction = on;
        self
    }

    /// Enables or disables transitions into known states.
    pub fn with_cycles(mut self, on: bool) -> Self {
        self.reaction_graph_with_cycles = on;
        self
    }

    /// Enables parallel expansion with `workers` threads (`None`: hardware default).
    pub fn with_parallelism(mut self, workers: Option<usize>) -> Self {
        self.parallel = true;
        self.workers = workers;
        self
    }

    /// Sets the seed of the random modes.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enables or disables elapsed-time measurement.
    pub fn with_measure_time(mut self, on: bool) -> Self {
        self.measure_time = on;
        self
    }

    /// Threads used for successor computation.
    pub fn effective_workers(&self) -> usize {
        if self.parallel {
            self.workers
                .unwrap_or_else(crate::parallel::default_workers)
                .max(1)
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_runs_use_one_worker() {
        let serial = ModelCheckingOptions::default().with_seed(3);
        assert_eq!(serial.effective_workers(), 1);
        let parallel = serial.with_parallelism(Some(6));
        assert_eq!(parallel.effective_workers(), 6);
        assert!(ModelCheckingOptions::default()
            .with_parallelism(None)
            .effective_workers()
            >= 1);
    }
}
