// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Labelled transition system built during exploration.
//!
//! States are unique per canonical key. Lookups go through the blake3 digest
//! of the key and are confirmed against the full key, so a digest collision
//! can never merge two distinct states.
use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::bigraph::Bigraph;
use crate::canonical::{CanonicalKey, Digest};

/// Index of a state in its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateId(usize);

impl StateId {
    /// Insertion position.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Lifecycle of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateStatus {
    /// Discovered, successors not yet computed.
    Frontier,
    /// Successors computed.
    Expanded,
}

/// A reachable agent.
#[derive(Debug, Clone)]
pub struct State {
    /// Canonical key of the agent.
    pub key: CanonicalKey,
    /// Representative agent (the first one discovered).
    pub agent: Bigraph,
    /// Lifecycle.
    pub status: StateStatus,
    /// Labels of predicates that held on the agent.
    pub predicates_held: Vec<String>,
}

/// A rule application between two states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// State the rule was applied to.
    pub source: StateId,
    /// Successor state.
    pub target: StateId,
    /// Rule label.
    pub rule: String,
    /// Number of matches folded into this transition.
    pub occurrences: usize,
}

/// States and transitions discovered so far.
#[derive(Debug, Clone, Default)]
pub struct ReactionGraph {
    states: Vec<State>,
    index: FxHashMap<Digest, Vec<StateId>>,
    transitions: Vec<Transition>,
    outgoing: Vec<Vec<usize>>,
    collapsed: FxHashMap<(StateId, String, StateId), usize>,
}

impl ReactionGraph {
    /// Empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `agent` under `key` unless the key is known.
    ///
    /// Returns the state id and whether the state is new.
    pub fn insert_state(&mut self, key: CanonicalKey, agent: Bigraph) -> (StateId, bool) {
        let digest = key.digest();
        if let Some(id) = self.lookup(&digest, &key) {
            return (id, false);
        }
        let id = StateId(self.states.len());
        self.states.push(State {
            key,
            agent,
            status: StateStatus::Frontier,
            predicates_held: Vec::new(),
        });
        self.outgoing.push(Vec::new());
        self.index.entry(digest).or_default().push(id);
        (id, true)
    }

    fn lookup(&self, digest: &Digest, key: &CanonicalKey) -> Option<StateId> {
        self.index
            .get(digest)?
            .iter()
            .copied()
            .find(|id| self.states[id.0].key == *key)
    }

    /// State with id `id`.
    pub fn state(&self, id: StateId) -> Option<&State> {
        self.states.get(id.0)
    }

    /// Id of the state with canonical key `key`.
    pub fn find(&self, key: &CanonicalKey) -> Option<StateId> {
        self.lookup(&key.digest(), key)
    }

    /// All states in discovery order.
    pub fn states(&self) -> impl Iterator<Item = (StateId, &State)> + '_ {
        self.states.iter().enumerate().map(|(i, s)| (StateId(i), s))
    }

    /// Records a transition. With `collapse`, a repeated
    /// `(source, rule, target)` only bumps the occurrence count of the
    /// existing edge. Returns `true` when a new edge was added.
    pub fn add_transition(&mut self, source: StateId, rule: &str, target: StateId, collapse: bool) -> bool {
        if collapse {
            if let Some(i) = self.collapsed.get(&(source, rule.to_owned(), target)) {
                self.transitions[*i].occurrences += 1;
                return false;
            }
            self.collapsed
                .insert((source, rule.to_owned(), target), self.transitions.len());
        }
        self.outgoing[source.0].push(self.transitions.len());
        self.transitions.push(Transition {
            source,
            target,
            rule: rule.to_owned(),
            occurrences: 1,
        });
        true
    }

    /// All transitions in insertion order.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Transitions leaving `id`.
    pub fn outgoing(&self, id: StateId) -> impl Iterator<Item = &Transition> + '_ {
        self.outgoing
            .get(id.0)
            .into_iter()
            .flatten()
            .map(|i| &self.transitions[*i])
    }

    /// Number of states.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Number of transitions.
    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    /// Shortest transition path from `from` to `to`; empty when they coincide.
    pub fn shortest_path(&self, from: StateId, to: StateId) -> Option<Vec<&Transition>> {
        if from.0 >= self.states.len() || to.0 >= self.states.len() {
            return None;
        }
        let mut via: Vec<Option<usize>> = vec![None; self.states.len()];
        let mut seen = vec![false; self.states.len()];
        let mut queue = VecDeque::from([from]);
        seen[from.0] = true;
        while let Some(s) = queue.pop_front() {
            if s == to {
                break;
            }
            for t in &self.outgoing[s.0] {
                let target = self.transitions[*t].target;
                if !seen[target.0] {
                    seen[target.0] = true;
                    via[target.0] = Some(*t);
                    queue.push_back(target);
                }
            }
        }
        if !seen[to.0] {
            return None;
        }
        let mut path = Vec::new();
        let mut at = to;
        while let Some(t) = via[at.0] {
            path.push(&self.transitions[t]);
            at = self.transitions[t].source;
        }
        path.reverse();
        Some(path)
    }

    pub(crate) fn mark_expanded(&mut self, id: StateId) {
        if let Some(s) = self.states.get_mut(id.0) {
            s.status = StateStatus::Expanded;
        }
    }

    pub(crate) fn record_predicate(&mut self, id: StateId, label: &str) {
        if let Some(s) = self.states.get_mut(id.0) {
            s.predicates_held.push(label.to_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{canonical_key, BigraphBuilder, Signature};

    fn chain(len: usize) -> Bigraph {
        let sig = Signature::builder().active("A", 0).build().unwrap();
        let mut b = BigraphBuilder::new(sig);
        let mut at = b.root();
        for _ in 0..len {
            at = crate::Parent::Node(b.node(at, "A").unwrap());
        }
        b.build().unwrap()
    }

    #[test]
    fn states_are_deduplicated_by_key() {
        let mut g = ReactionGraph::new();
        let (a, new_a) = g.insert_state(canonical_key(&chain(1)), chain(1));
        let (b, new_b) = g.insert_state(canonical_key(&chain(1)), chain(1));
        assert!(new_a && !new_b);
        assert_eq!(a, b);
        assert_eq!(g.state_count(), 1);
        assert_eq!(g.find(&canonical_key(&chain(1))), Some(a));
        assert_eq!(g.find(&canonical_key(&chain(2))), None);
    }

    #[test]
    fn collapse_and_shortest_path() {
        let mut g = ReactionGraph::new();
        let ids: Vec<StateId> = (0..4)
            .map(|i| g.insert_state(canonical_key(&chain(i)), chain(i)).0)
            .collect();
        assert!(g.add_transition(ids[0], "grow", ids[1], true));
        assert!(!g.add_transition(ids[0], "grow", ids[1], true));
        assert!(g.add_transition(ids[1], "grow", ids[2], true));
        assert!(g.add_transition(ids[0], "jump", ids[2], false));
        assert!(g.add_transition(ids[2], "grow", ids[3], false));
        assert_eq!(g.transitions()[0].occurrences, 2);
        assert_eq!(g.outgoing(ids[0]).count(), 2);

        let path = g.shortest_path(ids[0], ids[3]).unwrap();
        let rules: Vec<&str> = path.iter().map(|t| t.rule.as_str()).collect();
        assert_eq!(rules, vec!["jump", "grow"]);
        assert_eq!(g.shortest_path(ids[3], ids[0]), None);
        assert_eq!(g.shortest_path(ids[2], ids[2]).unwrap().len(), 0);
    }
}
