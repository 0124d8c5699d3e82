// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs, clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::collections::HashMap;

use proptest::prelude::*;
use proptest::test_runner::{Config as PropConfig, RngAlgorithm, TestRng, TestRunner};

use bigraph_core::{
    canonical_key, connected_components, Bigraph, BigraphBuilder, Link, NodeId, Parent, Prng,
    UnionFind,
};
use common::signature;

const SEED_BYTES: [u8; 32] = [
    0x42, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0,
];

const CONTROLS: [&str; 3] = ["A", "B", "L"];

/// `(parent choice, control choice, link choice)` per node.
type NodeShape = (u8, u8, u8);

/// Root index (`Ok`) or earlier node index (`Err`) holding node `i`.
fn parent_of(shape: &[NodeShape], roots: usize, i: usize) -> Result<usize, usize> {
    let choice = usize::from(shape[i].0) % (roots + i);
    if choice < roots {
        Ok(choice)
    } else {
        Err(choice - roots)
    }
}

fn depth(shape: &[NodeShape], roots: usize, i: usize) -> usize {
    match parent_of(shape, roots, i) {
        Ok(_) => 0,
        Err(p) => 1 + depth(shape, roots, p),
    }
}

/// Builds the forest described by `shape`, inserting nodes in `order`
/// (parents always before children).
fn build(shape: &[NodeShape], roots: usize, order: &[usize]) -> Bigraph {
    let mut b = BigraphBuilder::new(signature());
    for _ in 0..roots {
        b.root();
    }
    // The last of several roots also holds a site, so decompositions see
    // root-level places.
    if roots > 1 {
        b.site(Parent::Root(roots - 1)).unwrap();
    }
    let mut ids: HashMap<usize, NodeId> = HashMap::new();
    let mut edges: HashMap<u8, Link> = HashMap::new();
    for &i in order {
        let parent = match parent_of(shape, roots, i) {
            Ok(r) => Parent::Root(r),
            Err(p) => Parent::Node(ids[&p]),
        };
        let control = CONTROLS[usize::from(shape[i].1) % CONTROLS.len()];
        let node = b.node(parent, control).unwrap();
        ids.insert(i, node);
        if control == "L" {
            let which = shape[i].2 % 4;
            let link = if which < 2 {
                *edges.entry(which).or_insert_with(|| b.edge())
            } else {
                b.outer_name_or_existing(&format!("x{}", which - 2))
            };
            b.link(node, 0, link).unwrap();
        }
    }
    b.build().unwrap()
}

fn shuffled_topological(shape: &[NodeShape], roots: usize, seed: u64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..shape.len()).collect();
    Prng::from_seed(seed).shuffle(&mut order);
    order.sort_by_key(|i| depth(shape, roots, *i));
    order
}

fn strategy() -> impl Strategy<Value = (usize, Vec<NodeShape>, u64)> {
    (
        1usize..3,
        prop::collection::vec((any::<u8>(), any::<u8>(), any::<u8>()), 1..9),
        any::<u64>(),
    )
}

#[test]
fn canonical_key_ignores_arena_order() {
    let rng = TestRng::from_seed(RngAlgorithm::ChaCha, &SEED_BYTES);
    let mut runner = TestRunner::new_with_rng(PropConfig::default(), rng);

    runner
        .run(&strategy(), |(roots, shape, seed)| {
            let natural: Vec<usize> = (0..shape.len()).collect();
            let a = build(&shape, roots, &natural);
            let b = build(&shape, roots, &shuffled_topological(&shape, roots, seed));
            prop_assert_eq!(canonical_key(&a), canonical_key(&b));
            prop_assert_eq!(canonical_key(&a), canonical_key(&a));
            Ok(())
        })
        .expect("proptest with pinned seed should complete");
}

#[test]
fn changing_a_control_changes_the_key() {
    let rng = TestRng::from_seed(RngAlgorithm::ChaCha, &SEED_BYTES);
    let mut runner = TestRunner::new_with_rng(PropConfig::default(), rng);

    runner
        .run(&strategy(), |(roots, shape, _)| {
            let natural: Vec<usize> = (0..shape.len()).collect();
            let before = build(&shape, roots, &natural);
            let mut changed = shape.clone();
            // Swap A and B on the first node unless it carries a port.
            let control = usize::from(changed[0].1) % CONTROLS.len();
            prop_assume!(control != 2);
            changed[0].1 = if control == 0 { 1 } else { 0 };
            let after = build(&changed, roots, &natural);
            prop_assert_ne!(canonical_key(&before), canonical_key(&after));
            Ok(())
        })
        .expect("proptest with pinned seed should complete");
}

#[test]
fn components_partition_the_nodes() {
    let rng = TestRng::from_seed(RngAlgorithm::ChaCha, &SEED_BYTES);
    let mut runner = TestRunner::new_with_rng(PropConfig::default(), rng);

    runner
        .run(&strategy(), |(roots, shape, _)| {
            let natural: Vec<usize> = (0..shape.len()).collect();
            let g = build(&shape, roots, &natural);
            let parts = connected_components(&g);
            let nodes: usize = parts.iter().map(Bigraph::node_count).sum();
            prop_assert_eq!(nodes, g.node_count());
            let edges: usize = parts.iter().map(Bigraph::edge_count).sum();
            prop_assert_eq!(edges, g.edge_count());
            let sites: usize = parts.iter().map(Bigraph::site_count).sum();
            prop_assert_eq!(sites, g.site_count());
            let mut names: Vec<String> =
                parts.iter().flat_map(|p| p.outer_names().to_vec()).collect();
            names.sort();
            let mut expected = g.outer_names().to_vec();
            expected.sort();
            prop_assert_eq!(names, expected);
            Ok(())
        })
        .expect("proptest with pinned seed should complete");
}

#[test]
fn union_find_matches_naive_relabelling() {
    let rng = TestRng::from_seed(RngAlgorithm::ChaCha, &SEED_BYTES);
    let mut runner = TestRunner::new_with_rng(PropConfig::default(), rng);
    let pairs = prop::collection::vec((0usize..16, 0usize..16), 0..24);

    runner
        .run(&pairs, |pairs| {
            let mut uf = UnionFind::new(16);
            let mut label: Vec<usize> = (0..16).collect();
            for (a, b) in pairs {
                uf.union(a, b);
                let (from, to) = (label[a], label[b]);
                for l in &mut label {
                    if *l == from {
                        *l = to;
                    }
                }
            }
            for a in 0..16 {
                for b in 0..16 {
                    prop_assert_eq!(uf.find(a) == uf.find(b), label[a] == label[b]);
                }
            }
            let distinct: std::collections::BTreeSet<usize> = label.into_iter().collect();
            prop_assert_eq!(uf.count(), distinct.len());
            Ok(())
        })
        .expect("proptest with pinned seed should complete");
}
