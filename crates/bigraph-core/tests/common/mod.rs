// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use bigraph_core::{Bigraph, BigraphBuilder, Parent, ReactionRule, Signature};

/// Installs a test-writer subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Signature shared by the integration tests.
pub fn signature() -> Arc<Signature> {
    Signature::builder()
        .active("Room", 1)
        .atomic("Person", 1)
        .active("Computer", 1)
        .atomic("Token", 0)
        .active("A", 0)
        .active("B", 0)
        .atomic("Y", 0)
        .atomic("Z", 0)
        .passive("Box", 0)
        .active("L", 1)
        .build()
        .expect("fixture signature")
}

/// One root holding `controls` as empty siblings.
pub fn flat(controls: &[&str]) -> Bigraph {
    let mut b = BigraphBuilder::new(signature());
    let r = b.root();
    for c in controls {
        b.node(r, c).unwrap();
    }
    b.build().unwrap()
}

/// One root holding a single `control` node with `sites` sites below it.
pub fn with_sites(control: &str, sites: usize) -> Bigraph {
    let mut b = BigraphBuilder::new(signature());
    let r = b.root();
    let n = b.node(r, control).unwrap();
    for _ in 0..sites {
        b.site(Parent::Node(n)).unwrap();
    }
    b.build().unwrap()
}

/// `A.$0 -> B.$0`, labelled `a-to-b`.
pub fn a_to_b() -> ReactionRule {
    ReactionRule::builder(with_sites("A", 1), with_sites("B", 1))
        .label("a-to-b")
        .build()
        .unwrap()
}

/// `A.$0 -> A.(A | $0)`: every application adds a node.
pub fn grow() -> ReactionRule {
    let mut b = BigraphBuilder::new(signature());
    let r = b.root();
    let a = b.node(r, "A").unwrap();
    b.node(Parent::Node(a), "A").unwrap();
    b.site(Parent::Node(a)).unwrap();
    ReactionRule::builder(with_sites("A", 1), b.build().unwrap())
        .label("grow")
        .build()
        .unwrap()
}
