// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs, clippy::unwrap_used, clippy::expect_used)]

mod common;

use bigraph_core::{
    algebra, is_isomorphic, Bigraph, BigraphBuilder, Link, MatchError, Matcher, Parent, Place,
    Point,
};
use common::{flat, init_tracing, signature, with_sites};

/// Two rooms: one with a person on `net` and a computer sharing the room's
/// edge, one with a person sharing the room's edge.
fn office() -> Bigraph {
    let mut b = BigraphBuilder::new(signature());
    let r = b.root();
    let net = b.outer_name("net").unwrap();

    let room = b.node(r, "Room").unwrap();
    let e0 = b.edge();
    b.link(room, 0, e0).unwrap();
    let person = b.node(Parent::Node(room), "Person").unwrap();
    b.link(person, 0, net).unwrap();
    let computer = b.node(Parent::Node(room), "Computer").unwrap();
    b.link(computer, 0, e0).unwrap();
    b.node(Parent::Node(computer), "Token").unwrap();

    let room2 = b.node(r, "Room").unwrap();
    let e1 = b.edge();
    b.link(room2, 0, e1).unwrap();
    let person2 = b.node(Parent::Node(room2), "Person").unwrap();
    b.link(person2, 0, e1).unwrap();
    b.build().unwrap()
}

/// `Room{y}.(Person{x} | $0)`.
fn room_with_person() -> Bigraph {
    let mut b = BigraphBuilder::new(signature());
    let r = b.root();
    let x = b.outer_name("x").unwrap();
    let y = b.outer_name("y").unwrap();
    let room = b.node(r, "Room").unwrap();
    b.link(room, 0, y).unwrap();
    let person = b.node(Parent::Node(room), "Person").unwrap();
    b.link(person, 0, x).unwrap();
    b.site(Parent::Node(room)).unwrap();
    b.build().unwrap()
}

#[test]
fn every_match_recomposes_to_the_agent() {
    init_tracing();
    let agent = office();
    let redex = room_with_person();
    let matcher = Matcher::new(&agent, &redex).unwrap();
    let found: Vec<_> = matcher.matches().collect();
    assert_eq!(found.len(), 2);

    for m in &found {
        let rebuilt = algebra::lean(&m.recompose(&redex).unwrap());
        assert!(is_isomorphic(&rebuilt, &agent));
        assert_eq!(m.parameters().len(), 1);
        assert_eq!(m.context().site_count(), 1);
    }
    assert_eq!(found[0].parameters()[0].node_count(), 2, "computer and token");
    assert_eq!(found[0].shared_names(), ["z0".to_owned()]);
    assert_eq!(found[1].parameters()[0].node_count(), 0);
}

#[test]
fn match_order_is_stable_and_worker_independent() {
    let agent = office();
    let redex = room_with_person();
    let matcher = Matcher::new(&agent, &redex).unwrap();
    let first: Vec<Vec<_>> = matcher.matches().map(|m| m.image().to_vec()).collect();
    let again: Vec<Vec<_>> = matcher.matches().map(|m| m.image().to_vec()).collect();
    assert_eq!(first, again);
    for workers in [1, 2, 8] {
        let parallel: Vec<Vec<_>> = matcher
            .collect_matches(workers)
            .iter()
            .map(|m| m.image().to_vec())
            .collect();
        assert_eq!(parallel, first);
    }
}

#[test]
fn single_room_on_an_open_name() {
    let mut a = BigraphBuilder::new(signature());
    let r = a.root();
    let o = a.outer_name("o").unwrap();
    let room = a.node(r, "Room").unwrap();
    a.link(room, 0, o).unwrap();
    let agent = a.build().unwrap();

    let mut p = BigraphBuilder::new(signature());
    let r = p.root();
    let x = p.outer_name("x").unwrap();
    let room = p.node(r, "Room").unwrap();
    p.link(room, 0, x).unwrap();
    let redex = p.build().unwrap();

    let found: Vec<_> = Matcher::new(&agent, &redex).unwrap().matches().collect();
    assert_eq!(found.len(), 1);
    let ctx = found[0].context();
    assert_eq!(ctx.root_count(), 1);
    assert_eq!(ctx.node_count(), 0);
    assert_eq!(ctx.site_count(), 1);
    assert_eq!(ctx.parent_of(Place::Site(0)), Parent::Root(0));
    assert_eq!(ctx.outer_names(), ["o".to_owned()]);
    assert_eq!(ctx.inner_name(0), "x");
    assert_eq!(ctx.link_of_point(Point::Inner(0)), Link::Outer(0));
    assert!(found[0].parameters().is_empty());
}

#[test]
fn passive_controls_block_matching_below_them() {
    let mut b = BigraphBuilder::new(signature());
    let r = b.root();
    let boxed = b.node(r, "Box").unwrap();
    b.node(Parent::Node(boxed), "A").unwrap();
    b.node(r, "A").unwrap();
    let agent = b.build().unwrap();

    let found: Vec<_> = Matcher::new(&agent, &flat(&["A"])).unwrap().matches().collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].anchors(), [Parent::Root(0)]);
}

#[test]
fn edges_must_not_leak_into_the_context() {
    // Agent: two rooms on one edge. Redex: a single room on a private edge.
    let mut a = BigraphBuilder::new(signature());
    let r = a.root();
    let e = a.edge();
    for _ in 0..2 {
        let room = a.node(r, "Room").unwrap();
        a.link(room, 0, e).unwrap();
    }
    let agent = a.build().unwrap();

    let mut p = BigraphBuilder::new(signature());
    let r = p.root();
    let e = p.edge();
    let room = p.node(r, "Room").unwrap();
    p.link(room, 0, e).unwrap();
    let closed = p.build().unwrap();
    assert!(!Matcher::new(&agent, &closed).unwrap().has_match());

    let mut q = BigraphBuilder::new(signature());
    let r = q.root();
    let e = q.edge();
    for _ in 0..2 {
        let room = q.node(r, "Room").unwrap();
        q.link(room, 0, e).unwrap();
    }
    let both = q.build().unwrap();
    let found: Vec<_> = Matcher::new(&agent, &both).unwrap().matches().collect();
    assert_eq!(found.len(), 1, "the two symmetric embeddings share one decomposition");
    let redex_edge = both.edges().next().unwrap();
    let agent_edge = agent.edges().next().unwrap();
    assert_eq!(
        found[0].redex_link_image(Link::Edge(redex_edge)),
        Some(Link::Edge(agent_edge))
    );
}

#[test]
fn invalid_inputs_are_reported() {
    let agent = flat(&["A"]);
    assert_eq!(
        Matcher::new(&with_sites("A", 1), &agent).unwrap_err(),
        MatchError::AgentNotGround
    );

    let mut unguarded = BigraphBuilder::new(signature());
    let r = unguarded.root();
    unguarded.site(r).unwrap();
    assert_eq!(
        Matcher::new(&agent, &unguarded.build().unwrap()).unwrap_err(),
        MatchError::Unguarded(0)
    );

    let mut empty = BigraphBuilder::new(signature());
    empty.root();
    assert_eq!(
        Matcher::new(&agent, &empty.build().unwrap()).unwrap_err(),
        MatchError::EmptyRoot(0)
    );
}

#[test]
fn two_root_redex_needs_disjoint_occurrences() {
    let agent = flat(&["A", "B"]);
    let mut p = BigraphBuilder::new(signature());
    let r0 = p.root();
    let r1 = p.root();
    p.node(r0, "A").unwrap();
    p.node(r1, "B").unwrap();
    let redex = p.build().unwrap();

    let found: Vec<_> = Matcher::new(&agent, &redex).unwrap().matches().collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].anchors(), [Parent::Root(0), Parent::Root(0)]);
    assert_eq!(found[0].context().site_count(), 2);
    let rebuilt = found[0].recompose(&redex).unwrap();
    assert!(is_isomorphic(&rebuilt, &agent));

    let mut q = BigraphBuilder::new(signature());
    let r0 = q.root();
    let r1 = q.root();
    q.node(r0, "A").unwrap();
    q.node(r1, "A").unwrap();
    assert!(!Matcher::new(&agent, &q.build().unwrap()).unwrap().has_match());
}
