// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Link-graph connectedness.
//!
//! Points (ports and inner names) are merged in a disjoint-set forest
//! whenever they share a link; the ports of one node always fall into the
//! same partition. Each partition becomes one component bigraph holding its
//! nodes, the links they touch and the sites below them.
use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::bigraph::{Bigraph, EdgeId, Link, NodeData, NodeId, Parent, Place, Point, RawBigraph};

/// Disjoint-set forest with path halving and union by size.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
    count: usize,
}

impl UnionFind {
    /// `n` singleton sets.
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
            count: n,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// `true` when there are no elements.
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Representative of `x`'s set.
    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merges the sets of `a` and `b`; returns `false` if they were already one.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        let (big, small) = if self.size[ra] >= self.size[rb] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[small] = big;
        self.size[big] += self.size[small];
        self.count -= 1;
        true
    }

    /// Merges every element of `items` into one set.
    pub fn union_all(&mut self, items: &[usize]) {
        if let Some((first, rest)) = items.split_first() {
            for x in rest {
                self.union(*first, *x);
            }
        }
    }

    /// Number of disjoint sets.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Sets as sorted member lists, ordered by their smallest member.
    pub fn partitions(&mut self) -> Vec<Vec<usize>> {
        let mut by_root: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        let mut order = Vec::new();
        for x in 0..self.parent.len() {
            let r = self.find(x);
            let members = by_root.entry(r).or_default();
            if members.is_empty() {
                order.push(r);
            }
            members.push(x);
        }
        order
            .into_iter()
            .filter_map(|r| by_root.remove(&r))
            .collect()
    }
}

/// One link-connected group of nodes and inner names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPartition {
    /// Nodes in arena order.
    pub nodes: Vec<NodeId>,
    /// Inner-name positions.
    pub inner_names: Vec<usize>,
}

impl LinkPartition {
    /// Partitions the nodes and inner names of `bigraph` by shared links.
    pub fn of(bigraph: &Bigraph) -> Vec<Self> {
        let n = bigraph.node_count();
        let element = |p: &Point| match p {
            Point::Port(v, _) => v.index(),
            Point::Inner(i) => n + i,
        };
        let total = n + bigraph.inner_face().names.len();
        let mut uf = UnionFind::new(total);
        let links = bigraph
            .edges()
            .map(Link::Edge)
            .chain((0..bigraph.outer_names().len()).map(Link::Outer));
        for link in links {
            let members: Vec<usize> = bigraph.points_of(link).iter().map(element).collect();
            uf.union_all(&members);
        }
        uf.partitions()
            .into_iter()
            .map(|members| {
                let (nodes, inner): (Vec<usize>, Vec<usize>) =
                    members.into_iter().partition(|m| *m < n);
                Self {
                    nodes: nodes.into_iter().map(NodeId).collect(),
                    inner_names: inner.into_iter().map(|i| i - n).collect(),
                }
            })
            .collect()
    }
}

/// `true` when every node and inner name shares one link-connected partition.
pub fn is_link_connected(bigraph: &Bigraph) -> bool {
    LinkPartition::of(bigraph).len() <= 1
}

/// Splits `bigraph` into maximal sub-bigraphs with disjoint link graphs.
///
/// Nodes whose parent lies outside their partition hang below a fresh root,
/// one root per distinct outside parent in order of first appearance. Sites
/// whose parent node belongs to the partition are kept and renumbered in
/// their original order; links keep their kind (edge or named outer link).
///
/// Places no partition owns end up in one trailing place-only component:
/// a root for every original root that holds sites directly or holds
/// nothing at all, those root-level sites, and the idle edges and idle
/// outer names. Every site, edge and outer name of `bigraph` therefore
/// appears in exactly one component.
pub fn connected_components(bigraph: &Bigraph) -> Vec<Bigraph> {
    let mut parts: Vec<Bigraph> = LinkPartition::of(bigraph)
        .into_iter()
        .map(|part| extract(bigraph, &part))
        .collect();
    parts.extend(residual(bigraph));
    parts
}

fn residual(bigraph: &Bigraph) -> Option<Bigraph> {
    let mut roots: Vec<usize> = Vec::new();
    let mut site_parents = Vec::new();
    for r in 0..bigraph.root_count() {
        let children = bigraph.children(Parent::Root(r));
        if children.is_empty() {
            roots.push(r);
        }
        for s in bigraph.child_sites(Parent::Root(r)) {
            if roots.last() != Some(&r) {
                roots.push(r);
            }
            site_parents.push((s, Parent::Root(roots.len() - 1)));
        }
    }
    site_parents.sort_unstable_by_key(|(s, _)| *s);

    let edges = bigraph.idle_edges().count();
    let outer_names: Vec<String> = (0..bigraph.outer_names().len())
        .filter(|o| bigraph.points_of(Link::Outer(*o)).is_empty())
        .map(|o| bigraph.outer_names()[o].clone())
        .collect();
    if roots.is_empty() && edges == 0 && outer_names.is_empty() {
        return None;
    }
    Some(Bigraph::assemble(RawBigraph {
        signature: Arc::clone(bigraph.signature()),
        roots: roots.len(),
        nodes: Vec::new(),
        site_parents: site_parents.into_iter().map(|(_, p)| p).collect(),
        edges,
        outer_names,
        inner_names: Vec::new(),
    }))
}

fn extract(bigraph: &Bigraph, part: &LinkPartition) -> Bigraph {
    let local: FxHashMap<NodeId, usize> = part
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (*n, i))
        .collect();

    let mut roots: Vec<Parent> = Vec::new();
    let mut root_of = |outside: Parent| match roots.iter().position(|p| *p == outside) {
        Some(i) => i,
        None => {
            roots.push(outside);
            roots.len() - 1
        }
    };

    let mut edges: BTreeMap<EdgeId, usize> = BTreeMap::new();
    let mut outer: BTreeMap<usize, usize> = BTreeMap::new();
    let mut outer_names: Vec<String> = Vec::new();
    let mut map_link = |link: Link| match link {
        Link::Edge(e) => {
            let next = edges.len();
            Link::Edge(EdgeId(*edges.entry(e).or_insert(next)))
        }
        Link::Outer(o) => {
            let next = outer.len();
            let i = *outer.entry(o).or_insert_with(|| {
                outer_names.push(bigraph.outer_names()[o].clone());
                next
            });
            Link::Outer(i)
        }
    };

    let mut nodes = Vec::with_capacity(part.nodes.len());
    for node in &part.nodes {
        let parent = match bigraph.parent_of(Place::Node(*node)) {
            Parent::Node(p) if local.contains_key(&p) => Parent::Node(NodeId(local[&p])),
            outside => Parent::Root(root_of(outside)),
        };
        nodes.push(NodeData {
            control: bigraph.control_id_of(*node),
            parent,
            ports: bigraph.ports_of(*node).iter().map(|l| map_link(*l)).collect(),
        });
    }

    let site_parents = (0..bigraph.site_count())
        .filter_map(|s| match bigraph.parent_of(Place::Site(s)) {
            Parent::Node(p) => local.get(&p).map(|i| Parent::Node(NodeId(*i))),
            Parent::Root(_) => None,
        })
        .collect();

    let inner_names = part
        .inner_names
        .iter()
        .map(|i| {
            let (name, link) = &bigraph.raw().inner_names[*i];
            (name.clone(), map_link(*link))
        })
        .collect();

    let edge_count = edges.len();
    Bigraph::assemble(RawBigraph {
        signature: Arc::clone(bigraph.signature()),
        roots: roots.len(),
        nodes,
        site_parents,
        edges: edge_count,
        outer_names,
        inner_names,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{BigraphBuilder, Signature};

    #[test]
    fn root_level_places_and_idle_names_survive_decomposition() {
        let sig = Signature::builder()
            .active("A", 0)
            .active("L", 1)
            .build()
            .unwrap();
        let mut b = BigraphBuilder::new(sig);
        let r0 = b.root();
        b.root();
        let r2 = b.root();
        b.node(r0, "A").unwrap();
        b.site(r0).unwrap();
        let l = b.node(r2, "L").unwrap();
        let x = b.outer_name("x").unwrap();
        b.link(l, 0, x).unwrap();
        b.site(Parent::Node(l)).unwrap();
        b.outer_name("idle").unwrap();
        let g = b.build().unwrap();

        let parts = connected_components(&g);
        assert_eq!(parts.len(), 3);
        let sites: usize = parts.iter().map(Bigraph::site_count).sum();
        assert_eq!(sites, g.site_count());
        let nodes: usize = parts.iter().map(Bigraph::node_count).sum();
        assert_eq!(nodes, g.node_count());
        let mut names: Vec<String> = parts.iter().flat_map(|p| p.outer_names().to_vec()).collect();
        names.sort();
        assert_eq!(names, vec!["idle".to_owned(), "x".to_owned()]);

        let rest = parts.last().unwrap();
        assert_eq!(rest.node_count(), 0);
        assert_eq!(rest.root_count(), 2, "root 0 holds a site, root 1 is empty");
        assert_eq!(rest.site_count(), 1);
        assert_eq!(rest.outer_names(), ["idle".to_owned()]);
    }

    #[test]
    fn connected_input_has_no_residue() {
        let sig = Signature::builder().active("A", 0).build().unwrap();
        let mut b = BigraphBuilder::new(sig);
        let r = b.root();
        b.node(r, "A").unwrap();
        assert_eq!(connected_components(&b.build().unwrap()).len(), 1);
    }

    #[test]
    fn union_find_counts_sets() {
        let mut uf = UnionFind::new(5);
        assert!(uf.union(0, 1));
        assert!(uf.union(3, 4));
        assert!(!uf.union(1, 0));
        assert_eq!(uf.count(), 3);
        assert_eq!(uf.partitions(), vec![vec![0, 1], vec![2], vec![3, 4]]);
        uf.union_all(&[0, 2, 4]);
        assert_eq!(uf.count(), 1);
        assert_eq!(uf.find(3), uf.find(0));
    }
}
