// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Canonical keys for bigraphs.
//!
//! The key is a readable term: an interface header, one `{...}` block per
//! root holding nested `Control[ports](children)` terms, the inner names and
//! a count of idle edges. Outer and inner names keep their labels; edges are
//! numbered by first appearance. Sibling order comes from a canonical node
//! ranking computed by colour refinement and individualisation: among all
//! rankings the search may reach, the lexicographically smallest term wins,
//! which makes the key equal for two bigraphs exactly when they are
//! isomorphic.
//!
//! Branches that are images of already explored branches under a known
//! automorphism are skipped. Automorphisms are discovered whenever two leaves
//! of the search produce the same term.
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write as _};

use crate::bigraph::{Bigraph, Link, NodeId, Parent, Place, Point};
use crate::connectivity::UnionFind;

/// 32-byte blake3 digest.
pub type Digest = [u8; 32];

/// Isomorphism-invariant key of a bigraph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// The key as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// blake3 digest of the key, used as a fast pre-filter before comparing keys.
    pub fn digest(&self) -> Digest {
        blake3::hash(self.0.as_bytes()).into()
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes the canonical key of `bigraph`.
pub fn canonical_key(bigraph: &Bigraph) -> CanonicalKey {
    let shape = Shape::of(bigraph);
    let mut search = Search {
        shape: &shape,
        first: None,
        best: None,
        automorphisms: Vec::new(),
    };
    let initial = shape.initial_colours();
    search.explore(initial, &mut Vec::new());
    CanonicalKey(search.best.map(|leaf| leaf.code).unwrap_or_default())
}

/// `true` when both bigraphs share a signature and have equal canonical keys.
pub fn is_isomorphic(a: &Bigraph, b: &Bigraph) -> bool {
    a.signature().is_compatible(b.signature())
        && StructuralSummary::of(a) == StructuralSummary::of(b)
        && canonical_key(a) == canonical_key(b)
}

/// Cheap isomorphism-invariant counts. Different summaries imply
/// non-isomorphic bigraphs; equal summaries prove nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralSummary {
    /// Number of roots.
    pub roots: usize,
    /// Number of sites.
    pub sites: usize,
    /// Number of nodes.
    pub nodes: usize,
    /// Number of edges.
    pub edges: usize,
    /// Outer names.
    pub outer_names: BTreeSet<String>,
    /// Inner names.
    pub inner_names: BTreeSet<String>,
    /// Node count per control name.
    pub controls: BTreeMap<String, usize>,
}

impl StructuralSummary {
    /// Collects the summary of `bigraph`.
    pub fn of(bigraph: &Bigraph) -> Self {
        let mut controls = BTreeMap::new();
        for n in bigraph.nodes() {
            *controls
                .entry(bigraph.control_of(n).name().to_owned())
                .or_insert(0) += 1;
        }
        Self {
            roots: bigraph.root_count(),
            sites: bigraph.site_count(),
            nodes: bigraph.node_count(),
            edges: bigraph.edge_count(),
            outer_names: bigraph.outer_face().names,
            inner_names: bigraph.inner_face().names,
            controls,
        }
    }
}

/// Index-free view of a bigraph used by refinement and encoding.
struct Shape<'a> {
    bigraph: &'a Bigraph,
    parent: Vec<Parent>,
    children: Vec<Vec<usize>>,
    edge_ports: Vec<Vec<(usize, usize)>>,
}

impl<'a> Shape<'a> {
    fn of(bigraph: &'a Bigraph) -> Self {
        let n = bigraph.node_count();
        let parent = bigraph
            .nodes()
            .map(|v| bigraph.parent_of(Place::Node(v)))
            .collect();
        let children = (0..n)
            .map(|v| {
                bigraph
                    .child_nodes(Parent::Node(NodeId(v)))
                    .map(NodeId::index)
                    .collect()
            })
            .collect();
        let edge_ports = bigraph
            .edges()
            .map(|e| {
                bigraph
                    .points_of(Link::Edge(e))
                    .iter()
                    .filter_map(|p| match p {
                        Point::Port(v, i) => Some((v.index(), *i)),
                        Point::Inner(_) => None,
                    })
                    .collect()
            })
            .collect();
        Self {
            bigraph,
            parent,
            children,
            edge_ports,
        }
    }

    fn len(&self) -> usize {
        self.parent.len()
    }

    fn inner_names_on(&self, link: Link) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .bigraph
            .points_of(link)
            .iter()
            .filter_map(|p| match p {
                Point::Inner(i) => Some(self.bigraph.inner_name(*i)),
                Point::Port(..) => None,
            })
            .collect();
        names.sort_unstable();
        names
    }

    /// Colours from everything that is fixed under isomorphism: control, root
    /// index, site children, outer names and inner names on each port's link.
    fn initial_colours(&self) -> Vec<u32> {
        let b = self.bigraph;
        let descriptors: Vec<String> = b
            .nodes()
            .map(|v| {
                let mut d = String::new();
                d.push_str(b.control_of(v).name());
                match self.parent[v.index()] {
                    Parent::Root(r) => {
                        let _ = write!(d, "|r{r}");
                    }
                    Parent::Node(_) => d.push_str("|n"),
                }
                let mut sites: Vec<usize> = b.child_sites(Parent::Node(v)).collect();
                sites.sort_unstable();
                let _ = write!(d, "|{sites:?}|");
                for link in b.ports_of(v) {
                    match link {
                        Link::Outer(o) => {
                            let _ = write!(d, "o{:?};", b.outer_names()[*o]);
                        }
                        Link::Edge(_) => {
                            let _ = write!(d, "e{:?};", self.inner_names_on(*link));
                        }
                    }
                }
                d
            })
            .collect();
        rank(&descriptors)
    }

    /// Refines colours until the number of classes stops growing.
    fn refine(&self, mut colours: Vec<u32>) -> Vec<u32> {
        let mut classes = count_classes(&colours);
        loop {
            let signatures: Vec<Vec<u64>> = (0..self.len())
                .map(|v| self.signature(v, &colours))
                .collect();
            let next = rank(&signatures);
            let next_classes = count_classes(&next);
            colours = next;
            if next_classes == classes {
                return colours;
            }
            classes = next_classes;
        }
    }

    fn signature(&self, v: usize, colours: &[u32]) -> Vec<u64> {
        let mut sig = vec![u64::from(colours[v])];
        match self.parent[v] {
            Parent::Root(r) => sig.extend([0, r as u64]),
            Parent::Node(p) => sig.extend([1, u64::from(colours[p.index()])]),
        }
        let mut kids: Vec<u64> = self.children[v]
            .iter()
            .map(|c| u64::from(colours[*c]))
            .collect();
        kids.sort_unstable();
        sig.push(kids.len() as u64);
        sig.extend(kids);
        for link in self.bigraph.ports_of(NodeId(v)) {
            if let Link::Edge(e) = link {
                let mut points: Vec<(u64, u64)> = self.edge_ports[e.index()]
                    .iter()
                    .map(|(w, i)| (u64::from(colours[*w]), *i as u64))
                    .collect();
                points.sort_unstable();
                sig.push(points.len() as u64);
                for (c, i) in points {
                    sig.extend([c, i]);
                }
            }
        }
        sig
    }

    /// Writes the term for a discrete colouring (colour = rank).
    fn encode(&self, rank: &[u32]) -> String {
        let b = self.bigraph;
        let mut out = String::new();
        let mut edge_numbers: Vec<Option<usize>> = vec![None; b.edge_count()];
        let mut next_edge = 0usize;

        let mut outer: Vec<&String> = b.outer_names().iter().collect();
        outer.sort_unstable();
        let _ = write!(out, "{}:{}:{outer:?}", b.root_count(), b.site_count());

        let mut link_label = |link: Link, out: &mut String| match link {
            Link::Edge(e) => {
                let number = *edge_numbers[e.index()].get_or_insert_with(|| {
                    next_edge += 1;
                    next_edge - 1
                });
                let _ = write!(out, "e{number}");
            }
            Link::Outer(o) => {
                let _ = write!(out, "{:?}", b.outer_names()[o]);
            }
        };

        for r in 0..b.root_count() {
            out.push('{');
            self.write_children(Parent::Root(r), rank, &mut out, &mut link_label);
            out.push('}');
        }

        let mut inner: Vec<(&str, Link)> = b.inner_names().collect();
        inner.sort_unstable_by(|x, y| x.0.cmp(y.0));
        out.push_str(";[");
        for (i, (name, link)) in inner.into_iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "{name:?}=");
            link_label(link, &mut out);
        }
        let idle = b.idle_edges().count();
        let _ = write!(out, "]#{idle}");
        out
    }

    fn write_children(
        &self,
        parent: Parent,
        rank: &[u32],
        out: &mut String,
        link_label: &mut impl FnMut(Link, &mut String),
    ) {
        let b = self.bigraph;
        let mut nodes: Vec<NodeId> = b.child_nodes(parent).collect();
        nodes.sort_unstable_by_key(|n| rank[n.index()]);
        let mut sites: Vec<usize> = b.child_sites(parent).collect();
        sites.sort_unstable();
        let mut first = true;
        for n in nodes {
            if !first {
                out.push(',');
            }
            first = false;
            out.push_str(b.control_of(n).name());
            out.push('[');
            for (i, link) in b.ports_of(n).iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                link_label(*link, out);
            }
            out.push_str("](");
            self.write_children(Parent::Node(n), rank, out, link_label);
            out.push(')');
        }
        for s in sites {
            if !first {
                out.push(',');
            }
            first = false;
            let _ = write!(out, "${s}");
        }
    }
}

fn rank<T: Ord>(keys: &[T]) -> Vec<u32> {
    let distinct: BTreeSet<&T> = keys.iter().collect();
    let order: BTreeMap<&T, u32> = distinct
        .into_iter()
        .enumerate()
        .map(|(i, k)| (k, i as u32))
        .collect();
    keys.iter().map(|k| order[k]).collect()
}

fn count_classes(colours: &[u32]) -> usize {
    colours.iter().collect::<BTreeSet<_>>().len()
}

/// Members of the smallest colour class with more than one node.
fn target_cell(colours: &[u32]) -> Option<Vec<usize>> {
    let mut classes: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (v, c) in colours.iter().enumerate() {
        classes.entry(*c).or_default().push(v);
    }
    classes.into_values().find(|members| members.len() > 1)
}

fn individualize(colours: &[u32], v: usize) -> Vec<u32> {
    let keys: Vec<(u32, bool)> = colours
        .iter()
        .enumerate()
        .map(|(u, c)| (*c, u != v))
        .collect();
    rank(&keys)
}

struct Leaf {
    code: String,
    by_rank: Vec<usize>,
}

struct Search<'s, 'a> {
    shape: &'s Shape<'a>,
    first: Option<Leaf>,
    best: Option<Leaf>,
    automorphisms: Vec<Vec<usize>>,
}

impl Search<'_, '_> {
    fn explore(&mut self, colours: Vec<u32>, prefix: &mut Vec<usize>) {
        let colours = self.shape.refine(colours);
        let Some(cell) = target_cell(&colours) else {
            self.leaf(&colours);
            return;
        };
        let mut explored: Vec<usize> = Vec::new();
        for v in cell {
            if self.in_explored_orbit(prefix, &explored, v) {
                continue;
            }
            prefix.push(v);
            self.explore(individualize(&colours, v), prefix);
            prefix.pop();
            explored.push(v);
        }
    }

    /// Orbit test under the automorphisms that fix `prefix` pointwise.
    fn in_explored_orbit(&self, prefix: &[usize], explored: &[usize], v: usize) -> bool {
        if explored.is_empty() {
            return false;
        }
        let mut orbits = UnionFind::new(self.shape.len());
        let mut any = false;
        for gamma in &self.automorphisms {
            if prefix.iter().all(|p| gamma[*p] == *p) {
                any = true;
                for (u, image) in gamma.iter().enumerate() {
                    orbits.union(u, *image);
                }
            }
        }
        any && explored.iter().any(|w| orbits.find(*w) == orbits.find(v))
    }

    fn leaf(&mut self, colours: &[u32]) {
        let code = self.shape.encode(colours);
        let mut by_rank = vec![0; colours.len()];
        for (v, c) in colours.iter().enumerate() {
            by_rank[*c as usize] = v;
        }
        let leaf = Leaf { code, by_rank };

        let first_gamma = match &self.first {
            Some(first) => (first.code == leaf.code).then(|| automorphism(&first.by_rank, &leaf.by_rank)),
            None => {
                self.first = Some(Leaf {
                    code: leaf.code.clone(),
                    by_rank: leaf.by_rank.clone(),
                });
                None
            }
        };
        if let Some(gamma) = first_gamma {
            self.remember(gamma);
        }

        let against_best = self
            .best
            .as_ref()
            .map(|best| (best.code.cmp(&leaf.code), automorphism(&best.by_rank, &leaf.by_rank)));
        match against_best {
            Some((Ordering::Equal, gamma)) => self.remember(gamma),
            Some((Ordering::Less, _)) => {}
            _ => self.best = Some(leaf),
        }
    }

    fn remember(&mut self, gamma: Vec<usize>) {
        let identity = gamma.iter().enumerate().all(|(u, g)| u == *g);
        if !identity && !self.automorphisms.contains(&gamma) {
            self.automorphisms.push(gamma);
        }
    }
}

/// Maps each node of the `other` leaf to the node with the same rank in `reference`.
fn automorphism(reference: &[usize], other: &[usize]) -> Vec<usize> {
    let mut gamma = vec![0; reference.len()];
    for (r, v) in other.iter().enumerate() {
        gamma[*v] = reference[r];
    }
    gamma
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::builder::BigraphBuilder;
    use crate::signature::Signature;
    use std::sync::Arc;

    fn sig() -> Arc<Signature> {
        Signature::builder()
            .active("A", 1)
            .active("B", 2)
            .atomic("C", 0)
            .build()
            .unwrap()
    }

    #[test]
    fn sibling_order_does_not_matter() {
        let s = sig();
        let mut x = BigraphBuilder::new(Arc::clone(&s));
        let r = x.root();
        x.node(r, "C").unwrap();
        let a = x.node(r, "A").unwrap();
        let e = x.edge();
        x.link(a, 0, e).unwrap();
        let x = x.build().unwrap();

        let mut y = BigraphBuilder::new(s);
        let r = y.root();
        let a = y.node(r, "A").unwrap();
        y.node(r, "C").unwrap();
        let e = y.edge();
        y.link(a, 0, e).unwrap();
        let y = y.build().unwrap();

        assert_eq!(canonical_key(&x), canonical_key(&y));
        assert!(is_isomorphic(&x, &y));
    }

    #[test]
    fn link_structure_distinguishes_keys() {
        // A–A linked together beside a lone A, versus three separately linked As.
        let s = sig();
        let build = |pairs: &[(usize, usize)]| {
            let mut b = BigraphBuilder::new(Arc::clone(&s));
            let r = b.root();
            let nodes: Vec<_> = (0..4).map(|_| b.node(r, "A").unwrap()).collect();
            for (p, q) in pairs {
                let e = b.edge();
                b.link(nodes[*p], 0, e).unwrap();
                b.link(nodes[*q], 0, e).unwrap();
            }
            b.build().unwrap()
        };
        let ab_cd = build(&[(0, 1), (2, 3)]);
        let ac_bd = build(&[(0, 2), (1, 3)]);
        assert_eq!(canonical_key(&ab_cd), canonical_key(&ac_bd));
        assert!(canonical_key(&ab_cd).as_str().contains("A[e0]"));
    }

    #[test]
    fn outer_names_keep_their_labels() {
        let s = sig();
        let build = |name: &str| {
            let mut b = BigraphBuilder::new(Arc::clone(&s));
            let r = b.root();
            let a = b.node(r, "A").unwrap();
            let o = b.outer_name(name).unwrap();
            b.link(a, 0, o).unwrap();
            b.build().unwrap()
        };
        assert_ne!(canonical_key(&build("x")), canonical_key(&build("y")));
        assert_eq!(canonical_key(&build("x")).as_str(), "1:0:[\"x\"]{A[\"x\"]()};[]#0");
    }

    #[test]
    fn symmetric_rings_canonicalise() {
        // Two 3-rings of B nodes, the second built in a rotated arena order.
        let s = sig();
        let ring = |order: [usize; 3]| {
            let mut b = BigraphBuilder::new(Arc::clone(&s));
            let r = b.root();
            let nodes: Vec<_> = (0..3).map(|_| b.node(r, "B").unwrap()).collect();
            let edges: Vec<_> = (0..3).map(|_| b.edge()).collect();
            for i in 0..3 {
                let v = nodes[order[i]];
                b.link(v, 0, edges[i]).unwrap();
                b.link(v, 1, edges[(i + 1) % 3]).unwrap();
            }
            b.build().unwrap()
        };
        assert_eq!(canonical_key(&ring([0, 1, 2])), canonical_key(&ring([2, 0, 1])));
    }

    #[test]
    fn nesting_is_significant() {
        let s = sig();
        let mut nested = BigraphBuilder::new(Arc::clone(&s));
        let r = nested.root();
        let a = nested.node(r, "A").unwrap();
        let e = nested.edge();
        nested.link(a, 0, e).unwrap();
        nested.node(crate::Parent::Node(a), "C").unwrap();
        let nested = nested.build().unwrap();

        let mut flat = BigraphBuilder::new(s);
        let r = flat.root();
        let a = flat.node(r, "A").unwrap();
        let e = flat.edge();
        flat.link(a, 0, e).unwrap();
        flat.node(r, "C").unwrap();
        let flat = flat.build().unwrap();

        assert_ne!(canonical_key(&nested), canonical_key(&flat));
        assert!(!is_isomorphic(&nested, &flat));
    }
}
