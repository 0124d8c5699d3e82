// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Arena-backed bigraph value.
//!
//! A [`Bigraph`] owns one arena of nodes addressed by [`NodeId`]. Parents are
//! stored per node and per site; child lists, link point tables and name
//! indices are derived once when the value is assembled and never change
//! afterwards. Every operation in this crate produces a new value instead of
//! mutating an existing one.
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::signature::{Control, ControlId, Signature};

/// Index of a node inside its bigraph's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Arena position.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Index of an edge (closed link).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub(crate) usize);

impl EdgeId {
    /// Arena position.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A place that can hold children: a root or a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Parent {
    /// Root `i` of the outer face.
    Root(usize),
    /// A node.
    Node(NodeId),
}

/// A place that has a parent: a node or a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Place {
    /// A node.
    Node(NodeId),
    /// Site `i` of the inner face.
    Site(usize),
}

/// A link: an edge or an outer name (by position in [`Bigraph::outer_names`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Link {
    /// Closed link.
    Edge(EdgeId),
    /// Open link named on the outer face.
    Outer(usize),
}

/// A point: a node port or an inner name (by position in [`Bigraph::inner_names`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Point {
    /// Port `i` of a node.
    Port(NodeId, usize),
    /// Inner name.
    Inner(usize),
}

/// One face of a bigraph: a width (roots or sites) and a set of names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Interface {
    /// Number of roots (outer face) or sites (inner face).
    pub width: usize,
    /// Outer or inner names.
    pub names: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub(crate) control: ControlId,
    pub(crate) parent: Parent,
    pub(crate) ports: Vec<Link>,
}

/// Plain tables from which a [`Bigraph`] is assembled.
///
/// Producers (builder, algebra, matcher) guarantee the structural invariants;
/// `assemble` only derives lookup tables.
#[derive(Debug, Clone)]
pub(crate) struct RawBigraph {
    pub(crate) signature: Arc<Signature>,
    pub(crate) roots: usize,
    pub(crate) nodes: Vec<NodeData>,
    pub(crate) site_parents: Vec<Parent>,
    pub(crate) edges: usize,
    pub(crate) outer_names: Vec<String>,
    pub(crate) inner_names: Vec<(String, Link)>,
}

impl RawBigraph {
    pub(crate) fn empty(signature: Arc<Signature>) -> Self {
        Self {
            signature,
            roots: 0,
            nodes: Vec::new(),
            site_parents: Vec::new(),
            edges: 0,
            outer_names: Vec::new(),
            inner_names: Vec::new(),
        }
    }
}

/// Immutable bigraph: place forest, link hypergraph and interfaces.
#[derive(Debug, Clone)]
pub struct Bigraph {
    raw: RawBigraph,
    root_children: Vec<Vec<Place>>,
    node_children: Vec<Vec<Place>>,
    edge_points: Vec<Vec<Point>>,
    outer_points: Vec<Vec<Point>>,
    outer_index: BTreeMap<String, usize>,
    inner_index: BTreeMap<String, usize>,
}

impl Bigraph {
    pub(crate) fn assemble(raw: RawBigraph) -> Self {
        let mut root_children = vec![Vec::new(); raw.roots];
        let mut node_children = vec![Vec::new(); raw.nodes.len()];
        let mut edge_points = vec![Vec::new(); raw.edges];
        let mut outer_points = vec![Vec::new(); raw.outer_names.len()];

        let mut attach = |parent: Parent, child: Place| match parent {
            Parent::Root(r) => root_children[r].push(child),
            Parent::Node(n) => node_children[n.0].push(child),
        };
        for (i, node) in raw.nodes.iter().enumerate() {
            attach(node.parent, Place::Node(NodeId(i)));
        }
        for (i, parent) in raw.site_parents.iter().enumerate() {
            attach(*parent, Place::Site(i));
        }

        let mut connect = |link: Link, point: Point| match link {
            Link::Edge(e) => edge_points[e.0].push(point),
            Link::Outer(o) => outer_points[o].push(point),
        };
        for (i, node) in raw.nodes.iter().enumerate() {
            for (p, link) in node.ports.iter().enumerate() {
                connect(*link, Point::Port(NodeId(i), p));
            }
        }
        for (i, (_, link)) in raw.inner_names.iter().enumerate() {
            connect(*link, Point::Inner(i));
        }

        let outer_index = raw
            .outer_names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        let inner_index = raw
            .inner_names
            .iter()
            .enumerate()
            .map(|(i, (n, _))| (n.clone(), i))
            .collect();

        Self {
            raw,
            root_children,
            node_children,
            edge_points,
            outer_points,
            outer_index,
            inner_index,
        }
    }

    pub(crate) fn raw(&self) -> &RawBigraph {
        &self.raw
    }

    pub(crate) fn into_raw(self) -> RawBigraph {
        self.raw
    }

    /// Signature this bigraph is built against.
    pub fn signature(&self) -> &Arc<Signature> {
        &self.raw.signature
    }

    /// Number of roots (outer width).
    pub fn root_count(&self) -> usize {
        self.raw.roots
    }

    /// Number of sites (inner width).
    pub fn site_count(&self) -> usize {
        self.raw.site_parents.len()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.raw.nodes.len()
    }

    /// Number of edges, idle ones included.
    pub fn edge_count(&self) -> usize {
        self.raw.edges
    }

    /// All node ids in arena order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.raw.nodes.len()).map(NodeId)
    }

    /// All edge ids in arena order.
    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        (0..self.raw.edges).map(EdgeId)
    }

    /// Children of a root or node: nodes in arena order, then sites.
    pub fn children(&self, parent: Parent) -> &[Place] {
        match parent {
            Parent::Root(r) => &self.root_children[r],
            Parent::Node(n) => &self.node_children[n.0],
        }
    }

    /// Parent of a node or site.
    pub fn parent_of(&self, place: Place) -> Parent {
        match place {
            Place::Node(n) => self.raw.nodes[n.0].parent,
            Place::Site(s) => self.raw.site_parents[s],
        }
    }

    /// Control id of a node.
    pub fn control_id_of(&self, node: NodeId) -> ControlId {
        self.raw.nodes[node.0].control
    }

    /// Control of a node.
    pub fn control_of(&self, node: NodeId) -> &Control {
        self.raw.signature.control(self.raw.nodes[node.0].control)
    }

    /// Links of a node's ports, in port order.
    pub fn ports_of(&self, node: NodeId) -> &[Link] {
        &self.raw.nodes[node.0].ports
    }

    /// Link a point is connected to.
    pub fn link_of_point(&self, point: Point) -> Link {
        match point {
            Point::Port(n, p) => self.raw.nodes[n.0].ports[p],
            Point::Inner(i) => self.raw.inner_names[i].1,
        }
    }

    /// Points connected to a link: ports in arena order, then inner names.
    pub fn points_of(&self, link: Link) -> &[Point] {
        match link {
            Link::Edge(e) => &self.edge_points[e.0],
            Link::Outer(o) => &self.outer_points[o],
        }
    }

    /// Outer names in declaration order.
    pub fn outer_names(&self) -> &[String] {
        &self.raw.outer_names
    }

    /// Inner names with the link each one is connected to.
    pub fn inner_names(&self) -> impl Iterator<Item = (&str, Link)> + '_ {
        self.raw.inner_names.iter().map(|(n, l)| (n.as_str(), *l))
    }

    /// Name of inner name `index`.
    pub fn inner_name(&self, index: usize) -> &str {
        &self.raw.inner_names[index].0
    }

    /// Position of an outer name.
    pub fn outer_index(&self, name: &str) -> Option<usize> {
        self.outer_index.get(name).copied()
    }

    /// Position of an inner name.
    pub fn inner_index(&self, name: &str) -> Option<usize> {
        self.inner_index.get(name).copied()
    }

    /// Roots and outer names.
    pub fn outer_face(&self) -> Interface {
        Interface {
            width: self.raw.roots,
            names: self.raw.outer_names.iter().cloned().collect(),
        }
    }

    /// Sites and inner names.
    pub fn inner_face(&self) -> Interface {
        Interface {
            width: self.site_count(),
            names: self.raw.inner_names.iter().map(|(n, _)| n.clone()).collect(),
        }
    }

    /// No sites and no inner names.
    pub fn is_ground(&self) -> bool {
        self.raw.site_parents.is_empty() && self.raw.inner_names.is_empty()
    }

    /// Exactly one root.
    pub fn is_prime(&self) -> bool {
        self.raw.roots == 1
    }

    /// No idle links (edges or outer names without points).
    pub fn is_lean(&self) -> bool {
        self.idle_links().next().is_none()
    }

    /// Edges without points.
    pub fn idle_edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges().filter(|e| self.edge_points[e.0].is_empty())
    }

    /// Edges and outer names without points.
    pub fn idle_links(&self) -> impl Iterator<Item = Link> + '_ {
        let outer = (0..self.outer_points.len())
            .filter(|o| self.outer_points[*o].is_empty())
            .map(Link::Outer);
        self.idle_edges().map(Link::Edge).chain(outer)
    }

    /// Walks from `node` up to its root; `true` if `ancestor` is met on the way
    /// (a node counts as its own ancestor).
    pub fn is_descendant_or_self(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = Parent::Node(node);
        while let Parent::Node(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.raw.nodes[n.0].parent;
        }
        false
    }

    /// Every node strictly above `parent`, plus `parent` itself when it is a node.
    pub fn ancestors(&self, parent: Parent) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = parent;
        while let Parent::Node(n) = current {
            out.push(n);
            current = self.raw.nodes[n.0].parent;
        }
        out
    }

    /// Root index above a place.
    pub fn root_of(&self, place: Place) -> usize {
        let mut current = self.parent_of(place);
        loop {
            match current {
                Parent::Root(r) => return r,
                Parent::Node(n) => current = self.raw.nodes[n.0].parent,
            }
        }
    }

    /// Nodes of the subtree under `node` (itself included), in depth-first
    /// pre-order with children visited in stored order.
    pub fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            out.push(n);
            for child in self.node_children[n.0].iter().rev() {
                if let Place::Node(c) = child {
                    stack.push(*c);
                }
            }
        }
        out
    }

    /// All places that can hold children, in depth-first pre-order: root 0 and
    /// its subtree, then root 1, and so on.
    pub fn parents_preorder(&self) -> Vec<Parent> {
        let mut out = Vec::with_capacity(self.raw.roots + self.raw.nodes.len());
        for r in 0..self.raw.roots {
            out.push(Parent::Root(r));
            for child in &self.root_children[r] {
                if let Place::Node(n) = child {
                    out.extend(self.subtree(*n).into_iter().map(Parent::Node));
                }
            }
        }
        out
    }

    /// Node children of a root or node, in stored order.
    pub fn child_nodes(&self, parent: Parent) -> impl Iterator<Item = NodeId> + '_ {
        self.children(parent).iter().filter_map(|c| match c {
            Place::Node(n) => Some(*n),
            Place::Site(_) => None,
        })
    }

    /// Site children of a root or node.
    pub fn child_sites(&self, parent: Parent) -> impl Iterator<Item = usize> + '_ {
        self.children(parent).iter().filter_map(|c| match c {
            Place::Site(s) => Some(*s),
            Place::Node(_) => None,
        })
    }
}
