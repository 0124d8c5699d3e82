// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Construction of bigraphs from a signature.
//!
//! The builder is the only place where untrusted structure enters the crate,
//! so every invariant of a bigraph is checked here: ports are linked exactly
//! once, atomic nodes stay empty, names are unique and site indices form a
//! contiguous range.
use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;

use crate::bigraph::{Bigraph, EdgeId, Link, NodeData, NodeId, Parent, RawBigraph};
use crate::signature::Signature;

/// Construction-time contract violations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    /// The control is not declared in the signature.
    #[error("unknown control: {0}")]
    UnknownControl(String),
    /// A child was placed under a node whose control is atomic.
    #[error("node {0} has an atomic control and cannot have children")]
    AtomicParent(usize),
    /// The parent place does not exist.
    #[error("unknown place: {0:?}")]
    UnknownPlace(Parent),
    /// The node does not exist.
    #[error("unknown node: {0}")]
    UnknownNode(usize),
    /// The link does not exist.
    #[error("unknown link: {0:?}")]
    UnknownLink(Link),
    /// Port index not below the control's arity.
    #[error("port {port} out of range for node {node} (arity {arity})")]
    PortOutOfRange {
        /// Node index.
        node: usize,
        /// Requested port.
        port: usize,
        /// Arity of the node's control.
        arity: usize,
    },
    /// A port was linked twice.
    #[error("port {port} of node {node} is already linked")]
    PortAlreadyLinked {
        /// Node index.
        node: usize,
        /// Port index.
        port: usize,
    },
    /// A port was never linked.
    #[error("port {port} of node {node} is not linked")]
    UnlinkedPort {
        /// Node index.
        node: usize,
        /// Port index.
        port: usize,
    },
    /// Two outer names share a label.
    #[error("duplicate outer name: {0}")]
    DuplicateOuterName(String),
    /// Two inner names share a label.
    #[error("duplicate inner name: {0}")]
    DuplicateInnerName(String),
    /// Two sites claim the same index.
    #[error("site index {0} used twice")]
    SiteIndexCollision(usize),
    /// Site indices do not form `0..k`.
    #[error("site index {0} missing")]
    SiteIndexGap(usize),
}

/// Mutable construction state; [`BigraphBuilder::build`] freezes it.
///
/// ```
/// use bigraph_core::{BigraphBuilder, Signature};
///
/// let sig = Signature::builder().active("Room", 1).build().unwrap();
/// let mut b = BigraphBuilder::new(sig);
/// let root = b.root();
/// let room = b.node(root, "Room").unwrap();
/// let o = b.outer_name("o").unwrap();
/// b.link(room, 0, o).unwrap();
/// let agent = b.build().unwrap();
/// assert!(agent.is_ground());
/// ```
#[derive(Debug)]
pub struct BigraphBuilder {
    signature: Arc<Signature>,
    roots: usize,
    nodes: Vec<(NodeData, Vec<Option<Link>>)>,
    sites: Vec<(Parent, usize)>,
    edges: usize,
    outer_names: Vec<String>,
    inner_names: Vec<(String, Link)>,
}

impl BigraphBuilder {
    /// Starts an empty bigraph over `signature`.
    pub fn new(signature: Arc<Signature>) -> Self {
        Self {
            signature,
            roots: 0,
            nodes: Vec::new(),
            sites: Vec::new(),
            edges: 0,
            outer_names: Vec::new(),
            inner_names: Vec::new(),
        }
    }

    /// Adds a root and returns it as a parent place.
    pub fn root(&mut self) -> Parent {
        self.roots += 1;
        Parent::Root(self.roots - 1)
    }

    fn check_parent(&self, parent: Parent) -> Result<(), BuildError> {
        match parent {
            Parent::Root(r) if r < self.roots => Ok(()),
            Parent::Node(n) if n.0 < self.nodes.len() => {
                let control = self.signature.control(self.nodes[n.0].0.control);
                if control.is_atomic() {
                    Err(BuildError::AtomicParent(n.0))
                } else {
                    Ok(())
                }
            }
            _ => Err(BuildError::UnknownPlace(parent)),
        }
    }

    /// Adds a node of `control` under `parent`.
    pub fn node(&mut self, parent: Parent, control: &str) -> Result<NodeId, BuildError> {
        self.check_parent(parent)?;
        let id = self
            .signature
            .control_id(control)
            .ok_or_else(|| BuildError::UnknownControl(control.to_owned()))?;
        let arity = self.signature.control(id).arity();
        self.nodes.push((
            NodeData {
                control: id,
                parent,
                ports: Vec::new(),
            },
            vec![None; arity],
        ));
        Ok(NodeId(self.nodes.len() - 1))
    }

    /// Adds a site under `parent` with the next free index.
    pub fn site(&mut self, parent: Parent) -> Result<usize, BuildError> {
        let index = self.sites.iter().map(|(_, i)| i + 1).max().unwrap_or(0);
        self.site_with_index(parent, index)
    }

    /// Adds a site with an explicit index; indices must end up contiguous.
    pub fn site_with_index(&mut self, parent: Parent, index: usize) -> Result<usize, BuildError> {
        self.check_parent(parent)?;
        if self.sites.iter().any(|(_, i)| *i == index) {
            return Err(BuildError::SiteIndexCollision(index));
        }
        self.sites.push((parent, index));
        Ok(index)
    }

    /// Adds a fresh edge.
    pub fn edge(&mut self) -> Link {
        self.edges += 1;
        Link::Edge(EdgeId(self.edges - 1))
    }

    /// Adds an outer name.
    pub fn outer_name(&mut self, name: &str) -> Result<Link, BuildError> {
        if self.outer_names.iter().any(|n| n == name) {
            return Err(BuildError::DuplicateOuterName(name.to_owned()));
        }
        self.outer_names.push(name.to_owned());
        Ok(Link::Outer(self.outer_names.len() - 1))
    }

    /// Returns the link of an existing outer name, adding it when absent.
    pub fn outer_name_or_existing(&mut self, name: &str) -> Link {
        match self.outer_names.iter().position(|n| n == name) {
            Some(i) => Link::Outer(i),
            None => {
                self.outer_names.push(name.to_owned());
                Link::Outer(self.outer_names.len() - 1)
            }
        }
    }

    fn check_link(&self, link: Link) -> Result<(), BuildError> {
        let ok = match link {
            Link::Edge(e) => e.0 < self.edges,
            Link::Outer(o) => o < self.outer_names.len(),
        };
        if ok {
            Ok(())
        } else {
            Err(BuildError::UnknownLink(link))
        }
    }

    /// Adds an inner name connected to `link`.
    pub fn inner_name(&mut self, name: &str, link: Link) -> Result<usize, BuildError> {
        self.check_link(link)?;
        if self.inner_names.iter().any(|(n, _)| n == name) {
            return Err(BuildError::DuplicateInnerName(name.to_owned()));
        }
        self.inner_names.push((name.to_owned(), link));
        Ok(self.inner_names.len() - 1)
    }

    /// Connects port `port` of `node` to `link`.
    pub fn link(&mut self, node: NodeId, port: usize, link: Link) -> Result<(), BuildError> {
        self.check_link(link)?;
        let (_, ports) = self
            .nodes
            .get_mut(node.0)
            .ok_or(BuildError::UnknownNode(node.0))?;
        let arity = ports.len();
        let slot = ports.get_mut(port).ok_or(BuildError::PortOutOfRange {
            node: node.0,
            port,
            arity,
        })?;
        if slot.is_some() {
            return Err(BuildError::PortAlreadyLinked { node: node.0, port });
        }
        *slot = Some(link);
        Ok(())
    }

    /// Validates the collected structure and freezes it.
    pub fn build(self) -> Result<Bigraph, BuildError> {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for (i, (mut data, ports)) in self.nodes.into_iter().enumerate() {
            data.ports = ports
                .into_iter()
                .enumerate()
                .map(|(p, l)| l.ok_or(BuildError::UnlinkedPort { node: i, port: p }))
                .collect::<Result<_, _>>()?;
            nodes.push(data);
        }

        let indices: BTreeSet<usize> = self.sites.iter().map(|(_, i)| *i).collect();
        if let Some(missing) = (0..self.sites.len()).find(|i| !indices.contains(i)) {
            return Err(BuildError::SiteIndexGap(missing));
        }
        let mut site_parents = vec![Parent::Root(0); self.sites.len()];
        for (parent, index) in self.sites {
            site_parents[index] = parent;
        }

        Ok(Bigraph::assemble(RawBigraph {
            signature: self.signature,
            roots: self.roots,
            nodes,
            site_parents,
            edges: self.edges,
            outer_names: self.outer_names,
            inner_names: self.inner_names,
        }))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn sig() -> Arc<Signature> {
        Signature::builder()
            .active("Room", 1)
            .atomic("Token", 0)
            .build()
            .unwrap()
    }

    #[test]
    fn atomic_nodes_reject_children() {
        let mut b = BigraphBuilder::new(sig());
        let r = b.root();
        let t = b.node(r, "Token").unwrap();
        assert_eq!(
            b.node(Parent::Node(t), "Token"),
            Err(BuildError::AtomicParent(0))
        );
        assert_eq!(b.site(Parent::Node(t)), Err(BuildError::AtomicParent(0)));
    }

    #[test]
    fn ports_must_be_linked_exactly_once() {
        let mut b = BigraphBuilder::new(sig());
        let r = b.root();
        let room = b.node(r, "Room").unwrap();
        let e = b.edge();
        assert!(matches!(
            b.link(room, 1, e),
            Err(BuildError::PortOutOfRange { port: 1, arity: 1, .. })
        ));
        b.link(room, 0, e).unwrap();
        assert!(matches!(
            b.link(room, 0, e),
            Err(BuildError::PortAlreadyLinked { .. })
        ));

        let mut unlinked = BigraphBuilder::new(sig());
        let r = unlinked.root();
        unlinked.node(r, "Room").unwrap();
        assert_eq!(
            unlinked.build().unwrap_err(),
            BuildError::UnlinkedPort { node: 0, port: 0 }
        );
    }

    #[test]
    fn site_indices_must_be_contiguous() {
        let mut b = BigraphBuilder::new(sig());
        let r = b.root();
        b.site_with_index(r, 1).unwrap();
        assert_eq!(b.site_with_index(r, 1), Err(BuildError::SiteIndexCollision(1)));
        assert_eq!(b.build().unwrap_err(), BuildError::SiteIndexGap(0));
    }

    #[test]
    fn unknown_controls_and_names() {
        let mut b = BigraphBuilder::new(sig());
        let r = b.root();
        assert_eq!(
            b.node(r, "Door"),
            Err(BuildError::UnknownControl("Door".into()))
        );
        b.outer_name("x").unwrap();
        assert_eq!(
            b.outer_name("x"),
            Err(BuildError::DuplicateOuterName("x".into()))
        );
        assert_eq!(
            b.node(Parent::Root(3), "Room"),
            Err(BuildError::UnknownPlace(Parent::Root(3)))
        );
    }

    #[test]
    fn derived_tables_follow_the_arena() {
        let mut b = BigraphBuilder::new(sig());
        let r = b.root();
        let room = b.node(r, "Room").unwrap();
        let token = b.node(Parent::Node(room), "Token").unwrap();
        let s = b.site(Parent::Node(room)).unwrap();
        let x = b.outer_name("x").unwrap();
        b.link(room, 0, x).unwrap();
        b.inner_name("y", x).unwrap();
        let g = b.build().unwrap();

        assert_eq!(
            g.children(Parent::Node(room)),
            &[crate::Place::Node(token), crate::Place::Site(s)]
        );
        assert_eq!(g.points_of(x).len(), 2);
        assert!(!g.is_ground());
        assert!(g.is_lean());
        assert_eq!(g.inner_face().width, 1);
    }
}
