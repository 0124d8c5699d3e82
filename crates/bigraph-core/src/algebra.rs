// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Bigraph algebra: composition, products, identities and link surgery.
//!
//! All operations work on arena tables. Node and edge ids of the left operand
//! are preserved; ids of the right operand are shifted past them.
use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;

use crate::bigraph::{Bigraph, EdgeId, Link, NodeData, NodeId, Parent, RawBigraph};
use crate::signature::Signature;

/// Errors raised when interfaces do not fit together.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompositionError {
    /// Operands were built against different signatures.
    #[error("signature mismatch")]
    SignatureMismatch,
    /// Outer sites and inner roots differ in number.
    #[error("width mismatch: outer has {sites} sites, inner has {roots} roots")]
    WidthMismatch {
        /// Sites of the outer operand.
        sites: usize,
        /// Roots of the inner operand.
        roots: usize,
    },
    /// Inner names of the outer operand differ from outer names of the inner one.
    #[error("name mismatch: {0}")]
    NameMismatch(String),
    /// A name occurs on both operands where it must be disjoint.
    #[error("name clash: {0}")]
    NameClash(String),
}

fn check_signatures(a: &Bigraph, b: &Bigraph) -> Result<(), CompositionError> {
    if a.signature().is_compatible(b.signature()) {
        Ok(())
    } else {
        Err(CompositionError::SignatureMismatch)
    }
}

/// Composes `outer ∘ inner`: the roots of `inner` fill the sites of `outer`
/// and its outer names are glued to the same-named inner names of `outer`.
pub fn compose(outer: &Bigraph, inner: &Bigraph) -> Result<Bigraph, CompositionError> {
    check_signatures(outer, inner)?;
    if outer.site_count() != inner.root_count() {
        return Err(CompositionError::WidthMismatch {
            sites: outer.site_count(),
            roots: inner.root_count(),
        });
    }
    let outer_inner = outer.inner_face().names;
    let inner_outer = inner.outer_face().names;
    if let Some(name) = outer_inner.symmetric_difference(&inner_outer).next() {
        return Err(CompositionError::NameMismatch(name.clone()));
    }

    let f = outer.raw();
    let g = inner.raw();
    let node_shift = f.nodes.len();
    let edge_shift = f.edges;
    let map_parent = |p: Parent| match p {
        Parent::Root(r) => f.site_parents[r],
        Parent::Node(n) => Parent::Node(NodeId(n.0 + node_shift)),
    };
    let map_link = |l: Link| -> Result<Link, CompositionError> {
        match l {
            Link::Edge(e) => Ok(Link::Edge(EdgeId(e.0 + edge_shift))),
            Link::Outer(o) => {
                let name = &g.outer_names[o];
                outer
                    .inner_index(name)
                    .map(|i| f.inner_names[i].1)
                    .ok_or_else(|| CompositionError::NameMismatch(name.clone()))
            }
        }
    };

    let mut nodes = f.nodes.clone();
    for node in &g.nodes {
        nodes.push(NodeData {
            control: node.control,
            parent: map_parent(node.parent),
            ports: node
                .ports
                .iter()
                .map(|l| map_link(*l))
                .collect::<Result<_, _>>()?,
        });
    }
    let site_parents = g.site_parents.iter().map(|p| map_parent(*p)).collect();
    let inner_names = g
        .inner_names
        .iter()
        .map(|(n, l)| Ok((n.clone(), map_link(*l)?)))
        .collect::<Result<_, CompositionError>>()?;

    Ok(Bigraph::assemble(RawBigraph {
        signature: Arc::clone(&f.signature),
        roots: f.roots,
        nodes,
        site_parents,
        edges: f.edges + g.edges,
        outer_names: f.outer_names.clone(),
        inner_names,
    }))
}

fn juxtapose(a: &Bigraph, b: &Bigraph, share_outer: bool) -> Result<Bigraph, CompositionError> {
    check_signatures(a, b)?;
    for (name, _) in b.inner_names() {
        if a.inner_index(name).is_some() {
            return Err(CompositionError::NameClash(name.to_owned()));
        }
    }
    if !share_outer {
        if let Some(name) = b.outer_names().iter().find(|n| a.outer_index(n).is_some()) {
            return Err(CompositionError::NameClash(name.clone()));
        }
    }

    let x = a.raw();
    let y = b.raw();
    let mut outer_names = x.outer_names.clone();
    let outer_map: Vec<usize> = y
        .outer_names
        .iter()
        .map(|n| match a.outer_index(n) {
            Some(i) => i,
            None => {
                outer_names.push(n.clone());
                outer_names.len() - 1
            }
        })
        .collect();

    let node_shift = x.nodes.len();
    let map_parent = |p: Parent| match p {
        Parent::Root(r) => Parent::Root(r + x.roots),
        Parent::Node(n) => Parent::Node(NodeId(n.0 + node_shift)),
    };
    let map_link = |l: Link| match l {
        Link::Edge(e) => Link::Edge(EdgeId(e.0 + x.edges)),
        Link::Outer(o) => Link::Outer(outer_map[o]),
    };

    let mut nodes = x.nodes.clone();
    nodes.extend(y.nodes.iter().map(|n| NodeData {
        control: n.control,
        parent: map_parent(n.parent),
        ports: n.ports.iter().map(|l| map_link(*l)).collect(),
    }));
    let mut site_parents = x.site_parents.clone();
    site_parents.extend(y.site_parents.iter().map(|p| map_parent(*p)));
    let mut inner_names = x.inner_names.clone();
    inner_names.extend(y.inner_names.iter().map(|(n, l)| (n.clone(), map_link(*l))));

    Ok(Bigraph::assemble(RawBigraph {
        signature: Arc::clone(&x.signature),
        roots: x.roots + y.roots,
        nodes,
        site_parents,
        edges: x.edges + y.edges,
        outer_names,
        inner_names,
    }))
}

/// Tensor product `a ⊗ b`; all names must be disjoint.
pub fn tensor(a: &Bigraph, b: &Bigraph) -> Result<Bigraph, CompositionError> {
    juxtapose(a, b, false)
}

/// Parallel product `a ∥ b`: like the tensor product, but shared outer names
/// are merged into one link. Inner names must still be disjoint.
pub fn parallel_product(a: &Bigraph, b: &Bigraph) -> Result<Bigraph, CompositionError> {
    juxtapose(a, b, true)
}

/// Folds a sequence with [`parallel_product`]; the empty product is the
/// empty bigraph over `signature`.
pub fn parallel_all<'a, I>(signature: &Arc<Signature>, parts: I) -> Result<Bigraph, CompositionError>
where
    I: IntoIterator<Item = &'a Bigraph>,
{
    let mut acc = Bigraph::assemble(RawBigraph::empty(Arc::clone(signature)));
    for part in parts {
        acc = parallel_product(&acc, part)?;
    }
    Ok(acc)
}

/// Identity `id_width ⊗ id_names`: one site per root and every inner name
/// wired to its outer twin.
pub fn identity(signature: &Arc<Signature>, width: usize, names: &[String]) -> Bigraph {
    let mut raw = RawBigraph::empty(Arc::clone(signature));
    raw.roots = width;
    raw.site_parents = (0..width).map(Parent::Root).collect();
    let unique: BTreeSet<&String> = names.iter().collect();
    raw.outer_names = unique.into_iter().cloned().collect();
    raw.inner_names = raw
        .outer_names
        .iter()
        .enumerate()
        .map(|(i, n)| (n.clone(), Link::Outer(i)))
        .collect();
    Bigraph::assemble(raw)
}

/// Placeless linking with the given idle outer names.
pub fn idle_names(signature: &Arc<Signature>, names: &[String]) -> Bigraph {
    let mut raw = RawBigraph::empty(Arc::clone(signature));
    let unique: BTreeSet<&String> = names.iter().collect();
    raw.outer_names = unique.into_iter().cloned().collect();
    Bigraph::assemble(raw)
}

/// Closes the listed outer names: each becomes a private edge. Names that are
/// not present are ignored.
pub fn close_names(bigraph: &Bigraph, names: &[String]) -> Bigraph {
    let mut raw = bigraph.raw().clone();
    let mut remap = Vec::with_capacity(raw.outer_names.len());
    let mut kept = Vec::new();
    for name in &raw.outer_names {
        if names.contains(name) {
            remap.push(Link::Edge(EdgeId(raw.edges)));
            raw.edges += 1;
        } else {
            remap.push(Link::Outer(kept.len()));
            kept.push(name.clone());
        }
    }
    raw.outer_names = kept;
    relink(&mut raw, |l| match l {
        Link::Outer(o) => remap[o],
        edge @ Link::Edge(_) => edge,
    });
    Bigraph::assemble(raw)
}

/// Removes idle edges. Idle outer names are part of the interface and stay.
pub fn lean(bigraph: &Bigraph) -> Bigraph {
    let idle: BTreeSet<EdgeId> = bigraph.idle_edges().collect();
    if idle.is_empty() {
        return bigraph.clone();
    }
    let mut raw = bigraph.raw().clone();
    let mut remap = Vec::with_capacity(raw.edges);
    let mut next = 0;
    for e in 0..raw.edges {
        remap.push(next);
        if !idle.contains(&EdgeId(e)) {
            next += 1;
        }
    }
    raw.edges = next;
    relink(&mut raw, |l| match l {
        Link::Edge(e) => Link::Edge(EdgeId(remap[e.0])),
        outer @ Link::Outer(_) => outer,
    });
    Bigraph::assemble(raw)
}

fn relink(raw: &mut RawBigraph, map: impl Fn(Link) -> Link) {
    for node in &mut raw.nodes {
        for port in &mut node.ports {
            *port = map(*port);
        }
    }
    for (_, link) in &mut raw.inner_names {
        *link = map(*link);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::builder::BigraphBuilder;
    use crate::canonical::canonical_key;

    fn sig() -> Arc<Signature> {
        Signature::builder()
            .active("A", 1)
            .atomic("B", 0)
            .build()
            .unwrap()
    }

    #[test]
    fn composing_with_identity_is_neutral() {
        let s = sig();
        let mut b = BigraphBuilder::new(Arc::clone(&s));
        let r = b.root();
        let a = b.node(r, "A").unwrap();
        let x = b.outer_name("x").unwrap();
        b.link(a, 0, x).unwrap();
        b.site(Parent::Node(a)).unwrap();
        let g = b.build().unwrap();

        let id_out = identity(&s, 1, &["x".to_owned()]);
        let left = compose(&id_out, &g).unwrap();
        assert_eq!(canonical_key(&left), canonical_key(&g));

        let id_in = identity(&s, 1, &[]);
        let right = compose(&g, &id_in).unwrap();
        assert_eq!(canonical_key(&right), canonical_key(&g));
    }

    #[test]
    fn compose_checks_interfaces() {
        let s = sig();
        let one = identity(&s, 1, &[]);
        let two = identity(&s, 2, &[]);
        assert_eq!(
            compose(&one, &two).unwrap_err(),
            CompositionError::WidthMismatch { sites: 1, roots: 2 }
        );
        let named = identity(&s, 1, &["y".to_owned()]);
        assert!(matches!(
            compose(&one, &named),
            Err(CompositionError::NameMismatch(_))
        ));
    }

    #[test]
    fn parallel_product_merges_shared_names() {
        let s = sig();
        let mut b = BigraphBuilder::new(Arc::clone(&s));
        let r = b.root();
        let a = b.node(r, "A").unwrap();
        let x = b.outer_name("x").unwrap();
        b.link(a, 0, x).unwrap();
        let g = b.build().unwrap();

        assert!(matches!(
            tensor(&g, &g),
            Err(CompositionError::NameClash(_))
        ));
        let both = parallel_product(&g, &g).unwrap();
        assert_eq!(both.root_count(), 2);
        assert_eq!(both.outer_names(), &["x".to_owned()]);
        assert_eq!(both.points_of(Link::Outer(0)).len(), 2);
    }

    #[test]
    fn close_and_lean() {
        let s = sig();
        let mut b = BigraphBuilder::new(Arc::clone(&s));
        let r = b.root();
        let a = b.node(r, "A").unwrap();
        let x = b.outer_name("x").unwrap();
        b.link(a, 0, x).unwrap();
        b.edge();
        let g = b.build().unwrap();
        assert!(!g.is_lean());

        let closed = close_names(&g, &["x".to_owned()]);
        assert!(closed.outer_names().is_empty());
        assert_eq!(closed.edge_count(), 2);

        let thin = lean(&closed);
        assert_eq!(thin.edge_count(), 1);
        assert!(thin.is_lean());
        assert!(matches!(thin.ports_of(a)[0], Link::Edge(_)));
    }
}
