// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Contextual matching of a redex inside a ground agent.
//!
//! A match decomposes the agent as `context ∘ (redex ⊗ id_Z) ∘ parameters`.
//! Place matching runs first: every redex root is anchored at an agent root
//! or node whose ancestors are all active, its node children are mapped
//! injectively onto children of the anchor, and nodes with site children
//! hand their unmatched children to those sites. Link matching then checks
//! the induced port map: redex edges must map injectively to agent edges
//! that reach no context point, and parameter points reach their links
//! either through a redex inner name or through a fresh shared name in `Z`.
//!
//! Anchors are visited in depth-first order over the agent, so the sequence
//! of matches is a pure function of the two inputs.
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tracing::trace;

use crate::algebra::{self, CompositionError};
use crate::bigraph::{Bigraph, EdgeId, Link, NodeData, NodeId, Parent, Place, Point, RawBigraph};
use crate::parallel;

/// Reasons a matcher cannot be set up.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MatchError {
    /// Agent and redex were built against different signatures.
    #[error("agent and redex signatures differ")]
    SignatureMismatch,
    /// The agent has sites or inner names.
    #[error("agent is not ground")]
    AgentNotGround,
    /// A redex site sits directly under a root.
    #[error("redex site {0} is not guarded by a node")]
    Unguarded(usize),
    /// A redex root has no children.
    #[error("redex root {0} is empty")]
    EmptyRoot(usize),
    /// The redex has edges without points.
    #[error("redex has idle edges")]
    IdleEdge,
    /// Two redex inner names share one link.
    #[error("redex inner names {0} and {1} share a link")]
    InnerNamesShareLink(String, String),
}

/// Checks that `redex` is simple: guarding, without empty roots, lean on
/// edges and inner-injective.
pub fn check_redex(redex: &Bigraph) -> Result<(), MatchError> {
    for s in 0..redex.site_count() {
        if let Parent::Root(_) = redex.parent_of(Place::Site(s)) {
            return Err(MatchError::Unguarded(s));
        }
    }
    if let Some(r) = (0..redex.root_count()).find(|r| redex.children(Parent::Root(*r)).is_empty()) {
        return Err(MatchError::EmptyRoot(r));
    }
    if redex.idle_edges().next().is_some() {
        return Err(MatchError::IdleEdge);
    }
    let mut seen: FxHashMap<Link, &str> = FxHashMap::default();
    for (name, link) in redex.inner_names() {
        if let Some(other) = seen.insert(link, name) {
            return Err(MatchError::InnerNamesShareLink(other.to_owned(), name.to_owned()));
        }
    }
    Ok(())
}

/// Partial place embedding: redex nodes onto agent nodes, redex sites onto
/// the agent nodes that become parameter roots.
#[derive(Debug, Clone, Default)]
struct Fit {
    pairs: Vec<(usize, NodeId)>,
    sites: Vec<(usize, Vec<NodeId>)>,
}

impl Fit {
    fn merged(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.pairs.extend_from_slice(&other.pairs);
        out.sites.extend(other.sites.iter().cloned());
        out
    }

    fn image(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.pairs.iter().map(|(_, v)| *v)
    }
}

type Memo = FxHashMap<(usize, usize), Vec<Fit>>;

/// Search state for mapping redex children injectively onto agent children.
struct Slots<'x> {
    wanted: &'x [NodeId],
    offered: &'x [NodeId],
    used: Vec<bool>,
    out: Vec<(Fit, Vec<bool>)>,
}

#[derive(Debug, Clone, Copy)]
enum Role {
    Image(usize),
    Param,
}

/// Identity of a decomposition; matches with equal keys produce equal
/// contexts and parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MatchKey {
    anchors: Vec<Parent>,
    image: Vec<NodeId>,
    parameters: Vec<Vec<NodeId>>,
    names: Vec<Option<Link>>,
}

/// One occurrence of a redex in an agent.
#[derive(Debug, Clone)]
pub struct BigraphMatch {
    key: MatchKey,
    node_image: Vec<NodeId>,
    link_image: BTreeMap<Link, Link>,
    context: Bigraph,
    parameters: Vec<Bigraph>,
    shared_names: Vec<String>,
}

impl BigraphMatch {
    /// Agent minus the occurrence: one site per redex root, inner names for
    /// the redex outer names followed by the shared names.
    pub fn context(&self) -> &Bigraph {
        &self.context
    }

    /// One prime ground bigraph per redex site.
    pub fn parameters(&self) -> &[Bigraph] {
        &self.parameters
    }

    /// Agent node matched by each redex node (indexed by redex node).
    pub fn image(&self) -> &[NodeId] {
        &self.node_image
    }

    /// Agent place under which each redex root was found.
    pub fn anchors(&self) -> &[Parent] {
        &self.key.anchors
    }

    /// Names `Z` linking parameters to the context around the redex.
    pub fn shared_names(&self) -> &[String] {
        &self.shared_names
    }

    /// Agent link a redex link was mapped to, if any port determined it.
    pub fn redex_link_image(&self, link: Link) -> Option<Link> {
        self.link_image.get(&link).copied()
    }

    /// Rebuilds `context ∘ (redex ⊗ id_Z) ∘ parameters`.
    ///
    /// Redex outer names that no port determined are represented in the
    /// context by idle edges, so the result equals the agent up to idle edges.
    pub fn recompose(&self, redex: &Bigraph) -> Result<Bigraph, CompositionError> {
        let names: Vec<String> = redex.inner_names().map(|(n, _)| n.to_owned()).collect();
        let filled = self.fill(redex, &names, (0..self.parameters.len()).collect::<Vec<_>>().as_slice())?;
        algebra::compose(&self.context, &filled)
    }

    /// `(inner ⊗ id_Z) ∘ (parameters[order[0]] ∥ parameters[order[1]] ∥ ...)`
    /// with the parameter names padded to `keep ∪ Z`; parameter names outside
    /// that set are closed.
    pub(crate) fn fill(
        &self,
        inner: &Bigraph,
        keep: &[String],
        order: &[usize],
    ) -> Result<Bigraph, CompositionError> {
        let sig = inner.signature();
        let id_z = algebra::identity(sig, 0, &self.shared_names);
        let upper = algebra::tensor(inner, &id_z)?;

        let selected: Vec<&Bigraph> = order.iter().map(|i| &self.parameters[*i]).collect();
        let params = algebra::parallel_all(sig, selected)?;
        let wanted: BTreeSet<&String> = keep.iter().chain(&self.shared_names).collect();
        let dangling: Vec<String> = params
            .outer_names()
            .iter()
            .filter(|n| !wanted.contains(n))
            .cloned()
            .collect();
        let params = algebra::close_names(&params, &dangling);
        let missing: Vec<String> = wanted
            .into_iter()
            .filter(|n| params.outer_index(n).is_none())
            .cloned()
            .collect();
        let padded = algebra::parallel_product(&params, &algebra::idle_names(sig, &missing))?;
        algebra::compose(&upper, &padded)
    }
}

/// Finds occurrences of one redex in one agent.
#[derive(Debug)]
pub struct Matcher<'a> {
    agent: &'a Bigraph,
    redex: &'a Bigraph,
    reserved: BTreeSet<String>,
    other_roots: Vec<Vec<(Parent, Fit)>>,
}

impl<'a> Matcher<'a> {
    /// Validates the inputs and prepares the fits of every redex root but the first.
    pub fn new(agent: &'a Bigraph, redex: &'a Bigraph) -> Result<Self, MatchError> {
        if !agent.signature().is_compatible(redex.signature()) {
            return Err(MatchError::SignatureMismatch);
        }
        if !agent.is_ground() {
            return Err(MatchError::AgentNotGround);
        }
        check_redex(redex)?;
        let reserved = redex
            .outer_names()
            .iter()
            .cloned()
            .chain(redex.inner_names().map(|(n, _)| n.to_owned()))
            .collect();
        let mut matcher = Self {
            agent,
            redex,
            reserved,
            other_roots: Vec::new(),
        };
        let anchors = agent.parents_preorder();
        let mut memo = Memo::default();
        matcher.other_roots = (1..redex.root_count())
            .map(|r| {
                anchors
                    .iter()
                    .filter(|a| matcher.context_active(**a))
                    .flat_map(|a| {
                        matcher
                            .root_fits(r, *a, &mut memo)
                            .into_iter()
                            .map(|f| (*a, f))
                            .collect::<Vec<_>>()
                    })
                    .collect()
            })
            .collect();
        Ok(matcher)
    }

    /// Keeps the generated shared names clear of `names` (for example the
    /// names of a reactum that will replace the redex).
    pub fn reserve_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved.extend(names.into_iter().map(Into::into));
        self
    }

    /// Lazy, restartable sequence of matches in anchor order.
    pub fn matches(&self) -> Matches<'_, 'a> {
        Matches {
            matcher: self,
            anchors: self.agent.parents_preorder(),
            next_anchor: 0,
            buffer: VecDeque::new(),
            seen: FxHashSet::default(),
        }
    }

    /// All matches, anchors evaluated on up to `workers` threads. The result
    /// has the same order as [`Matcher::matches`].
    pub fn collect_matches(&self, workers: usize) -> Vec<BigraphMatch> {
        let anchors = self.agent.parents_preorder();
        let per_anchor = parallel::fan_out(anchors.len(), workers, |i| self.matches_at(anchors[i]));
        let mut seen = FxHashSet::default();
        per_anchor
            .into_iter()
            .flatten()
            .filter(|m| seen.insert(m.key.clone()))
            .collect()
    }

    /// `true` if at least one match exists.
    pub fn has_match(&self) -> bool {
        self.matches().next().is_some()
    }

    fn context_active(&self, anchor: Parent) -> bool {
        self.agent
            .ancestors(anchor)
            .into_iter()
            .all(|n| self.agent.control_of(n).is_active())
    }

    fn matches_at(&self, anchor: Parent) -> Vec<BigraphMatch> {
        if !self.context_active(anchor) {
            return Vec::new();
        }
        let mut memo = Memo::default();
        let first = self.root_fits(0, anchor, &mut memo);
        trace!(?anchor, fits = first.len(), "anchor tried");
        let mut out = Vec::new();
        let mut chosen = Vec::with_capacity(self.redex.root_count());
        for fit in first {
            chosen.push((anchor, fit));
            self.combine(&mut chosen, &mut out);
            chosen.pop();
        }
        out
    }

    fn combine(&self, chosen: &mut Vec<(Parent, Fit)>, out: &mut Vec<BigraphMatch>) {
        let r = chosen.len();
        if r == self.redex.root_count() {
            if let Some(m) = self.finish(chosen) {
                out.push(m);
            }
            return;
        }
        for (anchor, fit) in &self.other_roots[r - 1] {
            chosen.push((*anchor, fit.clone()));
            if self.disjoint(chosen) {
                self.combine(chosen, out);
            }
            chosen.pop();
        }
    }

    /// Root images and parameter regions must not overlap, and no anchor may
    /// lie inside an image or a parameter.
    fn disjoint(&self, chosen: &[(Parent, Fit)]) -> bool {
        let mut image = FxHashSet::default();
        let mut tops = FxHashSet::default();
        for (_, fit) in chosen {
            if !fit.image().all(|v| image.insert(v)) {
                return false;
            }
            for (_, roots) in &fit.sites {
                if !roots.iter().all(|t| tops.insert(*t)) {
                    return false;
                }
            }
        }
        if image.iter().any(|v| tops.contains(v)) {
            return false;
        }
        chosen.iter().all(|(anchor, _)| {
            self.agent
                .ancestors(*anchor)
                .iter()
                .all(|n| !image.contains(n) && !tops.contains(n))
        })
    }

    fn root_fits(&self, root: usize, anchor: Parent, memo: &mut Memo) -> Vec<Fit> {
        let wanted: Vec<NodeId> = self.redex.child_nodes(Parent::Root(root)).collect();
        let offered: Vec<NodeId> = self.agent.child_nodes(anchor).collect();
        if offered.len() < wanted.len() {
            return Vec::new();
        }
        self.assign(&wanted, &offered, memo)
            .into_iter()
            .map(|(fit, _)| fit)
            .collect()
    }

    fn node_fits(&self, u: NodeId, v: NodeId, memo: &mut Memo) -> Vec<Fit> {
        if let Some(hit) = memo.get(&(u.index(), v.index())) {
            return hit.clone();
        }
        let fits = self.compute_node_fits(u, v, memo);
        memo.insert((u.index(), v.index()), fits.clone());
        fits
    }

    fn compute_node_fits(&self, u: NodeId, v: NodeId, memo: &mut Memo) -> Vec<Fit> {
        if self.redex.control_id_of(u) != self.agent.control_id_of(v) {
            return Vec::new();
        }
        let wanted: Vec<NodeId> = self.redex.child_nodes(Parent::Node(u)).collect();
        let sites: Vec<usize> = self.redex.child_sites(Parent::Node(u)).collect();
        let offered: Vec<NodeId> = self.agent.child_nodes(Parent::Node(v)).collect();
        if offered.len() < wanted.len() || (sites.is_empty() && offered.len() != wanted.len()) {
            return Vec::new();
        }

        let head = Fit {
            pairs: vec![(u.index(), v)],
            sites: Vec::new(),
        };
        let mut out = Vec::new();
        for (fit, used) in self.assign(&wanted, &offered, memo) {
            let base = head.merged(&fit);
            if sites.is_empty() {
                out.push(base);
                continue;
            }
            let leftovers: Vec<NodeId> = offered
                .iter()
                .zip(&used)
                .filter(|(_, taken)| !**taken)
                .map(|(n, _)| *n)
                .collect();
            for spread in distributions(&leftovers, &sites) {
                let mut f = base.clone();
                f.sites.extend(spread);
                out.push(f);
            }
        }
        out
    }

    fn assign(&self, wanted: &[NodeId], offered: &[NodeId], memo: &mut Memo) -> Vec<(Fit, Vec<bool>)> {
        let mut slots = Slots {
            wanted,
            offered,
            used: vec![false; offered.len()],
            out: Vec::new(),
        };
        self.fill_slot(&mut slots, 0, Fit::default(), memo);
        slots.out
    }

    fn fill_slot(&self, slots: &mut Slots<'_>, i: usize, acc: Fit, memo: &mut Memo) {
        if i == slots.wanted.len() {
            slots.out.push((acc, slots.used.clone()));
            return;
        }
        let offered = slots.offered;
        for (j, candidate) in offered.iter().enumerate() {
            if slots.used[j] {
                continue;
            }
            let fits = self.node_fits(slots.wanted[i], *candidate, memo);
            if fits.is_empty() {
                continue;
            }
            slots.used[j] = true;
            for f in &fits {
                self.fill_slot(slots, i + 1, acc.merged(f), memo);
            }
            slots.used[j] = false;
        }
    }

    /// Link matching and construction of context and parameters.
    fn finish(&self, chosen: &[(Parent, Fit)]) -> Option<BigraphMatch> {
        let agent = self.agent;
        let redex = self.redex;

        let mut node_image = vec![NodeId(0); redex.node_count()];
        let mut role: FxHashMap<NodeId, Role> = FxHashMap::default();
        let mut tops: Vec<Vec<NodeId>> = vec![Vec::new(); redex.site_count()];
        for (_, fit) in chosen {
            for (u, v) in &fit.pairs {
                node_image[*u] = *v;
                role.insert(*v, Role::Image(*u));
            }
            for (s, roots) in &fit.sites {
                tops[*s].clone_from(roots);
                for top in roots {
                    for n in agent.subtree(*top) {
                        role.insert(n, Role::Param);
                    }
                }
            }
        }

        let mut link_image: BTreeMap<Link, Link> = BTreeMap::new();
        for u in redex.nodes() {
            for (i, k) in redex.ports_of(u).iter().enumerate() {
                let l = agent.ports_of(node_image[u.index()])[i];
                if *link_image.entry(*k).or_insert(l) != l {
                    trace!(?k, "redex link maps to two agent links");
                    return None;
                }
            }
        }

        let mut closed: FxHashSet<Link> = FxHashSet::default();
        for e in redex.edges() {
            let k = Link::Edge(e);
            let Some(l) = link_image.get(&k).copied() else {
                continue;
            };
            if !matches!(l, Link::Edge(_)) || !closed.insert(l) {
                return None;
            }
            let has_inner = redex.points_of(k).iter().any(|p| matches!(p, Point::Inner(_)));
            for point in agent.points_of(l) {
                let allowed = match point {
                    Point::Port(n, i) => match role.get(n) {
                        Some(Role::Image(u)) => redex.ports_of(NodeId(*u))[*i] == k,
                        Some(Role::Param) => has_inner,
                        None => false,
                    },
                    Point::Inner(_) => false,
                };
                if !allowed {
                    trace!(?k, ?l, "redex edge image escapes the occurrence");
                    return None;
                }
            }
        }

        let mut via_inner: BTreeMap<Link, String> = BTreeMap::new();
        for (name, k) in redex.inner_names() {
            if let Some(l) = link_image.get(&k) {
                via_inner.entry(*l).or_insert_with(|| name.to_owned());
            }
        }

        let mut shared: Vec<(Link, String)> = Vec::new();
        let mut shared_index: FxHashMap<Link, usize> = FxHashMap::default();
        let mut counter = 0usize;
        for roots in &tops {
            for top in roots {
                for n in agent.subtree(*top) {
                    for l in agent.ports_of(n) {
                        if via_inner.contains_key(l) || shared_index.contains_key(l) {
                            continue;
                        }
                        if closed.contains(l) {
                            return None;
                        }
                        let name = loop {
                            let candidate = format!("z{counter}");
                            counter += 1;
                            if !self.reserved.contains(&candidate) {
                                break candidate;
                            }
                        };
                        shared_index.insert(*l, shared.len());
                        shared.push((*l, name));
                    }
                }
            }
        }

        let context = self.build_context(chosen, &role, &link_image, &closed, &shared);
        let parameters = tops
            .iter()
            .map(|roots| self.build_parameter(roots, &via_inner, &shared, &shared_index))
            .collect();

        let mut image_sorted = node_image.clone();
        image_sorted.sort_unstable();
        let key = MatchKey {
            anchors: chosen.iter().map(|(a, _)| *a).collect(),
            image: image_sorted,
            parameters: tops
                .into_iter()
                .map(|mut t| {
                    t.sort_unstable();
                    t
                })
                .collect(),
            names: (0..redex.outer_names().len())
                .map(|o| link_image.get(&Link::Outer(o)).copied())
                .collect(),
        };

        Some(BigraphMatch {
            key,
            node_image,
            link_image,
            context,
            parameters,
            shared_names: shared.into_iter().map(|(_, n)| n).collect(),
        })
    }

    fn build_context(
        &self,
        chosen: &[(Parent, Fit)],
        role: &FxHashMap<NodeId, Role>,
        link_image: &BTreeMap<Link, Link>,
        closed: &FxHashSet<Link>,
        shared: &[(Link, String)],
    ) -> Bigraph {
        let agent = self.agent;
        let kept: Vec<NodeId> = agent.nodes().filter(|n| !role.contains_key(n)).collect();
        let local: FxHashMap<NodeId, usize> = kept.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        let map_parent = |p: Parent| match p {
            Parent::Root(r) => Parent::Root(r),
            Parent::Node(n) => Parent::Node(NodeId(local[&n])),
        };

        let mut edge_map: FxHashMap<EdgeId, usize> = FxHashMap::default();
        let mut edges = 0usize;
        for e in agent.edges() {
            if !closed.contains(&Link::Edge(e)) {
                edge_map.insert(e, edges);
                edges += 1;
            }
        }
        let map_link = |l: Link| match l {
            Link::Edge(e) => Link::Edge(EdgeId(edge_map[&e])),
            outer @ Link::Outer(_) => outer,
        };

        let nodes = kept
            .iter()
            .map(|n| NodeData {
                control: agent.control_id_of(*n),
                parent: map_parent(agent.parent_of(Place::Node(*n))),
                ports: agent.ports_of(*n).iter().map(|l| map_link(*l)).collect(),
            })
            .collect();
        let site_parents = chosen.iter().map(|(a, _)| map_parent(*a)).collect();

        let mut inner_names = Vec::new();
        for (o, name) in self.redex.outer_names().iter().enumerate() {
            let link = if let Some(l) = link_image.get(&Link::Outer(o)) {
                map_link(*l)
            } else {
                edges += 1;
                Link::Edge(EdgeId(edges - 1))
            };
            inner_names.push((name.clone(), link));
        }
        for (l, name) in shared {
            inner_names.push((name.clone(), map_link(*l)));
        }

        Bigraph::assemble(RawBigraph {
            signature: Arc::clone(agent.signature()),
            roots: agent.root_count(),
            nodes,
            site_parents,
            edges,
            outer_names: agent.outer_names().to_vec(),
            inner_names,
        })
    }

    fn build_parameter(
        &self,
        roots: &[NodeId],
        via_inner: &BTreeMap<Link, String>,
        shared: &[(Link, String)],
        shared_index: &FxHashMap<Link, usize>,
    ) -> Bigraph {
        let agent = self.agent;
        let members: Vec<NodeId> = roots.iter().flat_map(|r| agent.subtree(*r)).collect();
        let local: FxHashMap<NodeId, usize> =
            members.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        let mut outer_names: Vec<String> = Vec::new();
        let mut name_link = |l: Link| {
            let name = via_inner
                .get(&l)
                .or_else(|| shared_index.get(&l).map(|i| &shared[*i].1))
                .cloned()
                .unwrap_or_default();
            match outer_names.iter().position(|n| *n == name) {
                Some(i) => Link::Outer(i),
                None => {
                    outer_names.push(name);
                    Link::Outer(outer_names.len() - 1)
                }
            }
        };

        let mut nodes = Vec::with_capacity(members.len());
        for n in &members {
            let parent = match agent.parent_of(Place::Node(*n)) {
                Parent::Node(p) if local.contains_key(&p) => Parent::Node(NodeId(local[&p])),
                _ => Parent::Root(0),
            };
            nodes.push(NodeData {
                control: agent.control_id_of(*n),
                parent,
                ports: agent.ports_of(*n).iter().map(|l| name_link(*l)).collect(),
            });
        }

        Bigraph::assemble(RawBigraph {
            signature: Arc::clone(agent.signature()),
            roots: 1,
            nodes,
            site_parents: Vec::new(),
            edges: 0,
            outer_names,
            inner_names: Vec::new(),
        })
    }
}

/// Every way of spreading `leftovers` over `sites`, first leftover varying slowest.
fn distributions(leftovers: &[NodeId], sites: &[usize]) -> Vec<Vec<(usize, Vec<NodeId>)>> {
    let k = sites.len();
    let mut digits = vec![0usize; leftovers.len()];
    let mut out = Vec::new();
    loop {
        let mut buckets: Vec<Vec<NodeId>> = vec![Vec::new(); k];
        for (i, d) in digits.iter().enumerate() {
            buckets[*d].push(leftovers[i]);
        }
        out.push(sites.iter().copied().zip(buckets).collect());

        let mut pos = digits.len();
        loop {
            if pos == 0 {
                return out;
            }
            pos -= 1;
            digits[pos] += 1;
            if digits[pos] < k {
                break;
            }
            digits[pos] = 0;
        }
    }
}

/// Lazy match sequence produced one anchor at a time.
#[derive(Debug)]
pub struct Matches<'m, 'a> {
    matcher: &'m Matcher<'a>,
    anchors: Vec<Parent>,
    next_anchor: usize,
    buffer: VecDeque<BigraphMatch>,
    seen: FxHashSet<MatchKey>,
}

impl Iterator for Matches<'_, '_> {
    type Item = BigraphMatch;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            while let Some(m) = self.buffer.pop_front() {
                if self.seen.insert(m.key.clone()) {
                    return Some(m);
                }
            }
            let anchor = *self.anchors.get(self.next_anchor)?;
            self.next_anchor += 1;
            self.buffer.extend(self.matcher.matches_at(anchor));
        }
    }
}
