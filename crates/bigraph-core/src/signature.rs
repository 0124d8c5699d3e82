// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Controls and signatures.
//!
//! A [`Signature`] is the immutable vocabulary every bigraph is built against.
//! Controls are stored sorted by name, so two signatures declaring the same
//! controls in a different order hand out identical [`ControlId`]s and share
//! the same digest.
use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

/// Characters that would make control names ambiguous inside canonical keys.
const RESERVED: &[char] = &['[', ']', '(', ')', '{', '}', '$', ',', ':', ';', '"', '|', '#'];

/// Activity status of a control.
///
/// Reactions only take place inside contexts whose nodes are all
/// [`ControlStatus::Active`]; atomic controls never have children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ControlStatus {
    /// Reactions may occur inside nodes of this control.
    Active,
    /// Nodes may have children but no reaction occurs inside them.
    Passive,
    /// Nodes may never have children.
    Atomic,
}

impl ControlStatus {
    const fn tag(self) -> u8 {
        match self {
            Self::Active => 0,
            Self::Passive => 1,
            Self::Atomic => 2,
        }
    }
}

/// A node kind: name, number of ports and activity status.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Control {
    name: String,
    arity: usize,
    status: ControlStatus,
}

impl Control {
    /// Name of the control, unique within its signature.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of ports carried by every node of this control.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Activity status.
    pub fn status(&self) -> ControlStatus {
        self.status
    }

    /// Returns `true` when nodes of this control may not have children.
    pub fn is_atomic(&self) -> bool {
        self.status == ControlStatus::Atomic
    }

    /// Returns `true` when reactions may occur inside nodes of this control.
    pub fn is_active(&self) -> bool {
        self.status == ControlStatus::Active
    }
}

/// Index of a control inside its [`Signature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlId(pub(crate) usize);

impl ControlId {
    /// Position of the control in the signature's name-sorted table.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Errors raised while declaring a signature.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// Two controls share a name.
    #[error("duplicate control: {0}")]
    DuplicateControl(String),
    /// The name is empty or contains whitespace or reserved punctuation.
    #[error("invalid control name: {0:?}")]
    InvalidControlName(String),
}

/// Immutable set of controls with unique names.
#[derive(Debug, Clone)]
pub struct Signature {
    controls: Vec<Control>,
    by_name: BTreeMap<String, ControlId>,
    digest: [u8; 32],
}

impl Signature {
    /// Starts a new signature declaration.
    pub fn builder() -> SignatureBuilder {
        SignatureBuilder::default()
    }

    /// Looks up a control by name.
    pub fn control_id(&self, name: &str) -> Option<ControlId> {
        self.by_name.get(name).copied()
    }

    /// Returns the control stored under `id`.
    ///
    /// `id` must come from this signature (or a compatible one).
    pub fn control(&self, id: ControlId) -> &Control {
        &self.controls[id.0]
    }

    /// Looks up a control by name.
    pub fn get(&self, name: &str) -> Option<&Control> {
        self.control_id(name).map(|id| self.control(id))
    }

    /// Controls in name order.
    pub fn controls(&self) -> impl Iterator<Item = &Control> + '_ {
        self.controls.iter()
    }

    /// Number of controls.
    pub fn len(&self) -> usize {
        self.controls.len()
    }

    /// Returns `true` when the signature declares no controls.
    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// Content digest over every control (name, arity, status).
    pub fn digest(&self) -> [u8; 32] {
        self.digest
    }

    /// Two signatures are compatible when they are the same value or declare
    /// exactly the same controls.
    pub fn is_compatible(self: &Arc<Self>, other: &Arc<Self>) -> bool {
        Arc::ptr_eq(self, other) || self.digest == other.digest
    }
}

/// Collects controls and freezes them into a shared [`Signature`].
#[derive(Debug, Default)]
pub struct SignatureBuilder {
    controls: BTreeMap<String, Control>,
    error: Option<SignatureError>,
}

impl SignatureBuilder {
    /// Declares a control. The first invalid declaration is reported by [`SignatureBuilder::build`].
    pub fn add_control(mut self, name: &str, arity: usize, status: ControlStatus) -> Self {
        if self.error.is_some() {
            return self;
        }
        if name.is_empty() || name.chars().any(|c| c.is_whitespace() || RESERVED.contains(&c)) {
            self.error = Some(SignatureError::InvalidControlName(name.to_owned()));
            return self;
        }
        if self.controls.contains_key(name) {
            self.error = Some(SignatureError::DuplicateControl(name.to_owned()));
            return self;
        }
        self.controls.insert(
            name.to_owned(),
            Control {
                name: name.to_owned(),
                arity,
                status,
            },
        );
        self
    }

    /// Shorthand for an [`ControlStatus::Active`] control.
    pub fn active(self, name: &str, arity: usize) -> Self {
        self.add_control(name, arity, ControlStatus::Active)
    }

    /// Shorthand for a [`ControlStatus::Passive`] control.
    pub fn passive(self, name: &str, arity: usize) -> Self {
        self.add_control(name, arity, ControlStatus::Passive)
    }

    /// Shorthand for an [`ControlStatus::Atomic`] control.
    pub fn atomic(self, name: &str, arity: usize) -> Self {
        self.add_control(name, arity, ControlStatus::Atomic)
    }

    /// Freezes the declaration.
    pub fn build(self) -> Result<Arc<Signature>, SignatureError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"bigraph:signature:v1");
        let mut controls = Vec::with_capacity(self.controls.len());
        let mut by_name = BTreeMap::new();
        for (name, control) in self.controls {
            hasher.update(&(name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
            hasher.update(&(control.arity as u64).to_le_bytes());
            hasher.update(&[control.status.tag()]);
            by_name.insert(name, ControlId(controls.len()));
            controls.push(control);
        }
        Ok(Arc::new(Signature {
            controls,
            by_name,
            digest: hasher.finalize().into(),
        }))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn declaration_order_does_not_change_identity() {
        let a = Signature::builder()
            .active("Room", 1)
            .atomic("Agent", 0)
            .build()
            .unwrap();
        let b = Signature::builder()
            .atomic("Agent", 0)
            .active("Room", 1)
            .build()
            .unwrap();
        assert!(a.is_compatible(&b));
        assert_eq!(a.control_id("Room"), b.control_id("Room"));
    }

    #[test]
    fn arity_change_breaks_compatibility() {
        let a = Signature::builder().active("Room", 1).build().unwrap();
        let b = Signature::builder().active("Room", 2).build().unwrap();
        assert!(!a.is_compatible(&b));
    }

    #[test]
    fn rejects_duplicates_and_reserved_names() {
        let dup = Signature::builder().active("A", 0).passive("A", 1).build();
        assert_eq!(dup.unwrap_err(), SignatureError::DuplicateControl("A".into()));
        let bad = Signature::builder().active("A(B)", 0).build();
        assert!(matches!(bad, Err(SignatureError::InvalidControlName(_))));
    }
}
