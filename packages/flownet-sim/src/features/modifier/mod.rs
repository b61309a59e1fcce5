//! Structural modification algebra
//!
//! A `Modification` is a typed edit against a graph; `apply_modifications`
//! plays a sequence of them onto a deep clone, leaving the input untouched.
//! Update modifications whose target is absent are silently ignored so that
//! speculative what-if requests never fail on a stale key.

mod apply;

pub use apply::apply_modifications;

use crate::shared::models::EdgeKey;
use serde::{Deserialize, Serialize};

/// Kind of structural edit
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ModificationKind {
    UpdateEdge,
    RemoveEdge,
    AddEdge,
    UpdateNode,
    RemoveNode,
    /// Zero the capacity of every incident edge but keep topology
    DisableNode,
}

/// Numeric attribute a modification acts on
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ModificationTarget {
    Capacity,
    Cost,
    Length,
    Supply,
    Demand,
}

/// How the targeted value changes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ValueChange {
    /// Replace with `v`
    Absolute(f64),
    /// Multiply by `m`
    Relative(f64),
    /// Add `d`
    Delta(f64),
}

impl ValueChange {
    pub fn apply(&self, current: f64) -> f64 {
        match self {
            ValueChange::Absolute(v) => *v,
            ValueChange::Relative(m) => current * m,
            ValueChange::Delta(d) => current + d,
        }
    }
}

/// Which element a modification addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModificationKey {
    Edge(EdgeKey),
    Node(i64),
}

/// One typed edit in a modification sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    pub kind: ModificationKind,
    pub target: ModificationTarget,
    /// Missing change means "no value change" (relevant for Add/Disable)
    pub change: Option<ValueChange>,
    pub key: ModificationKey,
}

impl Modification {
    pub fn update_edge(from: i64, to: i64, target: ModificationTarget, change: ValueChange) -> Self {
        Self {
            kind: ModificationKind::UpdateEdge,
            target,
            change: Some(change),
            key: ModificationKey::Edge(EdgeKey::new(from, to)),
        }
    }

    pub fn remove_edge(from: i64, to: i64) -> Self {
        Self {
            kind: ModificationKind::RemoveEdge,
            target: ModificationTarget::Capacity,
            change: None,
            key: ModificationKey::Edge(EdgeKey::new(from, to)),
        }
    }

    pub fn add_edge(from: i64, to: i64, capacity: ValueChange) -> Self {
        Self {
            kind: ModificationKind::AddEdge,
            target: ModificationTarget::Capacity,
            change: Some(capacity),
            key: ModificationKey::Edge(EdgeKey::new(from, to)),
        }
    }

    pub fn update_node(id: i64, target: ModificationTarget, change: ValueChange) -> Self {
        Self {
            kind: ModificationKind::UpdateNode,
            target,
            change: Some(change),
            key: ModificationKey::Node(id),
        }
    }

    pub fn remove_node(id: i64) -> Self {
        Self {
            kind: ModificationKind::RemoveNode,
            target: ModificationTarget::Capacity,
            change: None,
            key: ModificationKey::Node(id),
        }
    }

    pub fn disable_node(id: i64) -> Self {
        Self {
            kind: ModificationKind::DisableNode,
            target: ModificationTarget::Capacity,
            change: None,
            key: ModificationKey::Node(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_change_apply() {
        assert_eq!(ValueChange::Absolute(20.0).apply(50.0), 20.0);
        assert_eq!(ValueChange::Relative(1.5).apply(50.0), 75.0);
        assert_eq!(ValueChange::Delta(-10.0).apply(50.0), 40.0);
    }

    #[test]
    fn test_modification_json_roundtrip() {
        let m = Modification::update_edge(1, 2, ModificationTarget::Capacity, ValueChange::Absolute(20.0));
        let json = serde_json::to_string(&m).unwrap();
        let back: Modification = serde_json::from_str(&json).unwrap();
        assert_eq!(m, back);
    }
}
