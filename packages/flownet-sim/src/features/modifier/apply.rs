//! Modification application
//!
//! Works on index maps (`(from, to)` -> edge slot, node id -> node slot)
//! that are rebuilt after every removal, so a sequence mixing removals and
//! updates always addresses the current topology.

use super::{Modification, ModificationKey, ModificationKind, ModificationTarget, ValueChange};
use crate::shared::models::{EdgeKey, FlowEdge, FlowGraph};
use std::collections::HashMap;

struct GraphIndex {
    edges: HashMap<EdgeKey, usize>,
    nodes: HashMap<i64, usize>,
}

impl GraphIndex {
    fn build(graph: &FlowGraph) -> Self {
        let mut edges = HashMap::with_capacity(graph.edges.len());
        for (i, edge) in graph.edges.iter().enumerate() {
            // Last edge on a (from, to) pair wins
            edges.insert(edge.key(), i);
        }
        let mut nodes = HashMap::with_capacity(graph.nodes.len());
        for (i, node) in graph.nodes.iter().enumerate() {
            nodes.insert(node.id, i);
        }
        Self { edges, nodes }
    }
}

/// Apply `mods` in order to a deep clone of `graph`
///
/// The input graph is never mutated. Update modifications addressing a
/// missing edge or node are ignored.
pub fn apply_modifications(graph: &FlowGraph, mods: &[Modification]) -> FlowGraph {
    let mut out = graph.clone();
    let mut index = GraphIndex::build(&out);

    for m in mods {
        match m.kind {
            ModificationKind::UpdateEdge => {
                if let ModificationKey::Edge(key) = m.key {
                    if let Some(&slot) = index.edges.get(&key) {
                        apply_edge_change(&mut out.edges[slot], m.target, m.change);
                    }
                }
            }
            ModificationKind::RemoveEdge => {
                if let ModificationKey::Edge(key) = m.key {
                    if let Some(&slot) = index.edges.get(&key) {
                        out.edges.remove(slot);
                        index = GraphIndex::build(&out);
                    }
                }
            }
            ModificationKind::AddEdge => {
                if let ModificationKey::Edge(key) = m.key {
                    let capacity = m.change.map_or(0.0, |c| c.apply(0.0));
                    let edge = FlowEdge::new(key.from, key.to, capacity, 0.0);
                    match index.edges.get(&key) {
                        // Replacing keeps the (from, to) pair unique
                        Some(&slot) => out.edges[slot] = edge,
                        None => {
                            out.edges.push(edge);
                            index.edges.insert(key, out.edges.len() - 1);
                        }
                    }
                }
            }
            ModificationKind::UpdateNode => {
                if let ModificationKey::Node(id) = m.key {
                    if let Some(&slot) = index.nodes.get(&id) {
                        apply_node_change(&mut out.nodes[slot], m.target, m.change);
                    }
                }
            }
            ModificationKind::RemoveNode => {
                if let ModificationKey::Node(id) = m.key {
                    if index.nodes.contains_key(&id) {
                        out.nodes.retain(|n| n.id != id);
                        out.edges.retain(|e| e.from != id && e.to != id);
                        index = GraphIndex::build(&out);
                    }
                }
            }
            ModificationKind::DisableNode => {
                if let ModificationKey::Node(id) = m.key {
                    for edge in &mut out.edges {
                        if edge.from == id || edge.to == id {
                            edge.capacity = 0.0;
                        }
                    }
                }
            }
        }
    }

    out
}

fn apply_edge_change(edge: &mut FlowEdge, target: ModificationTarget, change: Option<ValueChange>) {
    let Some(change) = change else { return };
    match target {
        ModificationTarget::Capacity => edge.capacity = change.apply(edge.capacity),
        ModificationTarget::Cost => edge.cost = change.apply(edge.cost),
        ModificationTarget::Length => edge.length = change.apply(edge.length),
        // Supply/demand are node attributes; ignore on edges
        ModificationTarget::Supply | ModificationTarget::Demand => {}
    }
}

fn apply_node_change(
    node: &mut crate::shared::models::FlowNode,
    target: ModificationTarget,
    change: Option<ValueChange>,
) {
    let Some(change) = change else { return };
    match target {
        ModificationTarget::Supply => node.supply = change.apply(node.supply),
        ModificationTarget::Demand => node.demand = change.apply(node.demand),
        ModificationTarget::Capacity | ModificationTarget::Cost | ModificationTarget::Length => {}
    }
}
