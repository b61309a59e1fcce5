//! Canonical graph fingerprint
//!
//! A deterministic content hash identifying a graph up to the
//! canonicalization rules: node/edge input order is irrelevant, floats are
//! formatted to six decimals. Values differing only below that precision
//! intentionally collide; they are considered equivalent graphs.

use crate::shared::models::{FlowAlgorithm, FlowGraph, SolveOptions};
use sha2::{Digest, Sha256};

/// 128-bit graph content hash, rendered as 32 lowercase hex chars
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct GraphFingerprint(String);

impl GraphFingerprint {
    /// Compute the fingerprint of a graph
    pub fn compute(graph: &FlowGraph) -> Self {
        Self(digest128(&canonical_encoding(graph)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GraphFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Build the canonical byte sequence the fingerprint hashes
fn canonical_encoding(graph: &FlowGraph) -> String {
    let mut buf = String::with_capacity(32 + graph.nodes.len() * 12 + graph.edges.len() * 40);
    buf.push_str(&format!("s:{},t:{};", graph.source_id, graph.sink_id));

    let mut node_ids: Vec<(i64, i64)> = graph
        .nodes
        .iter()
        .map(|n| (n.id, n.node_type.as_i64()))
        .collect();
    node_ids.sort_unstable();
    for (id, type_int) in node_ids {
        buf.push_str(&format!("n:{}:{};", id, type_int));
    }

    let mut edges: Vec<(i64, i64, f64, f64)> = graph
        .edges
        .iter()
        .map(|e| (e.from, e.to, e.capacity, e.cost))
        .collect();
    edges.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
    for (from, to, capacity, cost) in edges {
        buf.push_str(&format!("e:{}:{}:{:.6}:{:.6};", from, to, capacity, cost));
    }

    buf
}

/// SHA-256 truncated to 128 bits, lowercase hex
fn digest128(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest[..16].iter().map(|b| format!("{:02x}", b)).collect()
}

/// Cache key for a solver invocation
///
/// `"solve:{algorithm}:{fingerprint}"`, salted with an options hash when
/// the options deviate from the default.
pub fn solve_cache_key(
    algorithm: FlowAlgorithm,
    fingerprint: &GraphFingerprint,
    options: &SolveOptions,
) -> String {
    if options.is_default() {
        format!("solve:{}:{}", algorithm.as_str(), fingerprint)
    } else {
        format!(
            "solve:{}:{}:{}",
            algorithm.as_str(),
            fingerprint,
            digest128(&options.canonical_string())
        )
    }
}
