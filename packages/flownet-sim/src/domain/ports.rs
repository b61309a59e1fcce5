/*
 * Domain Ports - Interfaces for external dependencies
 *
 * HEXAGONAL ARCHITECTURE:
 * - Domain defines interfaces
 * - Infrastructure implements them (RPC client in production,
 *   scripted fakes in tests)
 */

use crate::errors::Result;
use crate::shared::cancel::CancelToken;
use crate::shared::models::{FlowAlgorithm, FlowGraph, SolveOptions, SolveResult};

/// Port: max-flow / min-cost-flow solver (driven port)
///
/// The solver is an opaque collaborator reached over RPC. Calls may block;
/// engines treat them as suspendable I/O and check the cancellation token
/// before each call. The graph handed in always has `current_flow` reset
/// to zero (see `SolverAdapter`).
pub trait FlowSolver: Send + Sync {
    fn solve(
        &self,
        cancel: &CancelToken,
        graph: &FlowGraph,
        algorithm: FlowAlgorithm,
        options: &SolveOptions,
    ) -> Result<SolveResult>;
}
