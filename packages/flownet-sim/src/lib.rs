/*
 * Flownet Sim - Scenario Simulation Core
 *
 * Feature-First Hexagonal Architecture:
 * - shared/      : Common models (FlowGraph, FlowNode, FlowEdge, SolveResult)
 * - features/    : Vertical slices (modifier → cache → solver → engines)
 * - application/ : Service façade orchestrating the engines
 * - domain/      : Ports for external collaborators (flow solver)
 *
 * The max-flow / min-cost-flow solver itself is an external collaborator
 * reached over RPC; this crate only defines its port and everything that
 * happens around it: counterfactual modification, result caching keyed by
 * canonical graph fingerprints, stochastic and temporal simulation, and
 * failure analysis.
 */

#![allow(clippy::too_many_arguments)] // Engine entry points carry full request shape
#![allow(clippy::type_complexity)]

pub mod application;
pub mod config;
pub mod domain;
pub mod errors;
pub mod features;
pub mod shared;

pub use application::service::SimulationService;
pub use errors::{Result, SimError, SimErrorKind};
pub use shared::cancel::CancelToken;
pub use shared::models::{
    FlowAlgorithm, FlowEdge, FlowGraph, FlowNode, NodeType, RoadType, SolveOptions, SolveResult,
    SolveStatus,
};
