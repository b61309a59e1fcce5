//! Vertical feature slices
//!
//! Each slice owns its models and engine; the service façade in
//! `application` wires them together.

pub mod cache;
pub mod failures;
pub mod modifier;
pub mod monte_carlo;
pub mod scenarios;
pub mod sensitivity;
pub mod solver;
pub mod time_sim;
pub mod whatif;
