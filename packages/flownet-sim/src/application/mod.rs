//! Application layer: the simulation service façade

pub mod service;
