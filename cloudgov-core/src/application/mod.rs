//! Application Layer - Services composed from the infrastructure components

pub mod resource_graph;

pub use resource_graph::*;
