//! Domain Layer - Core types of the Resource Graph access layer
//!
//! Value objects, error taxonomy and the traits through which external
//! collaborators (remote query API, credential resolver) are consumed.

pub mod resource_graph;

pub use resource_graph::*;
