//! Common test utilities for cloudgov-core

#![allow(dead_code)]

pub mod fixtures;
pub mod helpers;
pub mod mocks;

pub use fixtures::*;
pub use helpers::*;
pub use mocks::*;
