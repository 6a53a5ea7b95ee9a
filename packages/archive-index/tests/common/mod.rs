//! Common test utilities for archive-index
//!
//! Fixtures for manifest records and on-disk stores, plus assertions shared
//! by the integration suites.

#![allow(dead_code)]

mod assertions;
mod fixtures;

// Re-export all utilities
pub use assertions::*;
pub use fixtures::*;
