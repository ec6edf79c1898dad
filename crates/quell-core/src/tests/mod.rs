//! Crate-level test module for integration and property tests.
//!
//! - `integration.rs`: End-to-end scenarios through the full tick pipeline
//! - `properties.rs`: Statistical and structural properties (density bounds,
//!   round trips, state-machine invariants)
//! - `helpers.rs`: Entity/projectile factories and scripted backend stubs

mod helpers;
mod integration;

// Re-export for convenience
pub use helpers::*;
