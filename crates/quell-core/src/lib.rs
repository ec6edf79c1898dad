//! # Quell Core
//!
//! Remediation arena core simulation for Quell.
//!
//! Quell renders an organization's risky resources as targets in a
//! fixed-rate arcade simulation: shooting a target eliminates it, and each
//! elimination drives a real remediation call against an external backend.
//! This crate is the core of that loop — the spatial collision engine and
//! the remediation pipeline on top of it.
//!
//! ## Architecture
//!
//! - **Arena** ([`arena`]): stable-index slot store, sole owner of entity
//!   records; everything else holds generation-tagged handles
//! - **Grid** ([`cellgrid`], re-exported): uniform-cell broad phase rebuilt
//!   from live positions every tick
//! - **Collision** ([`collision`]): per-projectile candidate queries plus
//!   AABB narrow phase, emitting elimination events
//! - **Lifecycle** ([`lifecycle`]): the Active / PendingRemediation /
//!   Removed state machine and its at-most-one-in-flight guarantee
//! - **Remediation** ([`remediation`]): the backend contract, retry/backoff
//!   policy, and the bounded worker pool that keeps I/O off the tick loop
//! - **Arcade** ([`arcade`]): deferred-mode queue flushed in rate-limited
//!   batches at session end
//! - **Simulation** ([`simulation`]): the fixed-step driver tying the
//!   phases together
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use quell_core::{EntitySpec, EntityKind, Projectile, Simulation, SimulationConfig};
//!
//! let mut sim = Simulation::new(SimulationConfig::default(), Arc::new(backend))?;
//! sim.load_session(inventory.into_iter().map(|record| record.into_spec()));
//!
//! loop {
//!     sim.spawn_projectile(input.fire());
//!     sim.step();
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export cellgrid for spatial queries
pub use cellgrid;

pub mod arcade;
pub mod arena;
pub mod collision;
pub mod entity;
pub mod lifecycle;
pub mod projectile;
pub mod remediation;
pub mod session;
pub mod simulation;

// Re-exports for convenience
pub use arcade::{ArcadeBatchQueue, ArcadeConfig, ArcadeQueueEntry, ArcadeReport, EntryOutcome};
pub use arena::EntityArena;
pub use cellgrid::{Aabb, CellGrid, GridConfig, GridError};
pub use collision::CollisionResolver;
pub use entity::{Entity, EntityFlags, EntityId, EntityKind, EntitySpec, EntityState};
pub use lifecycle::{EliminationEvent, EntityLifecycleManager};
pub use projectile::Projectile;
pub use remediation::{
    RemediationClient, RemediationError, RemediationOutcome, RemediationRequest,
    RemediationTarget, RemediationWorker, RequestState, RetryPolicy,
};
pub use session::{SessionGeneration, SessionSummary};
pub use simulation::{
    RemediationMode, SessionReport, Simulation, SimulationConfig, FIXED_DT,
};

#[cfg(test)]
mod tests;
