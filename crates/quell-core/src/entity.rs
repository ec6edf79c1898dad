//! Entity types for the remediation arena.
//!
//! This module provides the core entity vocabulary:
//! - [`EntityId`]: Generation-tagged arena handle
//! - [`EntityKind`]: Resource or access-grant classification
//! - [`EntityState`]: The lifecycle state machine's states
//! - [`EntityFlags`]: Orthogonal boolean markers (protection, restoration)
//! - [`Entity`]: The fixed-shape entity record
//! - [`EntitySpec`]: The supply-interface record consumed at session load
//!
//! # Identity
//!
//! An `EntityId` is an arena slot index plus the slot's generation at spawn
//! time. Removing an entity bumps the slot generation, so any handle still
//! referencing the old occupant (an in-flight remediation result, a cached
//! grid index) fails the generation check instead of silently touching a
//! reused slot.

use bitflags::bitflags;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::fmt;

use cellgrid::Aabb;

use crate::remediation::RemediationTarget;

/// Generation-tagged handle to an entity slot.
///
/// Stable and unique for the entity's lifetime: the same slot reused for a
/// later entity carries a higher generation, so the two handles never
/// compare equal.
///
/// # Example
///
/// ```
/// use quell_core::entity::EntityId;
///
/// let first = EntityId::new(3, 0);
/// let reused = EntityId::new(3, 1);
///
/// assert_eq!(first.index(), reused.index());
/// assert_ne!(first, reused);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId {
    index: u32,
    generation: u32,
}

impl EntityId {
    /// Creates a handle from a slot index and generation.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the arena slot index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the slot generation this handle was issued for.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Classification of a remediable entity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// An external resource (storage bucket, host, workload).
    Resource,
    /// An access grant (credential, role binding, share link).
    AccessGrant,
}

impl EntityKind {
    /// Health cap for this kind. Health never exceeds it.
    #[must_use]
    pub const fn max_health(self) -> u32 {
        match self {
            Self::Resource => 3,
            Self::AccessGrant => 5,
        }
    }

    /// Default bounding half extents for this kind.
    #[must_use]
    pub const fn half_extent(self) -> Vec2 {
        match self {
            Self::Resource => Vec2::splat(8.0),
            Self::AccessGrant => Vec2::splat(6.0),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource => write!(f, "Resource"),
            Self::AccessGrant => write!(f, "AccessGrant"),
        }
    }
}

/// Lifecycle state of an entity.
///
/// Transitions (owned by the lifecycle manager):
/// `Active` → `PendingRemediation` on health-zero elimination, then either
/// → `Removed` (terminal, remediation succeeded) or back → `Active`
/// (remediation failed in direct mode, health restored).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityState {
    /// In play: visible, collidable, targetable (unless protected).
    Active,
    /// Eliminated; a remediation request is in flight. Not targetable, so at
    /// most one request per entity can ever be outstanding.
    PendingRemediation,
    /// Terminal. The slot is released; the entity never reappears.
    Removed,
}

bitflags! {
    /// Boolean markers orthogonal to [`EntityState`].
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityFlags: u8 {
        /// Set at creation, never cleared. Protected entities take no damage
        /// and never leave `Active` through the elimination path.
        const PROTECTED = 1 << 0;
        /// The entity came back from a failed direct-mode remediation at
        /// least once.
        const RESTORED = 1 << 1;
    }
}

/// A remediable entity record.
///
/// Records live in the arena, which is their sole owner; every other
/// component (the grid, in-flight requests) refers to them by [`EntityId`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Arena handle, assigned at spawn.
    pub id: EntityId,
    /// Resource or access grant.
    pub kind: EntityKind,
    /// Backend identifier used when this entity is remediated.
    pub target: RemediationTarget,
    /// World position (center of the bounding box).
    pub position: Vec2,
    /// Bounding half extents.
    pub half_extent: Vec2,
    /// Remaining health, capped at `kind.max_health()`.
    pub health: u32,
    /// Lifecycle state.
    pub state: EntityState,
    /// Orthogonal markers.
    pub flags: EntityFlags,
}

impl Entity {
    /// Current bounding box.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_center_half_extent(self.position, self.half_extent)
    }

    /// Returns true if the entity is permanently protected.
    #[must_use]
    pub fn is_protected(&self) -> bool {
        self.flags.contains(EntityFlags::PROTECTED)
    }

    /// Returns true if projectiles may damage this entity right now.
    ///
    /// Excludes protected entities, anything outside `Active`, and entities
    /// whose health already reached zero this tick (their elimination event
    /// is queued; a second hit must not fire another).
    #[must_use]
    pub fn is_targetable(&self) -> bool {
        self.state == EntityState::Active && !self.is_protected() && self.health > 0
    }
}

/// Supply-interface record: one entity to create at session load.
///
/// Provided by the external level/session loader; the core never fetches or
/// generates this data itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpec {
    /// Backend identifier of the resource this entity represents.
    pub target: RemediationTarget,
    /// Resource or access grant.
    pub kind: EntityKind,
    /// Initial world position.
    pub position: Vec2,
    /// Whether the entity is created protected.
    pub protected: bool,
}

impl EntitySpec {
    /// Convenience constructor for an unprotected entity.
    #[must_use]
    pub fn new(target: impl Into<RemediationTarget>, kind: EntityKind, position: Vec2) -> Self {
        Self {
            target: target.into(),
            kind,
            position,
            protected: false,
        }
    }

    /// Marks the spec as protected.
    #[must_use]
    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }
}
