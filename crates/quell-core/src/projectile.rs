//! Player-fired projectiles.
//!
//! Projectiles are plain value types integrated with the simulation's fixed
//! timestep: `position += velocity * dt` each tick. A non-piercing
//! projectile is consumed by its first hit; a piercing one keeps flying and
//! may damage several entities in one tick.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use cellgrid::Aabb;

/// Default bounding half extents for a projectile.
pub const PROJECTILE_HALF_EXTENT: Vec2 = Vec2::splat(2.0);

/// A projectile in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    /// World position (center of the bounding box).
    pub position: Vec2,
    /// Velocity in world units per second.
    pub velocity: Vec2,
    /// Damage applied per hit.
    pub damage: u32,
    /// Bounding half extents for the narrow phase.
    pub half_extent: Vec2,
    /// Continues after a hit instead of being consumed.
    pub piercing: bool,
    /// Set once the projectile has spent itself; consumed projectiles are
    /// discarded at the end of the tick.
    pub consumed: bool,
}

impl Projectile {
    /// Creates a non-piercing projectile.
    #[must_use]
    pub fn new(position: Vec2, velocity: Vec2, damage: u32) -> Self {
        Self {
            position,
            velocity,
            damage,
            half_extent: PROJECTILE_HALF_EXTENT,
            piercing: false,
            consumed: false,
        }
    }

    /// Makes the projectile piercing.
    #[must_use]
    pub fn piercing(mut self) -> Self {
        self.piercing = true;
        self
    }

    /// Integrates position over one fixed timestep.
    pub fn advance(&mut self, dt: f32) {
        self.position += self.velocity * dt;
    }

    /// Current bounding box.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_center_half_extent(self.position, self.half_extent)
    }
}
