//! Collision resolver: broad phase through the grid, narrow phase on AABBs.
//!
//! For each live projectile the resolver queries the grid for the cells its
//! bounding box overlaps, orders the candidates by distance from the
//! projectile, and runs axis-aligned box tests against each targetable
//! candidate. Hits apply damage (saturating at zero); a health that crosses
//! to zero emits exactly one [`EliminationEvent`] into the returned queue,
//! which the lifecycle manager drains once per tick.
//!
//! # Hit ordering
//!
//! A non-piercing projectile is consumed by its first hit, so candidate
//! order cannot change the outcome beyond which entity takes the hit. For
//! piercing projectiles order is observable, so candidates are sorted by
//! squared distance from the projectile position (slot index breaks ties):
//! multi-hit resolution is deterministic and independent of cell-map
//! iteration order.

use cellgrid::CellGrid;

use crate::arena::EntityArena;
use crate::lifecycle::EliminationEvent;
use crate::projectile::Projectile;

/// Resolver for projectile/entity collisions.
#[derive(Debug, Clone, Default)]
pub struct CollisionResolver;

impl CollisionResolver {
    /// Creates a new collision resolver.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Resolves one tick of collisions.
    ///
    /// The grid must have been rebuilt from the arena's live entities this
    /// tick. Consumed projectiles are skipped; projectiles that hit while
    /// non-piercing are marked consumed. Returns the elimination events in
    /// the order they occurred.
    #[must_use]
    pub fn resolve(
        &self,
        projectiles: &mut [Projectile],
        arena: &mut EntityArena,
        grid: &CellGrid,
    ) -> Vec<EliminationEvent> {
        let mut events = Vec::new();

        for projectile in projectiles.iter_mut().filter(|p| !p.consumed) {
            let region = projectile.bounds();
            let mut candidates: Vec<(f32, u32)> = grid
                .query(&region)
                .into_iter()
                .filter_map(|index| {
                    let entity = arena.by_index(index)?;
                    Some((
                        entity.position.distance_squared(projectile.position),
                        index,
                    ))
                })
                .collect();
            candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

            for (_, index) in candidates {
                let Some(entity) = arena.by_index_mut(index) else {
                    continue;
                };
                if !entity.is_targetable() || !region.intersects(&entity.bounds()) {
                    continue;
                }

                entity.health = entity.health.saturating_sub(projectile.damage);
                if entity.health == 0 {
                    events.push(EliminationEvent {
                        entity: entity.id,
                        kind: entity.kind,
                        target: entity.target.clone(),
                    });
                }

                if !projectile.piercing {
                    projectile.consumed = true;
                    break;
                }
            }
        }

        events
    }
}
