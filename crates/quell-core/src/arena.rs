//! Arena module: the single owner of all entity records.
//!
//! The arena is a stable-index slot store. Spawning fills a free slot (or
//! grows the backing vector); removal empties the slot, bumps its
//! generation, and pushes the index onto a free list. Nothing ever shifts,
//! so the `u32` indices the spatial grid holds stay valid for the tick they
//! were issued in, and any handle that outlives its entity is caught by the
//! generation check rather than silently reading a reused slot.
//!
//! # Ownership
//!
//! Entity records live here and nowhere else. The spatial grid stores bare
//! slot indices; remediation requests store [`EntityId`] handles. Both are
//! resolved through the arena, which is mutated only by the simulation
//! thread.
//!
//! # Example
//!
//! ```
//! use quell_core::arena::EntityArena;
//! use quell_core::entity::{EntityKind, EntitySpec};
//! use glam::Vec2;
//!
//! let mut arena = EntityArena::new();
//! let id = arena.spawn(EntitySpec::new(
//!     "bucket/public-read",
//!     EntityKind::Resource,
//!     Vec2::new(100.0, 200.0),
//! ));
//!
//! assert!(arena.get(id).is_some());
//! let removed = arena.remove(id).unwrap();
//! assert_eq!(removed.id, id);
//! assert!(arena.get(id).is_none());
//! ```

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityFlags, EntityId, EntitySpec, EntityState};

/// One arena slot: its current generation and, when live, its occupant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Slot {
    generation: u32,
    entity: Option<Entity>,
}

/// Stable-index arena owning every entity record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl EntityArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns an entity from a supply-interface spec.
    ///
    /// The entity starts `Active` at its kind's full health; the `PROTECTED`
    /// flag is fixed at spawn and never changes afterwards.
    pub fn spawn(&mut self, spec: EntitySpec) -> EntityId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entity: None,
                });
                u32::try_from(self.slots.len() - 1).expect("arena exceeded u32::MAX slots")
            }
        };

        let slot = &mut self.slots[index as usize];
        let id = EntityId::new(index, slot.generation);
        let flags = if spec.protected {
            EntityFlags::PROTECTED
        } else {
            EntityFlags::empty()
        };
        slot.entity = Some(Entity {
            id,
            kind: spec.kind,
            target: spec.target,
            position: spec.position,
            half_extent: spec.kind.half_extent(),
            health: spec.kind.max_health(),
            state: EntityState::Active,
            flags,
        });
        self.live += 1;
        id
    }

    /// Removes an entity, freeing its slot.
    ///
    /// The slot generation is bumped so every outstanding handle to the
    /// removed entity becomes stale. Returns `None` if the handle was
    /// already stale or the slot is empty.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() || slot.entity.is_none() {
            return None;
        }
        let entity = slot.entity.take();
        slot.generation += 1;
        self.free.push(id.index());
        self.live -= 1;
        entity
    }

    /// Returns the entity for a handle, if it is still live.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        let slot = self.slots.get(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.entity.as_ref()
    }

    /// Returns the entity for a handle mutably, if it is still live.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.entity.as_mut()
    }

    /// Returns the entity occupying a bare slot index, if any.
    ///
    /// Used to resolve grid query results: the grid is rebuilt from live
    /// entities every tick, so within a tick an index it returns is either
    /// live or (if removed mid-tick) empty — never a different entity.
    #[must_use]
    pub fn by_index(&self, index: u32) -> Option<&Entity> {
        self.slots.get(index as usize)?.entity.as_ref()
    }

    /// Mutable variant of [`by_index`](Self::by_index).
    pub fn by_index_mut(&mut self, index: u32) -> Option<&mut Entity> {
        self.slots.get_mut(index as usize)?.entity.as_mut()
    }

    /// Returns true if the handle refers to a live entity.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    /// Iterates live entities in slot-index order (deterministic).
    pub fn iter(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.slots.iter().filter_map(|slot| slot.entity.as_ref())
    }

    /// Mutable variant of [`iter`](Self::iter).
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> + '_ {
        self.slots
            .iter_mut()
            .filter_map(|slot| slot.entity.as_mut())
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns true if no entity is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Bulk discard of all entities (session teardown).
    ///
    /// No remediation side effects. Generations are bumped on occupied slots
    /// so handles from the discarded session go stale.
    pub fn clear(&mut self) {
        self.free.clear();
        // Reverse push order so pops hand out low indices first, matching a
        // fresh arena's layout.
        for (index, slot) in self.slots.iter_mut().enumerate().rev() {
            if slot.entity.take().is_some() {
                slot.generation += 1;
            }
            self.free
                .push(u32::try_from(index).expect("arena exceeded u32::MAX slots"));
        }
        self.live = 0;
    }
}
