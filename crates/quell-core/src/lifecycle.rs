//! Entity lifecycle state machine.
//!
//! The lifecycle manager owns every transition between [`EntityState`]
//! values and, with it, the correctness property the remediation pipeline
//! depends on: an entity in `PendingRemediation` is not targetable, so at
//! most one remediation request per entity is ever in flight.
//!
//! Elimination events are produced by the collision resolver into a queue
//! and drained here once per tick — state mutation stays confined to a
//! single, deterministic point in the tick instead of interleaving with
//! collision scanning. Remediation outcomes arrive from the background
//! worker and are applied the same way; anything stale (wrong session
//! generation, unknown entity, wrong state) is logged and discarded, never
//! a panic, because it indicates a cancelled or superseded result rather
//! than a caller bug.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::arena::EntityArena;
use crate::entity::{EntityFlags, EntityId, EntityKind, EntityState};
use crate::remediation::{RemediationOutcome, RemediationTarget};
use crate::session::SessionGeneration;

/// An entity's health reached zero this tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EliminationEvent {
    /// The eliminated entity.
    pub entity: EntityId,
    /// Its kind.
    pub kind: EntityKind,
    /// Its remediation target identifier.
    pub target: RemediationTarget,
}

/// Owner of the Active / PendingRemediation / Removed state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityLifecycleManager {
    /// Health granted back when a direct-mode remediation fails. Clamped to
    /// at least 1 and at most the entity's kind cap, so a restored entity is
    /// always visible and attackable again.
    restore_health: u32,
}

impl EntityLifecycleManager {
    /// Creates a manager that restores failed entities to `restore_health`.
    #[must_use]
    pub fn new(restore_health: u32) -> Self {
        Self { restore_health }
    }

    /// Locks an eliminated entity for remediation:
    /// `Active` → `PendingRemediation`.
    ///
    /// Returns false (and changes nothing) unless the entity is live,
    /// unprotected, `Active`, and at zero health — the resolver should only
    /// emit elimination events for exactly that shape, so anything else is
    /// an invariant violation worth logging.
    pub fn mark_pending(&self, arena: &mut EntityArena, id: EntityId) -> bool {
        let Some(entity) = arena.get_mut(id) else {
            warn!(%id, "elimination for unknown entity discarded");
            return false;
        };
        if entity.is_protected() {
            warn!(%id, "elimination for protected entity discarded");
            return false;
        }
        if entity.state != EntityState::Active || entity.health != 0 {
            warn!(
                %id,
                state = ?entity.state,
                health = entity.health,
                "elimination in unexpected state discarded"
            );
            return false;
        }
        entity.state = EntityState::PendingRemediation;
        debug!(%id, target_id = %entity.target, "entity pending remediation");
        true
    }

    /// Speculatively removes an eliminated entity (deferred mode):
    /// `Active` → `Removed`, slot freed.
    ///
    /// The player sees the entity disappear immediately; whether the
    /// deferred remediation later succeeds does not bring it back.
    pub fn remove_speculative(&self, arena: &mut EntityArena, id: EntityId) -> bool {
        let Some(entity) = arena.get_mut(id) else {
            warn!(%id, "speculative removal for unknown entity discarded");
            return false;
        };
        if entity.is_protected() || entity.state != EntityState::Active || entity.health != 0 {
            warn!(%id, state = ?entity.state, "speculative removal in unexpected state discarded");
            return false;
        }
        entity.state = EntityState::Removed;
        arena.remove(id);
        debug!(%id, "entity speculatively removed");
        true
    }

    /// Applies a settled remediation outcome as a state transition.
    ///
    /// Success: `PendingRemediation` → `Removed` (terminal, slot freed).
    /// Failure: `PendingRemediation` → `Active` with health restored to a
    /// nonzero value and the `RESTORED` flag set.
    ///
    /// Returns true if the outcome was applied. Stale outcomes — wrong
    /// session generation, handle no longer live, entity not pending — are
    /// discarded with a warning.
    pub fn apply_outcome(
        &self,
        arena: &mut EntityArena,
        outcome: &RemediationOutcome,
        active_generation: SessionGeneration,
    ) -> bool {
        if outcome.generation != active_generation {
            warn!(
                entity = %outcome.entity,
                outcome_generation = %outcome.generation,
                %active_generation,
                "stale-session remediation outcome discarded"
            );
            return false;
        }
        let Some(entity) = arena.get_mut(outcome.entity) else {
            warn!(entity = %outcome.entity, "remediation outcome for missing entity discarded");
            return false;
        };
        if entity.state != EntityState::PendingRemediation {
            warn!(
                entity = %outcome.entity,
                state = ?entity.state,
                "remediation outcome for non-pending entity discarded"
            );
            return false;
        }

        if outcome.state.is_success() {
            entity.state = EntityState::Removed;
            arena.remove(outcome.entity);
            debug!(entity = %outcome.entity, "remediation succeeded, entity removed");
        } else {
            entity.state = EntityState::Active;
            entity.health = self.restore_health.clamp(1, entity.kind.max_health());
            entity.flags.insert(EntityFlags::RESTORED);
            debug!(
                entity = %outcome.entity,
                health = entity.health,
                "remediation failed, entity restored"
            );
        }
        true
    }
}

impl Default for EntityLifecycleManager {
    fn default() -> Self {
        Self::new(1)
    }
}
