//! Simulation module with the fixed-step tick loop.
//!
//! `Simulation` orchestrates one tick as a fixed sequence of phases:
//!
//! 1. **OUTCOMES**: drain settled remediation results from the worker
//!    channel and apply them as state transitions
//! 2. **MOVEMENT**: integrate projectile positions over the fixed timestep
//! 3. **REBUILD**: repopulate the spatial grid from live entity positions
//! 4. **COLLISION**: run the collision resolver, collecting eliminations
//! 5. **LIFECYCLE**: drain elimination events — direct mode locks the
//!    entity and dispatches a background request; deferred mode removes it
//!    speculatively and queues an arcade entry
//! 6. **SWEEP**: discard consumed projectiles, advance the tick counter
//!
//! Everything here runs on one thread. The only concurrency is the
//! remediation worker pool, and it communicates exclusively through the
//! phase-1 channel drain, so entity state is never mutated concurrently
//! with collision resolution.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use cellgrid::{Aabb, CellGrid, GridConfig, GridError};

use crate::arcade::{ArcadeBatchQueue, ArcadeConfig, ArcadeQueueEntry, EntryOutcome};
use crate::arena::EntityArena;
use crate::collision::CollisionResolver;
use crate::entity::{EntityId, EntitySpec};
use crate::lifecycle::EntityLifecycleManager;
use crate::projectile::Projectile;
use crate::remediation::{
    RemediationClient, RemediationRequest, RemediationWorker, RetryPolicy, DEFAULT_WORKER_THREADS,
};
use crate::session::{SessionGeneration, SessionSummary};

/// Fixed timestep for the target 60 Hz tick rate (~16.67ms).
pub const FIXED_DT: f32 = 1.0 / 60.0;

/// How eliminations reach the remediation backend.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemediationMode {
    /// Remediate immediately per elimination; failure restores the entity.
    Direct,
    /// Queue eliminations and flush in batches at session end; removal is
    /// speculative and never rolls back.
    Deferred,
}

/// Tunables for a simulation instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Fixed timestep in seconds.
    pub dt: f32,
    /// Spatial grid cell size (close to the typical entity diameter).
    pub cell_size: f32,
    /// Direct or deferred remediation.
    pub mode: RemediationMode,
    /// Health granted back on failed direct remediation (≥ 1 effective).
    pub restore_health: u32,
    /// Retry/backoff policy for remediation calls.
    pub retry: RetryPolicy,
    /// Deferred-mode flush tunables.
    pub arcade: ArcadeConfig,
    /// Worker pool size; bounds direct-mode in-flight calls.
    pub worker_threads: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt: FIXED_DT,
            cell_size: 16.0,
            mode: RemediationMode::Direct,
            restore_health: 1,
            retry: RetryPolicy::default(),
            arcade: ArcadeConfig::default(),
            worker_threads: DEFAULT_WORKER_THREADS,
        }
    }
}

/// Final report returned by [`Simulation::end_session`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Remediation counts for the whole session (direct results applied
    /// during play plus, in deferred mode, the flush).
    pub summary: SessionSummary,
    /// Per-entry outcomes from the deferred flush (empty in direct mode).
    pub entry_outcomes: Vec<EntryOutcome>,
    /// Batches sent during the deferred flush.
    pub batches: usize,
}

/// The fixed-step simulation driver.
pub struct Simulation {
    config: SimulationConfig,
    client: Arc<dyn RemediationClient>,
    worker: RemediationWorker,
    arena: EntityArena,
    grid: CellGrid,
    projectiles: Vec<Projectile>,
    resolver: CollisionResolver,
    lifecycle: EntityLifecycleManager,
    arcade: ArcadeBatchQueue,
    generation: SessionGeneration,
    summary: SessionSummary,
    tick: u64,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("config", &self.config)
            .field("entities", &self.arena.len())
            .field("projectiles", &self.projectiles.len())
            .field("generation", &self.generation)
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Creates a simulation against the given remediation backend.
    ///
    /// # Errors
    ///
    /// Returns [`GridError`] if the configured cell size is invalid.
    pub fn new(
        config: SimulationConfig,
        client: Arc<dyn RemediationClient>,
    ) -> Result<Self, GridError> {
        let grid = CellGrid::new(GridConfig {
            cell_size: config.cell_size,
        })?;
        let worker = RemediationWorker::spawn(
            Arc::clone(&client),
            config.retry.clone(),
            config.worker_threads,
        );
        let lifecycle = EntityLifecycleManager::new(config.restore_health);
        let arcade = ArcadeBatchQueue::new(config.arcade.clone());

        Ok(Self {
            config,
            client,
            worker,
            arena: EntityArena::new(),
            grid,
            projectiles: Vec::new(),
            resolver: CollisionResolver::new(),
            lifecycle,
            arcade,
            generation: SessionGeneration::default(),
            summary: SessionSummary::default(),
            tick: 0,
        })
    }

    /// Loads a session from supply-interface records.
    ///
    /// Discards any previous session's entities, projectiles, and queue
    /// (bulk discard, no remediation side effects) and bumps the session
    /// generation so in-flight results from the old session are ignored on
    /// arrival.
    pub fn load_session<I>(&mut self, specs: I) -> Vec<EntityId>
    where
        I: IntoIterator<Item = EntitySpec>,
    {
        self.generation = self.generation.next();
        self.arena.clear();
        self.projectiles.clear();
        self.arcade.clear();
        self.grid.clear();
        self.summary = SessionSummary::default();
        self.tick = 0;
        specs.into_iter().map(|spec| self.arena.spawn(spec)).collect()
    }

    /// Executes one simulation tick. Never blocks on remediation I/O.
    pub fn step(&mut self) {
        // PHASE 1: OUTCOMES - apply settled background results
        for outcome in self.worker.drain_outcomes() {
            if self
                .lifecycle
                .apply_outcome(&mut self.arena, &outcome, self.generation)
            {
                self.summary.record(outcome.state);
            }
        }

        // PHASE 2: MOVEMENT - integrate projectiles
        for projectile in self.projectiles.iter_mut().filter(|p| !p.consumed) {
            projectile.advance(self.config.dt);
        }

        // PHASE 3: REBUILD - grid reflects start-of-collision positions
        self.grid
            .rebuild(self.arena.iter().map(|e| (e.id.index(), e.bounds())));

        // PHASE 4: COLLISION
        let events = self
            .resolver
            .resolve(&mut self.projectiles, &mut self.arena, &self.grid);

        // PHASE 5: LIFECYCLE - drain eliminations once, in order
        for event in events {
            match self.config.mode {
                RemediationMode::Direct => {
                    if self.lifecycle.mark_pending(&mut self.arena, event.entity) {
                        let request = RemediationRequest {
                            entity: event.entity,
                            kind: event.kind,
                            target: event.target,
                            retry_count: 0,
                            timeout: self.config.retry.call_timeout,
                        };
                        self.worker.dispatch(request, self.generation);
                    }
                }
                RemediationMode::Deferred => {
                    if self
                        .lifecycle
                        .remove_speculative(&mut self.arena, event.entity)
                    {
                        self.arcade.push(ArcadeQueueEntry {
                            entity: event.entity,
                            kind: event.kind,
                            target: event.target,
                            enqueued_tick: self.tick,
                        });
                    }
                }
            }
        }

        // PHASE 6: SWEEP
        self.projectiles.retain(|p| !p.consumed);
        self.tick += 1;
    }

    /// Fires a projectile into the arena.
    pub fn spawn_projectile(&mut self, projectile: Projectile) {
        self.projectiles.push(projectile);
    }

    /// Ends the session and returns the final report.
    ///
    /// In deferred mode this flushes the arcade queue (blocking through the
    /// rate-limit delays; the tick loop has stopped by now). The session
    /// generation is bumped, so any direct-mode result still in flight is
    /// discarded when it arrives — it belongs to a session that no longer
    /// exists.
    pub fn end_session(&mut self) -> SessionReport {
        let mut report = SessionReport {
            summary: self.summary,
            ..SessionReport::default()
        };
        if self.config.mode == RemediationMode::Deferred && !self.arcade.is_empty() {
            let flushed = self.arcade.flush(self.client.as_ref(), &self.config.retry);
            report.summary.merge(flushed.summary);
            report.entry_outcomes = flushed.outcomes;
            report.batches = flushed.batches;
        }
        self.generation = self.generation.next();
        report
    }

    /// Visibility/culling reuse of the spatial index: ids of live entities
    /// whose last-rebuilt cell membership overlaps the region.
    #[must_use]
    pub fn query_visible(&self, region: &Aabb) -> Vec<EntityId> {
        self.grid
            .query(region)
            .into_iter()
            .filter_map(|index| self.arena.by_index(index).map(|e| e.id))
            .collect()
    }

    /// Read access to the entity arena.
    #[must_use]
    pub fn arena(&self) -> &EntityArena {
        &self.arena
    }

    /// Mutable arena access, for setup and tests.
    ///
    /// Avoid mutating mid-tick; the grid only reflects positions as of the
    /// last rebuild.
    pub fn arena_mut(&mut self) -> &mut EntityArena {
        &mut self.arena
    }

    /// Read access to the spatial grid.
    #[must_use]
    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    /// Projectiles currently in flight.
    #[must_use]
    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// Entries currently queued for the deferred flush.
    #[must_use]
    pub fn arcade_queue(&self) -> &ArcadeBatchQueue {
        &self.arcade
    }

    /// Current tick count (0 before the first step).
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Remediation counts applied so far this session.
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        self.summary
    }

    /// Active session generation.
    #[must_use]
    pub fn generation(&self) -> SessionGeneration {
        self.generation
    }

    /// The configured remediation mode.
    #[must_use]
    pub fn mode(&self) -> RemediationMode {
        self.config.mode
    }
}
