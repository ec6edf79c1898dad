//! Test helper functions: simulation factories, supply-record builders, and
//! scripted remediation backends.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use glam::Vec2;

use crate::arcade::ArcadeConfig;
use crate::entity::{EntityKind, EntitySpec};
use crate::projectile::Projectile;
use crate::remediation::{
    RemediationClient, RemediationError, RemediationRequest, RetryPolicy,
};
use crate::simulation::{RemediationMode, Simulation, SimulationConfig};

// =============================================================================
// Simulation setup
// =============================================================================

/// Installs a test-writer tracing subscriber (idempotent).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Config with millisecond-scale backoff so retry paths run fast in tests.
pub fn fast_config(mode: RemediationMode) -> SimulationConfig {
    SimulationConfig {
        mode,
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            multiplier: 2.0,
            max_delay: Duration::from_millis(4),
            call_timeout: Duration::from_millis(100),
        },
        arcade: ArcadeConfig {
            batch_size: 10,
            batch_delay: Duration::ZERO,
        },
        worker_threads: 2,
        ..SimulationConfig::default()
    }
}

/// Builds a simulation against the given backend stub.
pub fn sim_with(mode: RemediationMode, client: Arc<dyn RemediationClient>) -> Simulation {
    Simulation::new(fast_config(mode), client).expect("test config is valid")
}

/// Steps the simulation (with a short sleep between steps, so background
/// workers can settle) until the predicate holds. Returns false on timeout.
pub fn step_until(
    sim: &mut Simulation,
    max_steps: usize,
    predicate: impl Fn(&Simulation) -> bool,
) -> bool {
    for _ in 0..max_steps {
        if predicate(sim) {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
        sim.step();
    }
    predicate(sim)
}

// =============================================================================
// Supply-record and projectile factories
// =============================================================================

/// An unprotected resource at the given position.
pub fn resource_spec(target: &str, x: f32, y: f32) -> EntitySpec {
    EntitySpec::new(target, EntityKind::Resource, Vec2::new(x, y))
}

/// A protected access grant at the given position.
pub fn protected_grant_spec(target: &str, x: f32, y: f32) -> EntitySpec {
    EntitySpec::new(target, EntityKind::AccessGrant, Vec2::new(x, y)).protected()
}

/// A stationary projectile parked on the target position.
pub fn shot(x: f32, y: f32, damage: u32) -> Projectile {
    Projectile::new(Vec2::new(x, y), Vec2::ZERO, damage)
}

/// `n` resource specs on a square lattice with the given spacing: local
/// density is constant no matter how large `n` grows.
pub fn lattice_specs(n: usize, spacing: f32) -> Vec<EntitySpec> {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let side = (n as f32).sqrt().ceil() as usize;
    (0..n)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let x = (i % side) as f32 * spacing;
            #[allow(clippy::cast_precision_loss)]
            let y = (i / side) as f32 * spacing;
            resource_spec(&format!("vm/worker-{i:04}"), x, y)
        })
        .collect()
}

// =============================================================================
// Scripted remediation backends
// =============================================================================

/// Backend that always succeeds.
pub struct OkClient;

impl RemediationClient for OkClient {
    fn remediate(&self, _request: &RemediationRequest) -> Result<(), RemediationError> {
        Ok(())
    }
}

/// Backend that always fails with the given error kind.
pub struct FailClient(pub RemediationError);

impl RemediationClient for FailClient {
    fn remediate(&self, _request: &RemediationRequest) -> Result<(), RemediationError> {
        Err(self.0)
    }
}

/// Backend that replays a scripted sequence of results, then succeeds.
pub struct ScriptedClient {
    script: Mutex<VecDeque<Result<(), RemediationError>>>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(script: impl IntoIterator<Item = Result<(), RemediationError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RemediationClient for ScriptedClient {
    fn remediate(&self, _request: &RemediationRequest) -> Result<(), RemediationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

/// Backend that holds every call open until released, making the
/// in-flight window observable from tests.
pub struct GateClient {
    open: AtomicBool,
    calls: AtomicUsize,
}

impl GateClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            open: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    /// Lets all held calls complete successfully.
    pub fn release(&self) {
        self.open.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RemediationClient for GateClient {
    fn remediate(&self, _request: &RemediationRequest) -> Result<(), RemediationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Poll the gate; give up as a timeout if a test forgets to release.
        for _ in 0..2500 {
            if self.open.load(Ordering::SeqCst) {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(2));
        }
        Err(RemediationError::Timeout)
    }
}
