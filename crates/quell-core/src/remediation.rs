//! The external remediation contract and the background pipeline behind it.
//!
//! Eliminating an entity triggers a remote "remediate this resource" call.
//! That call must never stall the fixed-rate simulation loop, so it runs on
//! a small bounded worker pool: the loop hands jobs over a channel, workers
//! run the retry/backoff policy against the [`RemediationClient`], and
//! outcomes travel back over a second channel to be applied as state
//! transitions at the start of a later tick.
//!
//! # Error taxonomy
//!
//! [`RemediationError`] distinguishes transient kinds (timeout, rate limit,
//! unreachable backend) from permanent kinds (target missing, authorization
//! denied). The retry policy consumes that distinction as data: transient
//! errors are retried with exponential backoff, permanent errors fail the
//! request immediately, and exhausting the retry budget escalates a
//! transient failure into a final one.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::entity::{EntityId, EntityKind};
use crate::session::SessionGeneration;

/// Default number of worker threads, which bounds how many direct-mode
/// remediation calls can be in flight at once.
pub const DEFAULT_WORKER_THREADS: usize = 4;

// =============================================================================
// Contract types
// =============================================================================

/// Opaque identifier of the resource to remediate, as understood by the
/// external backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemediationTarget(String);

impl RemediationTarget {
    /// Creates a target identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemediationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RemediationTarget {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for RemediationTarget {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Failure kinds reported by a remediation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RemediationError {
    /// The call did not complete within its timeout (transient).
    #[error("remediation call timed out")]
    Timeout,
    /// The backend rejected the call due to rate limiting (transient).
    #[error("remediation backend rate limited the call")]
    RateLimited,
    /// The backend could not be reached (transient).
    #[error("remediation backend unreachable")]
    Unreachable,
    /// The target does not exist on the backend (permanent).
    #[error("remediation target not found")]
    NotFound,
    /// The caller is not authorized to remediate the target (permanent).
    #[error("not authorized to remediate target")]
    Unauthorized,
}

impl RemediationError {
    /// Returns true if the error is worth retrying.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::Timeout | Self::RateLimited | Self::Unreachable)
    }
}

/// Final state of a remediation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestState {
    /// Not yet attempted (or still in flight).
    Pending,
    /// The backend confirmed the remediation.
    Succeeded,
    /// Every attempt failed with a transient error; the retry budget is
    /// exhausted.
    FailedTransient,
    /// The backend reported a permanent error.
    FailedPermanent,
}

impl RequestState {
    /// Returns true for [`RequestState::Succeeded`].
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Returns true for either failure state.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::FailedTransient | Self::FailedPermanent)
    }
}

/// One remediation request, as handed to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationRequest {
    /// The eliminated entity this request settles.
    pub entity: EntityId,
    /// Kind of the entity (backends may route on it).
    pub kind: EntityKind,
    /// Backend identifier of the resource.
    pub target: RemediationTarget,
    /// Retries performed so far (0 on first attempt).
    pub retry_count: u32,
    /// Per-call deadline. Implementations must return
    /// [`RemediationError::Timeout`] rather than block past it.
    pub timeout: Duration,
}

/// Contract implemented by an external remediation backend.
///
/// # Idempotency
///
/// `remediate` must be safe to call more than once for the same target. The
/// pipeline's PENDING lock already prevents duplicate calls for a live
/// entity; idempotency is defense in depth for retries racing a slow
/// success, not a substitute for that lock.
///
/// # Timeouts
///
/// Implementations own their transport and therefore their cancellation:
/// a call that exceeds `request.timeout` must return
/// [`RemediationError::Timeout`] (transient) instead of blocking the worker.
pub trait RemediationClient: Send + Sync {
    /// Attempts to remediate the requested target.
    ///
    /// # Errors
    ///
    /// Returns a [`RemediationError`] whose kind tells the retry policy
    /// whether another attempt is worthwhile.
    fn remediate(&self, request: &RemediationRequest) -> Result<(), RemediationError>;
}

// =============================================================================
// Retry policy
// =============================================================================

/// Exponential backoff schedule for transient failures.
///
/// Attempt `i` (0-based) that fails transiently waits
/// `base_delay * multiplier^i`, capped at `max_delay`, before the next
/// attempt. Permanent errors never retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts before a transient failure becomes final.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Growth factor applied per attempt.
    pub multiplier: f32,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Per-call deadline stamped onto each request.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
            call_timeout: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay after the given 0-based failed attempt.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.base_delay.as_secs_f32() * self.multiplier.powi(exponent);
        Duration::from_secs_f32(scaled.min(self.max_delay.as_secs_f32()))
    }
}

/// Runs a request against the client under the retry policy, blocking the
/// calling thread through backoff sleeps.
///
/// On return, `request.retry_count` holds the number of retries performed
/// (0 if the first attempt settled the request).
pub fn run_with_retry(
    client: &dyn RemediationClient,
    request: &mut RemediationRequest,
    policy: &RetryPolicy,
) -> RequestState {
    let attempts = policy.max_attempts.max(1);
    for attempt in 0..attempts {
        request.retry_count = attempt;
        match client.remediate(request) {
            Ok(()) => return RequestState::Succeeded,
            Err(err) if err.is_transient() => {
                if attempt + 1 < attempts {
                    let delay = policy.delay_for(attempt);
                    debug!(
                        target_id = %request.target,
                        attempt,
                        ?delay,
                        %err,
                        "transient remediation failure, backing off"
                    );
                    thread::sleep(delay);
                }
            }
            Err(err) => {
                warn!(target_id = %request.target, %err, "permanent remediation failure");
                return RequestState::FailedPermanent;
            }
        }
    }
    warn!(
        target_id = %request.target,
        attempts,
        "remediation retry budget exhausted"
    );
    RequestState::FailedTransient
}

// =============================================================================
// Background worker pool
// =============================================================================

/// Settled result of a background remediation, delivered to the simulation
/// loop at the start of a later tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationOutcome {
    /// The entity the originating request belonged to.
    pub entity: EntityId,
    /// Kind of that entity.
    pub kind: EntityKind,
    /// Backend identifier that was remediated.
    pub target: RemediationTarget,
    /// Generation of the session that dispatched the job. Outcomes with a
    /// stale generation are discarded on arrival.
    pub generation: SessionGeneration,
    /// Final request state.
    pub state: RequestState,
    /// Retries performed before settling.
    pub retry_count: u32,
}

struct RemediationJob {
    request: RemediationRequest,
    generation: SessionGeneration,
}

/// Bounded pool of background threads running remediation calls.
///
/// The pool size bounds direct-mode concurrency; jobs beyond it queue on the
/// channel. Dropping the worker closes the job channel and joins the
/// threads (in-flight calls finish first).
pub struct RemediationWorker {
    jobs: Option<Sender<RemediationJob>>,
    outcomes: Receiver<RemediationOutcome>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl fmt::Debug for RemediationWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemediationWorker")
            .field("threads", &self.handles.len())
            .finish_non_exhaustive()
    }
}

impl RemediationWorker {
    /// Spawns a pool of `threads` workers (at least one) sharing the job
    /// channel.
    #[must_use]
    pub fn spawn(
        client: Arc<dyn RemediationClient>,
        policy: RetryPolicy,
        threads: usize,
    ) -> Self {
        let (job_tx, job_rx) = unbounded::<RemediationJob>();
        let (outcome_tx, outcome_rx) = unbounded::<RemediationOutcome>();

        let handles = (0..threads.max(1))
            .map(|_| {
                let job_rx = job_rx.clone();
                let outcome_tx = outcome_tx.clone();
                let client = Arc::clone(&client);
                let policy = policy.clone();
                thread::spawn(move || {
                    while let Ok(job) = job_rx.recv() {
                        let RemediationJob {
                            mut request,
                            generation,
                        } = job;
                        let state = run_with_retry(client.as_ref(), &mut request, &policy);
                        let outcome = RemediationOutcome {
                            entity: request.entity,
                            kind: request.kind,
                            target: request.target,
                            generation,
                            state,
                            retry_count: request.retry_count,
                        };
                        if outcome_tx.send(outcome).is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();

        Self {
            jobs: Some(job_tx),
            outcomes: outcome_rx,
            handles,
        }
    }

    /// Hands a request to the pool without blocking.
    pub fn dispatch(&self, request: RemediationRequest, generation: SessionGeneration) {
        let job = RemediationJob {
            request,
            generation,
        };
        match &self.jobs {
            Some(jobs) => {
                if jobs.send(job).is_err() {
                    warn!("remediation worker pool is gone, dropping job");
                }
            }
            None => warn!("remediation worker pool already shut down, dropping job"),
        }
    }

    /// Collects every outcome that has settled since the last drain.
    ///
    /// Never blocks; intended to run at the start of each tick.
    #[must_use]
    pub fn drain_outcomes(&self) -> Vec<RemediationOutcome> {
        self.outcomes.try_iter().collect()
    }
}

impl Drop for RemediationWorker {
    fn drop(&mut self) {
        // Closing the job channel lets workers drain and exit.
        self.jobs.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
