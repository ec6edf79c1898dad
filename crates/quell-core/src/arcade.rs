//! Deferred-remediation queue for the timed challenge mode.
//!
//! In the arcade mode an elimination does not call the backend immediately:
//! the entity is speculatively removed from the simulation (the player sees
//! it disappear at once) and an entry is appended here. At session end the
//! queue is flushed in fixed-size batches with an inter-batch delay to
//! respect backend rate limits.
//!
//! Unlike direct mode, a failed entry does **not** restore the entity: the
//! gameplay outcome and the external remediation outcome are allowed to
//! diverge. Direct mode buys strict consistency with restore-on-failure;
//! arcade mode buys immediacy with best-effort eventual consistency. Both
//! sides of that trade-off are load-bearing.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entity::{EntityId, EntityKind};
use crate::remediation::{
    run_with_retry, RemediationClient, RemediationRequest, RemediationTarget, RequestState,
    RetryPolicy,
};
use crate::session::SessionSummary;

/// Tunables for the deferred flush.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcadeConfig {
    /// Entries per batch. Clamped to at least 1 at flush time.
    pub batch_size: usize,
    /// Pause between consecutive batches.
    pub batch_delay: Duration,
}

impl Default for ArcadeConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_delay: Duration::from_millis(500),
        }
    }
}

/// One deferred remediation, captured at elimination time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcadeQueueEntry {
    /// The speculatively removed entity.
    pub entity: EntityId,
    /// Its kind.
    pub kind: EntityKind,
    /// Its remediation target identifier.
    pub target: RemediationTarget,
    /// Simulation tick at which it was eliminated.
    pub enqueued_tick: u64,
}

/// Recorded result of one flushed entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryOutcome {
    /// The entity the entry belonged to.
    pub entity: EntityId,
    /// Its remediation target identifier.
    pub target: RemediationTarget,
    /// Final request state.
    pub state: RequestState,
    /// Retries performed for this entry.
    pub retry_count: u32,
}

/// Result of flushing the queue at session end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArcadeReport {
    /// Per-entry outcomes, in queue order.
    pub outcomes: Vec<EntryOutcome>,
    /// Number of batches sent.
    pub batches: usize,
    /// Aggregate counts over all entries.
    pub summary: SessionSummary,
}

/// Append-only buffer of deferred remediations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArcadeBatchQueue {
    entries: Vec<ArcadeQueueEntry>,
    config: ArcadeConfig,
}

impl ArcadeBatchQueue {
    /// Creates an empty queue with the given flush tunables.
    #[must_use]
    pub fn new(config: ArcadeConfig) -> Self {
        Self {
            entries: Vec::new(),
            config,
        }
    }

    /// Appends an entry. The queue is append-only until flush.
    pub fn push(&mut self, entry: ArcadeQueueEntry) {
        self.entries.push(entry);
    }

    /// Number of queued entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read access to the queued entries.
    #[must_use]
    pub fn entries(&self) -> &[ArcadeQueueEntry] {
        &self.entries
    }

    /// Discards all entries without remediating (session teardown).
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Flushes every entry in rate-limited batches, blocking until done.
    ///
    /// Runs at session end, after the fixed-rate loop has stopped, so the
    /// inter-batch sleeps cannot stall a tick. Each entry's outcome is
    /// recorded independently: a failure in one entry affects neither its
    /// batch mates nor any entity's simulation state.
    pub fn flush(
        &mut self,
        client: &dyn RemediationClient,
        policy: &RetryPolicy,
    ) -> ArcadeReport {
        let entries = std::mem::take(&mut self.entries);
        let batch_size = self.config.batch_size.max(1);

        let mut report = ArcadeReport::default();
        for (batch_index, batch) in entries.chunks(batch_size).enumerate() {
            if batch_index > 0 && !self.config.batch_delay.is_zero() {
                thread::sleep(self.config.batch_delay);
            }
            debug!(batch = batch_index, size = batch.len(), "flushing arcade batch");

            for entry in batch {
                let mut request = RemediationRequest {
                    entity: entry.entity,
                    kind: entry.kind,
                    target: entry.target.clone(),
                    retry_count: 0,
                    timeout: policy.call_timeout,
                };
                let state = run_with_retry(client, &mut request, policy);
                report.summary.record(state);
                report.outcomes.push(EntryOutcome {
                    entity: entry.entity,
                    target: entry.target.clone(),
                    state,
                    retry_count: request.retry_count,
                });
            }
            report.batches += 1;
        }
        report
    }
}
