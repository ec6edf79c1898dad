//! Session identity and remediation accounting.
//!
//! A session is one loaded level/run. Remediation runs in the background, so
//! a result can outlive the session that issued it; every dispatched job is
//! stamped with the session's generation and the lifecycle manager discards
//! results whose generation no longer matches the active session.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::remediation::RequestState;

/// Monotonically increasing session counter.
///
/// Bumped on every session load and teardown. A remediation outcome tagged
/// with a stale generation belongs to a session that no longer exists and
/// must not touch the current arena.
///
/// # Example
///
/// ```
/// use quell_core::session::SessionGeneration;
///
/// let first = SessionGeneration::default();
/// let second = first.next();
/// assert!(first != second);
/// assert_eq!(second.as_u64(), 1);
/// ```
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SessionGeneration(u64);

impl SessionGeneration {
    /// Creates a generation from a raw counter value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next generation.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SessionGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Counts of remediation attempts for end-of-session reporting.
///
/// Shared by direct-mode end-of-level reporting and deferred-mode batch
/// flush reporting (both modes feed the same counters).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Total remediation calls that ran to completion (success or failure).
    pub attempted: u32,
    /// Calls that succeeded.
    pub succeeded: u32,
    /// Calls that failed (transient-exhausted or permanent).
    pub failed: u32,
}

impl SessionSummary {
    /// Records one completed remediation.
    pub fn record(&mut self, state: RequestState) {
        self.attempted += 1;
        if state.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    /// Folds another summary into this one.
    pub fn merge(&mut self, other: Self) {
        self.attempted += other.attempted;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
    }
}
