//! Occupancy summaries for grid diagnostics.
//!
//! The density-bound that makes the grid O(n) is a design property, not an
//! enforced one; these summaries make it observable so tests and telemetry
//! can confirm per-cell occupancy stays bounded as populations grow.

use serde::{Deserialize, Serialize};

/// Summary of per-cell occupancy after a rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OccupancyStats {
    /// Number of cells with at least one registration.
    pub occupied_cells: usize,
    /// Total registrations across all cells.
    pub total_entries: usize,
    /// Smallest occupancy among occupied cells (0 when the grid is empty).
    pub min: usize,
    /// Largest occupancy among occupied cells.
    pub max: usize,
    /// Mean occupancy among occupied cells.
    pub mean: f32,
}

impl OccupancyStats {
    /// Computes stats from an iterator of per-cell occupancy counts.
    ///
    /// Empty buckets should be filtered out by the caller.
    #[must_use]
    pub fn from_buckets<I>(buckets: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let mut occupied_cells = 0usize;
        let mut total_entries = 0usize;
        let mut min = usize::MAX;
        let mut max = 0usize;

        for count in buckets {
            occupied_cells += 1;
            total_entries += count;
            min = min.min(count);
            max = max.max(count);
        }

        if occupied_cells == 0 {
            return Self::default();
        }

        #[allow(clippy::cast_precision_loss)]
        let mean = total_entries as f32 / occupied_cells as f32;
        Self {
            occupied_cells,
            total_entries,
            min,
            max,
            mean,
        }
    }
}
