//! The uniform-cell grid itself.
//!
//! Cells are fixed-size squares addressed by integer coordinates obtained by
//! floor-dividing world positions by the cell size. Each occupied cell holds
//! the indices of every box that overlaps it, so neighborhood lookups never
//! miss a shape that straddles a cell boundary.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::stats::OccupancyStats;
use crate::Aabb;

/// Integer coordinates of a grid cell.
pub type CellCoord = (i32, i32);

/// Configuration for a [`CellGrid`].
///
/// The cell size should be close to the typical diameter of the indexed
/// shapes. It is a design constant: expected occupancy per cell stays small
/// and bounded regardless of how many shapes are indexed, which is what makes
/// the per-tick cost O(n) instead of O(n²) pairwise testing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Side length of a square cell, in world units. Must be positive.
    pub cell_size: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { cell_size: 16.0 }
    }
}

/// Errors from grid construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    /// The configured cell size was zero, negative, or not finite.
    #[error("cell size must be positive and finite, got {0}")]
    InvalidCellSize(f32),
}

/// Uniform-cell broad-phase index over 2D bounding boxes.
///
/// The grid stores `u32` indices, never the shapes themselves; the caller
/// owns the indexed records and presents `(index, Aabb)` pairs to
/// [`rebuild`](CellGrid::rebuild) each tick. Rebuilding from scratch every
/// tick keeps membership and position structurally consistent: an index
/// appears in the grid if and only if it was presented to the last rebuild.
///
/// # Example
///
/// ```
/// use cellgrid::{Aabb, CellGrid, GridConfig};
/// use glam::Vec2;
///
/// let mut grid = CellGrid::new(GridConfig { cell_size: 10.0 }).unwrap();
/// // A box straddling the x = 10 cell boundary registers in both cells.
/// grid.rebuild([(7, Aabb::from_center_half_extent(Vec2::new(10.0, 5.0), Vec2::splat(2.0)))]);
///
/// let left = grid.query(&Aabb::from_min_max(Vec2::ZERO, Vec2::new(9.0, 9.0)));
/// let right = grid.query(&Aabb::from_min_max(Vec2::new(11.0, 0.0), Vec2::new(19.0, 9.0)));
/// assert_eq!(left, vec![7]);
/// assert_eq!(right, vec![7]);
/// ```
///
/// The grid itself is deliberately not serializable: it is derived state,
/// rebuilt from entity positions every tick, so a snapshot carries the
/// [`GridConfig`] and rebuilds instead.
#[derive(Debug, Clone)]
pub struct CellGrid {
    cell_size: f32,
    cells: HashMap<CellCoord, Vec<u32>>,
    entries: usize,
}

impl CellGrid {
    /// Creates an empty grid with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidCellSize`] if the cell size is not a
    /// positive, finite number.
    pub fn new(config: GridConfig) -> Result<Self, GridError> {
        if !(config.cell_size.is_finite() && config.cell_size > 0.0) {
            return Err(GridError::InvalidCellSize(config.cell_size));
        }
        Ok(Self {
            cell_size: config.cell_size,
            cells: HashMap::new(),
            entries: 0,
        })
    }

    /// Returns the configured cell size.
    #[must_use]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Clears all cell memberships.
    ///
    /// Occupied cell buckets keep their allocations so the following rebuild
    /// does not reallocate.
    pub fn clear(&mut self) {
        for bucket in self.cells.values_mut() {
            bucket.clear();
        }
        self.entries = 0;
    }

    /// Clears the grid and reinserts every presented box.
    ///
    /// This is the once-per-tick entry point: O(n) in the number of boxes,
    /// amortized, since per-box cell counts are bounded by the cell-size
    /// design constant.
    pub fn rebuild<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = (u32, Aabb)>,
    {
        self.clear();
        for (index, bounds) in items {
            self.insert(index, &bounds);
        }
        trace!(
            entries = self.entries,
            cells = self.occupied_cells(),
            "grid rebuilt"
        );
    }

    /// Registers a box in every cell it overlaps.
    pub fn insert(&mut self, index: u32, bounds: &Aabb) {
        let ((min_x, min_y), (max_x, max_y)) = self.cell_range(bounds);
        for cx in min_x..=max_x {
            for cy in min_y..=max_y {
                self.cells.entry((cx, cy)).or_default().push(index);
                self.entries += 1;
            }
        }
    }

    /// Returns the indices of all boxes that may overlap the query region.
    ///
    /// Scans only the cells the region overlaps, so the cost is O(k) in the
    /// local density, independent of the total number of indexed boxes.
    /// Since every box is registered in all of its overlapped cells, this
    /// visits each candidate without a separate neighbor pass. The result is
    /// sorted and deduplicated for deterministic downstream iteration.
    #[must_use]
    pub fn query(&self, region: &Aabb) -> Vec<u32> {
        let ((min_x, min_y), (max_x, max_y)) = self.cell_range(region);
        let mut result = Vec::new();
        for cx in min_x..=max_x {
            for cy in min_y..=max_y {
                if let Some(bucket) = self.cells.get(&(cx, cy)) {
                    result.extend_from_slice(bucket);
                }
            }
        }
        result.sort_unstable();
        result.dedup();
        result
    }

    /// Returns the cell containing the given point.
    #[must_use]
    pub fn cell_of(&self, point: glam::Vec2) -> CellCoord {
        (
            (point.x / self.cell_size).floor() as i32,
            (point.y / self.cell_size).floor() as i32,
        )
    }

    /// Number of cells with at least one registration.
    #[must_use]
    pub fn occupied_cells(&self) -> usize {
        self.cells.values().filter(|b| !b.is_empty()).count()
    }

    /// Total number of (index, cell) registrations.
    ///
    /// A box overlapping several cells counts once per cell.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Returns true if no box is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Computes the occupancy summary for the current grid contents.
    #[must_use]
    pub fn occupancy(&self) -> OccupancyStats {
        OccupancyStats::from_buckets(self.cells.values().map(Vec::len).filter(|&n| n > 0))
    }

    /// Inclusive range of cell coordinates overlapped by a box.
    fn cell_range(&self, bounds: &Aabb) -> (CellCoord, CellCoord) {
        (self.cell_of(bounds.min), self.cell_of(bounds.max))
    }
}

impl Default for CellGrid {
    fn default() -> Self {
        Self {
            cell_size: GridConfig::default().cell_size,
            cells: HashMap::new(),
            entries: 0,
        }
    }
}
