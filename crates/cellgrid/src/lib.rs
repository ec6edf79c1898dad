//! # Cellgrid
//!
//! Uniform-cell broad-phase index for 2D collision candidate lookups.
//!
//! Cellgrid maps axis-aligned bounding boxes onto a grid of fixed-size square
//! cells. A box is registered in every cell it overlaps, so a query only has
//! to visit the cells its region touches to find every possible overlap:
//!
//! - **O(n) rebuild**: the grid is cleared and repopulated from current
//!   positions each tick, so membership can never drift from position
//! - **O(k) queries**: candidate lookups scale with local density, not with
//!   the total population
//! - **No boundary misses**: shapes straddling a cell edge appear in all
//!   overlapped cells
//!
//! ## Quick Start
//!
//! ```
//! use cellgrid::{Aabb, CellGrid, GridConfig};
//! use glam::Vec2;
//!
//! let mut grid = CellGrid::new(GridConfig { cell_size: 16.0 }).unwrap();
//!
//! grid.rebuild([
//!     (0, Aabb::from_center_half_extent(Vec2::new(8.0, 8.0), Vec2::splat(4.0))),
//!     (1, Aabb::from_center_half_extent(Vec2::new(200.0, 8.0), Vec2::splat(4.0))),
//! ]);
//!
//! let near_origin = grid.query(&Aabb::from_center_half_extent(Vec2::ZERO, Vec2::splat(10.0)));
//! assert_eq!(near_origin, vec![0]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod grid;
pub mod stats;

// Re-exports for convenience
pub use grid::{CellGrid, GridConfig, GridError};
pub use stats::OccupancyStats;

/// 2D axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Aabb {
    /// Minimum corner
    pub min: glam::Vec2,
    /// Maximum corner
    pub max: glam::Vec2,
}

impl Aabb {
    /// Create a box from min/max corners.
    #[must_use]
    pub fn from_min_max(min: glam::Vec2, max: glam::Vec2) -> Self {
        Self { min, max }
    }

    /// Create a box from a center point and half extents.
    #[must_use]
    pub fn from_center_half_extent(center: glam::Vec2, half_extent: glam::Vec2) -> Self {
        Self {
            min: center - half_extent,
            max: center + half_extent,
        }
    }

    /// Get the center of the box.
    #[must_use]
    pub fn center(&self) -> glam::Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Get the size of the box.
    #[must_use]
    pub fn size(&self) -> glam::Vec2 {
        self.max - self.min
    }

    /// Check if a point is inside the box.
    #[must_use]
    pub fn contains(&self, point: glam::Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Check if this box intersects another (touching edges count).
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::from_center_half_extent(glam::Vec2::ZERO, glam::Vec2::splat(0.5))
    }
}
