//! Square occupancy grid over the whole map.

use ix_core::{Point2, ZoneId};

/// Uniform grid of square cells covering `[-extent, extent]²`, centred on
/// the box centre.
///
/// Zone ids are row-major: `row * cols + col`, row 0 at the south edge.
/// Points outside the grid clamp to the nearest border cell so a vehicle on
/// the map always has a zone.
#[derive(Clone, Debug)]
pub struct ZoneGrid {
    origin:    Point2,
    cell_size: f32,
    cols:      u32,
}

impl ZoneGrid {
    pub fn new(extent: f32, cell_size: f32) -> Self {
        let cols = ((2.0 * extent) / cell_size).ceil().max(1.0) as u32;
        let half = 0.5 * cols as f32 * cell_size;
        Self {
            origin: Point2::new(-half, -half),
            cell_size,
            cols,
        }
    }

    #[inline]
    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Number of cells in the grid.
    #[inline]
    pub fn len(&self) -> usize {
        (self.cols as usize) * (self.cols as usize)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cols == 0
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Zone containing `p`.
    pub fn zone_of(&self, p: Point2) -> ZoneId {
        let max = (self.cols - 1) as f32;
        let col = ((p.x - self.origin.x) / self.cell_size).floor().clamp(0.0, max) as u32;
        let row = ((p.y - self.origin.y) / self.cell_size).floor().clamp(0.0, max) as u32;
        ZoneId(row * self.cols + col)
    }

    /// Centre of zone `z`.
    pub fn center_of(&self, z: ZoneId) -> Point2 {
        let row = z.0 / self.cols;
        let col = z.0 % self.cols;
        Point2::new(
            self.origin.x + (col as f32 + 0.5) * self.cell_size,
            self.origin.y + (row as f32 + 0.5) * self.cell_size,
        )
    }
}
