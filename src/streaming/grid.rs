//! Spatial bucket grid used for proximity queries around the camera

use std::collections::HashMap;

use crate::cell::model::Cell;
use crate::core::types::Vec2;
use crate::layout::positions::bounds_of;

/// Average number of cells a bucket should hold once the grid outgrows its
/// minimum size.
const TARGET_CELLS_PER_BUCKET: f32 = 4.0;

/// Bucket edge, in world units, along an axis where every cell shares one
/// coordinate.
const COLLAPSED_BUCKET_SIZE: f32 = 1.0;

/// Integer bucket coordinate in the LOD grid
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCoord {
    pub x: i32,
    pub y: i32,
}

impl GridCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Mapping from bucket to the cells whose position falls inside it.
///
/// The bounding box of all cell positions is split into `buckets` equal
/// divisions per axis.
#[derive(Clone, Debug, Default)]
pub struct LodGrid {
    buckets: u32,
    min: Vec2,
    extent: Vec2,
    cells: HashMap<GridCoord, Vec<u32>>,
}

impl LodGrid {
    /// Index `cells` by position and record each cell's bucket on the cell.
    pub fn build(cells: &mut [Cell], min_buckets: u32) -> Self {
        let scaled = (cells.len() as f32 / TARGET_CELLS_PER_BUCKET).sqrt().ceil() as u32;
        let buckets = min_buckets.max(scaled).max(1);
        let (min, max) = bounds_of(cells.iter().map(|c| c.position));
        let collapsed = buckets as f32 * COLLAPSED_BUCKET_SIZE;
        let extent = (max - min).to_array().map(|e| if e > f32::EPSILON { e } else { collapsed });

        let mut grid = Self {
            buckets,
            min,
            extent: Vec2::from_array(extent),
            cells: HashMap::new(),
        };
        for cell in cells.iter_mut() {
            let coord = grid.clamped_bucket_of(cell.position.truncate());
            cell.grid = coord;
            grid.cells.entry(coord).or_default().push(cell.index);
        }
        log::debug!(
            "LOD grid: {}x{} buckets, {} occupied, {} cells",
            buckets, buckets, grid.cells.len(), cells.len()
        );
        grid
    }

    /// Buckets per axis
    pub fn buckets(&self) -> u32 {
        self.buckets
    }

    /// Bucket containing a planar point. Points outside the bounding box map
    /// to coordinates outside the grid; far-off points saturate at the `i32`
    /// range.
    pub fn bucket_of(&self, p: Vec2) -> GridCoord {
        if self.buckets == 0 {
            return GridCoord::default();
        }
        let t = (p - self.min) / self.extent * self.buckets as f32;
        GridCoord::new(t.x.floor() as i32, t.y.floor() as i32)
    }

    fn clamped_bucket_of(&self, p: Vec2) -> GridCoord {
        let last = self.buckets as i32 - 1;
        let c = self.bucket_of(p);
        GridCoord::new(c.x.clamp(0, last), c.y.clamp(0, last))
    }

    /// Cells in a bucket, in index order
    pub fn cells_in(&self, coord: GridCoord) -> &[u32] {
        self.cells.get(&coord).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of non-empty buckets
    pub fn occupied(&self) -> usize {
        self.cells.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::location::test_config;
    use crate::core::types::Vec3;

    fn cells_at(points: &[(f32, f32)]) -> Vec<Cell> {
        let config = test_config(2, 2, 64);
        points
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| {
                let mut cell = Cell::new(i as u32, String::new(), 2, 2, &config);
                cell.position = Vec3::new(x, y, 0.0);
                cell
            })
            .collect()
    }

    #[test]
    fn test_buckets_from_positions() {
        let mut cells = cells_at(&[(0.5, 0.5), (1.5, 0.5), (3.5, 0.5), (100.0, 100.0)]);
        let grid = LodGrid::build(&mut cells, 100);

        assert_eq!(grid.buckets(), 100);
        assert_eq!(cells[0].grid, GridCoord::new(0, 0));
        assert_eq!(cells[1].grid, GridCoord::new(1, 0));
        assert_eq!(cells[2].grid, GridCoord::new(3, 0));
        // The max corner is clamped into the last bucket
        assert_eq!(cells[3].grid, GridCoord::new(99, 99));
        assert_eq!(grid.cells_in(GridCoord::new(3, 0)), &[2]);
        assert!(grid.cells_in(GridCoord::new(50, 50)).is_empty());
    }

    #[test]
    fn test_camera_outside_bounds() {
        let mut cells = cells_at(&[(0.0, 0.0), (10.0, 10.0)]);
        let grid = LodGrid::build(&mut cells, 100);
        assert_eq!(grid.bucket_of(Vec2::new(-5.0, 20.0)), GridCoord::new(-50, 200));
    }

    #[test]
    fn test_grows_with_dataset() {
        let points: Vec<(f32, f32)> = (0..250_000).map(|i| ((i % 500) as f32, (i / 500) as f32)).collect();
        let mut cells = cells_at(&points);
        let grid = LodGrid::build(&mut cells, 100);
        assert_eq!(grid.buckets(), 250);
    }

    #[test]
    fn test_degenerate_positions() {
        let mut cells = cells_at(&[(3.0, 3.0), (3.0, 3.0)]);
        let grid = LodGrid::build(&mut cells, 100);
        assert_eq!(cells[0].grid, cells[1].grid);
        assert_eq!(grid.cells_in(cells[0].grid), &[0, 1]);
        // One world unit per bucket around the shared point
        assert_eq!(grid.bucket_of(Vec2::new(0.5, 3.0)), GridCoord::new(-3, 0));
    }

    #[test]
    fn test_collapsed_axis_keeps_other_axis() {
        let mut cells = cells_at(&[(0.0, 7.0), (10.0, 7.0)]);
        let grid = LodGrid::build(&mut cells, 100);
        assert_eq!(cells[1].grid, GridCoord::new(99, 0));
        assert_eq!(grid.bucket_of(Vec2::new(5.0, 9.5)), GridCoord::new(50, 2));
    }
}
