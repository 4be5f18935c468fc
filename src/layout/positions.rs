//! Per-layout cell positions

use serde::Deserialize;

use crate::cell::manifest::maybe_gunzip;
use crate::cell::model::Cell;
use crate::core::error::Error;
use crate::core::types::{Vec2, Vec3};
use crate::render::buffer::{Attribute, DrawCalls};

/// One row of a position file: `[x, y]` or `[x, y, z]`
#[derive(Deserialize)]
#[serde(untagged)]
enum PositionRow {
    Flat([f32; 2]),
    Depth([f32; 3]),
}

/// World-space position of every cell in one layout
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayoutPositions {
    positions: Vec<Vec3>,
}

impl LayoutPositions {
    pub fn new(positions: Vec<Vec3>) -> Self {
        Self { positions }
    }

    /// Parse a position file in normalized -1..1 space and scale it to world
    /// units.
    pub fn from_bytes(bytes: &[u8], world_scale: f32) -> Result<Self, Error> {
        let text = maybe_gunzip(bytes)?;
        let rows: Vec<PositionRow> = serde_json::from_slice(&text)
            .map_err(|e| Error::Layout(format!("invalid position file: {}", e)))?;
        let positions = rows
            .into_iter()
            .map(|row| {
                let p = match row {
                    PositionRow::Flat([x, y]) => Vec3::new(x, y, 0.0),
                    PositionRow::Depth([x, y, z]) => Vec3::new(x, y, z),
                };
                p * world_scale
            })
            .collect();
        Ok(Self { positions })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn as_slice(&self) -> &[Vec3] {
        &self.positions
    }

    /// Planar bounding box as (min, max)
    pub fn bounds(&self) -> (Vec2, Vec2) {
        bounds_of(self.positions.iter().copied())
    }

    pub(crate) fn check_count(&self, cells: usize) -> Result<(), Error> {
        if self.positions.len() != cells {
            return Err(Error::Layout(format!(
                "layout has {} positions for {} cells", self.positions.len(), cells
            )));
        }
        Ok(())
    }

    /// Place cells directly, without a transition.
    pub fn apply_immediately(&self, cells: &mut [Cell], draw_calls: &mut DrawCalls) -> Result<(), Error> {
        self.check_count(cells.len())?;
        for (cell, &p) in cells.iter_mut().zip(&self.positions) {
            cell.position = p;
            cell.target = p;
            draw_calls.set_cell_buffer(cell, Attribute::Position);
            draw_calls.set_cell_buffer(cell, Attribute::Target);
        }
        Ok(())
    }
}

/// Planar bounding box of a set of points; a zero box at the origin when empty.
pub fn bounds_of(points: impl Iterator<Item = Vec3>) -> (Vec2, Vec2) {
    let (min, max) = points.fold(
        (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY)),
        |(min, max), p| (min.min(p.truncate()), max.max(p.truncate())),
    );
    if min.x > max.x {
        (Vec2::ZERO, Vec2::ZERO)
    } else {
        (min, max)
    }
}
