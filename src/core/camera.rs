//! Camera for the point-cloud view

use crate::core::types::{Vec2, Vec3};

/// Camera looking down the -Z axis at the layout plane.
///
/// Cells live on (or near) the z = 0 plane, so the camera's z coordinate is
/// the depth metric the LOD cache compares against its detail threshold and
/// its x/y coordinates select the grid bucket under the viewer. Projection is
/// left to the renderer.
#[derive(Clone, Debug)]
pub struct Camera {
    /// World position
    pub position: Vec3,
    /// Point the camera looks at
    pub target: Vec3,
}

impl Camera {
    /// Create a camera looking straight down at the point below it
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            target: Vec3::new(position.x, position.y, 0.0),
        }
    }

    /// Distance of the camera above the layout plane
    pub fn depth(&self) -> f32 {
        self.position.z
    }

    /// Camera position projected onto the layout plane
    pub fn ground_position(&self) -> Vec2 {
        self.position.truncate()
    }

    /// Move the camera and its target together across the layout plane
    pub fn pan_to(&mut self, xy: Vec2) {
        let delta = xy - self.position.truncate();
        self.position += delta.extend(0.0);
        self.target += delta.extend(0.0);
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 5000.0))
    }
}
