//! Animated transitions between layouts
//!
//! A transition writes every cell's target position, animates the renderer's
//! blend factor from 0 to 1, then commits. Committing copies targets into
//! positions before the LOD grid is rebuilt; the grid is always indexed
//! against committed positions.

use crate::cell::model::Cell;
use crate::core::error::Error;
use crate::layout::positions::LayoutPositions;
use crate::render::buffer::{Attribute, DrawCalls};
use crate::render::renderer::Renderer;
use crate::streaming::lod::LodCache;

/// Easing curve mapping linear progress in `[0, 1]` to a blend factor
pub type Easing = fn(f32) -> f32;

pub fn linear(t: f32) -> f32 {
    t
}

pub fn ease_in_out_cubic(t: f32) -> f32 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum State {
    Idle,
    Running { elapsed: f32 },
}

/// Result of advancing a transition by one frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TransitionStatus {
    Idle,
    /// Blend factor applied this frame
    Running(f32),
    /// Positions committed and LOD reset this frame
    Finished,
}

/// Single-flight layout transition controller
#[derive(Clone, Debug)]
pub struct LayoutTransition {
    duration: f32,
    easing: Easing,
    state: State,
}

impl LayoutTransition {
    /// Transition lasting `duration` seconds with cubic ease-in-out.
    pub fn new(duration: f32) -> Self {
        Self { duration: duration.max(0.0), easing: ease_in_out_cubic, state: State::Idle }
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running { .. })
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Begin animating towards `positions`.
    ///
    /// # Returns
    /// `Ok(false)` without touching any cell if a transition is already in
    /// flight, `Ok(true)` once targets are written.
    pub fn start(&mut self, positions: &LayoutPositions, cells: &mut [Cell], draw_calls: &mut DrawCalls) -> Result<bool, Error> {
        if self.is_running() {
            log::debug!("Layout transition already running; request ignored");
            return Ok(false);
        }
        positions.check_count(cells.len())?;

        for (cell, &target) in cells.iter_mut().zip(positions.as_slice()) {
            cell.target = target;
            draw_calls.set_cell_buffer(cell, Attribute::Target);
        }
        self.state = State::Running { elapsed: 0.0 };
        log::info!("Layout transition started ({} cells, {:.2}s)", cells.len(), self.duration);
        Ok(true)
    }

    /// Advance by `dt` seconds, committing when the animation completes.
    pub fn update(
        &mut self,
        dt: f32,
        cells: &mut [Cell],
        draw_calls: &mut DrawCalls,
        lod: &mut LodCache,
        renderer: &mut dyn Renderer,
    ) -> TransitionStatus {
        let State::Running { elapsed } = self.state else {
            return TransitionStatus::Idle;
        };
        let elapsed = elapsed + dt.max(0.0);
        if elapsed < self.duration {
            self.state = State::Running { elapsed };
            let blend = (self.easing)(elapsed / self.duration).clamp(0.0, 1.0);
            renderer.set_transition_blend(blend);
            return TransitionStatus::Running(blend);
        }

        renderer.set_transition_blend(1.0);
        for cell in cells.iter_mut() {
            cell.position = cell.target;
            draw_calls.set_cell_buffer(cell, Attribute::Position);
        }
        renderer.set_transition_blend(0.0);
        lod.reset_for_layout(cells, draw_calls);
        self.state = State::Idle;
        log::info!("Layout transition committed");
        TransitionStatus::Finished
    }
}
