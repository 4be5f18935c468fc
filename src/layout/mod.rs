//! Layout positions and animated transitions between them

pub mod positions;
pub mod transition;

pub use positions::{LayoutPositions, bounds_of};
pub use transition::{Easing, LayoutTransition, TransitionStatus, ease_in_out_cubic, linear};
