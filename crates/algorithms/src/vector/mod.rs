//! Vector analysis algorithms
//!
//! - Clip: intersect features with a polygon boundary

mod clip;

pub use clip::clip;
