//! Terrain analysis algorithms
//!
//! - Hillshade: shaded relief visualization from a DEM

mod hillshade;

pub use hillshade::{hillshade, hillshade_stack, Hillshade, HillshadeParams};
