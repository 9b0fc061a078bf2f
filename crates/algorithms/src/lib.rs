//! # geolab Algorithms
//!
//! Raster and vector operations for Earth-observation teaching workflows.
//!
//! ## Available Algorithm Categories
//!
//! - **stacking**: combine single-band rasters sharing a grid into a stack
//! - **cropping**: crop stacks to polygons or an extent
//! - **imagery**: spectral indices, byte scaling, QA masks
//! - **terrain**: hillshade
//! - **vector**: clip features by a polygon boundary

pub mod cropping;
pub mod imagery;
mod maybe_rayon;
pub mod stacking;
pub mod terrain;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::cropping::{crop, crop_raster, ClipShape, CropOptions, CropResult, PixelWindow};
    pub use crate::imagery::{
        apply_mask, bytescale, make_apply_mask, make_qa_mask, mndwi, nbr, ndvi, ndwi,
        normalized_difference, normalized_difference_stack, BytescaleParams, SpectralIndex,
    };
    pub use crate::stacking::{stack, stack_rasters, Stack, StackOptions, StackOutput};
    pub use crate::terrain::{hillshade, hillshade_stack, Hillshade, HillshadeParams};
    pub use crate::vector::clip;
    pub use geolab_core::prelude::*;
}
