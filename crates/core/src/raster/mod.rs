//! Raster data structures and operations

mod element;
mod geotransform;
mod grid;
mod metadata;
mod neighborhood;
mod stack;

pub use element::{DataType, RasterElement};
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
pub use metadata::{validate_consistent, validate_sources, GridMetadata};
pub use neighborhood::Window3x3;
pub use stack::RasterStack;
