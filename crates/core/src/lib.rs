//! # geolab core
//!
//! Core types, validation and I/O for the geolab teaching toolkit.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced single-band grid with an optional mask
//! - `RasterStack<T>`: multi-band grid (band, row, col) with `GridMetadata`
//! - `GeoTransform`: affine transformation for georeferencing
//! - `CRS`: coordinate reference system handling
//! - `FeatureCollection`: vector features with an ordered attribute schema
//! - Metadata consistency validation across raster sources
//! - Raster (GeoTIFF) and vector (GeoJSON) I/O

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{
    validate_consistent, validate_sources, DataType, GeoTransform, GridMetadata, Raster,
    RasterElement, RasterStack,
};
pub use vector::{AttributeValue, BoundingBox, Feature, FeatureCollection};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, GridMetadata, Raster, RasterElement, RasterStack};
    pub use crate::vector::{BoundingBox, Feature, FeatureCollection};
    pub use crate::Algorithm;
}

/// Core trait for all algorithms in geolab.
///
/// Algorithms are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
