//! Error types for geolab

use thiserror::Error;

/// Main error type for geolab operations
///
/// Every variant is fatal: operations surface the first failure they meet
/// and never return partial results.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error: {0}")]
    Tiff(String),

    #[error("GeoJSON error: {0}")]
    GeoJson(String),

    #[error("Nothing to process: {0}")]
    EmptyInput(String),

    #[error("Metadata mismatch on {attribute} between '{first}' and '{other}': {expected} vs {found}")]
    MetadataMismatch {
        attribute: &'static str,
        first: String,
        other: String,
        expected: String,
        found: String,
    },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Expected a single band, got {0} bands")]
    InvalidBandCount(usize),

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Array shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Geometries do not intersect the target extent: {0}")]
    EmptyIntersection(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("GDAL error: {0}")]
    #[cfg(feature = "gdal")]
    Gdal(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error is a caller validation failure (as opposed to I/O)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::EmptyInput(_)
                | Error::MetadataMismatch { .. }
                | Error::InvalidDimensions { .. }
                | Error::InvalidBandCount(_)
                | Error::SizeMismatch { .. }
                | Error::ShapeMismatch { .. }
                | Error::CrsMismatch(_, _)
                | Error::InvalidParameter { .. }
                | Error::InvalidPath { .. }
        )
    }
}

impl From<tiff::TiffError> for Error {
    fn from(e: tiff::TiffError) -> Self {
        Error::Tiff(e.to_string())
    }
}

impl From<geojson::Error> for Error {
    fn from(e: geojson::Error) -> Self {
        Error::GeoJson(e.to_string())
    }
}

#[cfg(feature = "gdal")]
impl From<gdal::errors::GdalError> for Error {
    fn from(e: gdal::errors::GdalError) -> Self {
        Error::Gdal(e.to_string())
    }
}

/// Result type alias for geolab operations
pub type Result<T> = std::result::Result<T, Error>;
