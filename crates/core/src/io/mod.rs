//! I/O operations for reading and writing geospatial data
//!
//! Rasters go through GeoTIFF (native `tiff` backend by default, GDAL with the
//! `gdal` feature); vectors through GeoJSON.

#[cfg(feature = "gdal")]
mod gdal_io;
mod geojson_io;
mod native;

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

#[cfg(feature = "gdal")]
pub use gdal_io::{read_geotiff, read_geotiff_stack, write_geotiff, write_geotiff_stack};

#[cfg(not(feature = "gdal"))]
pub use native::{read_geotiff, read_geotiff_stack, write_geotiff, write_geotiff_stack};

// Buffer-based I/O (always available, no filesystem dependency)
pub use native::{
    read_geotiff_from_buffer, read_geotiff_stack_from_buffer, write_geotiff_stack_to_buffer,
    write_geotiff_to_buffer,
};

pub use geojson_io::{read_geojson, read_geojson_str, write_geojson, write_geojson_string};

/// Compression applied to written GeoTIFF strips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Deflate,
    Lzw,
}

impl Compression {
    /// GDAL creation-option spelling
    pub fn as_gdal(&self) -> &'static str {
        match self {
            Compression::None => "NONE",
            Compression::Deflate => "DEFLATE",
            Compression::Lzw => "LZW",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_gdal())
    }
}

impl FromStr for Compression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NONE" => Ok(Compression::None),
            "DEFLATE" => Ok(Compression::Deflate),
            "LZW" => Ok(Compression::Lzw),
            other => Err(Error::InvalidParameter {
                name: "compression",
                value: other.to_string(),
                reason: "expected NONE, DEFLATE or LZW".into(),
            }),
        }
    }
}

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    pub compression: Compression,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_parse() {
        assert_eq!("deflate".parse::<Compression>().unwrap(), Compression::Deflate);
        assert_eq!("NONE".parse::<Compression>().unwrap(), Compression::None);
        assert!("jpeg".parse::<Compression>().is_err());
    }
}
