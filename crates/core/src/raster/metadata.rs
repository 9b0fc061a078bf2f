//! Grid metadata and the consistency validator used before combining sources

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{DataType, GeoTransform};
use serde::{Deserialize, Serialize};

/// Georeferencing and layout of a (possibly multi-band) raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridMetadata {
    pub crs: Option<CRS>,
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub dtype: DataType,
    pub nodata: Option<f64>,
}

impl GridMetadata {
    /// Expected array shape `(band_count, height, width)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.band_count, self.height, self.width)
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.width, self.height)
    }
}

/// Check that every entry shares CRS, transform, width and height.
///
/// Entries are compared against the first one; the first mismatch aborts.
pub fn validate_consistent(metadata: &[GridMetadata]) -> Result<()> {
    let labelled: Vec<(String, &GridMetadata)> = metadata
        .iter()
        .enumerate()
        .map(|(i, m)| (format!("source {}", i), m))
        .collect();
    check_all(&labelled)
}

/// Same as [`validate_consistent`] with caller-supplied labels (usually paths)
/// so errors name the disagreeing sources.
pub fn validate_sources<S: AsRef<str>>(sources: &[(S, GridMetadata)]) -> Result<()> {
    let labelled: Vec<(String, &GridMetadata)> = sources
        .iter()
        .map(|(label, m)| (label.as_ref().to_string(), m))
        .collect();
    check_all(&labelled)
}

fn check_all(sources: &[(String, &GridMetadata)]) -> Result<()> {
    let Some(((first_label, first), rest)) = sources.split_first() else {
        return Err(Error::EmptyInput("no raster metadata to validate".into()));
    };

    for (label, meta) in rest {
        let mismatch = |attribute: &'static str, expected: String, found: String| {
            Error::MetadataMismatch {
                attribute,
                first: first_label.clone(),
                other: label.clone(),
                expected,
                found,
            }
        };

        if !CRS::same_option(first.crs.as_ref(), meta.crs.as_ref()) {
            return Err(mismatch("crs", crs_label(first.crs.as_ref()), crs_label(meta.crs.as_ref())));
        }
        if first.transform.to_gdal() != meta.transform.to_gdal() {
            return Err(mismatch(
                "transform",
                format!("{:?}", first.transform.to_gdal()),
                format!("{:?}", meta.transform.to_gdal()),
            ));
        }
        if first.width != meta.width {
            return Err(mismatch("width", first.width.to_string(), meta.width.to_string()));
        }
        if first.height != meta.height {
            return Err(mismatch("height", first.height.to_string(), meta.height.to_string()));
        }
    }

    Ok(())
}

fn crs_label(crs: Option<&CRS>) -> String {
    crs.map_or_else(|| "none".to_string(), |c| c.identifier())
}
