//! Spectral indices
//!
//! Every index here is a normalized difference of two bands. Cells that are
//! masked in either input, or where the bands sum to zero, come out as NaN
//! and are flagged in the output mask.

use crate::maybe_rayon::*;
use geolab_core::raster::{Raster, RasterElement, RasterStack};
use geolab_core::{Error, Result};
use ndarray::Array2;

/// Enumeration of supported spectral indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectralIndex {
    /// Normalized Difference Vegetation Index
    NDVI,
    /// Normalized Difference Water Index (McFeeters)
    NDWI,
    /// Modified NDWI (Xu, uses SWIR)
    MNDWI,
    /// Normalized Burn Ratio
    NBR,
}

impl SpectralIndex {
    /// Compute the index from its two bands, in the order the index names them
    pub fn compute<T: RasterElement>(&self, first: &Raster<T>, second: &Raster<T>) -> Result<Raster<f64>> {
        match self {
            SpectralIndex::NDVI => ndvi(first, second),
            SpectralIndex::NDWI => ndwi(first, second),
            SpectralIndex::MNDWI => mndwi(first, second),
            SpectralIndex::NBR => nbr(first, second),
        }
    }
}

// ---------------------------------------------------------------------------
// Generic normalized difference
// ---------------------------------------------------------------------------

/// Compute the normalized difference between two bands:
///
/// `(b - a) / (b + a)`
///
/// Result is in the range [-1, 1]. Cells masked in either input (mask bit,
/// no-data or NaN), cells where `a + b == 0`, and non-finite results are NaN
/// and masked. Metadata is copied from `a`; output no-data is NaN.
///
/// Swapping the arguments negates every valid cell.
pub fn normalized_difference<T: RasterElement>(a: &Raster<T>, b: &Raster<T>) -> Result<Raster<f64>> {
    check_dimensions(a, b)?;

    let (rows, cols) = a.shape();
    let invalid_a = a.invalid_mask();
    let invalid_b = b.invalid_mask();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                if invalid_a[(row, col)] || invalid_b[(row, col)] {
                    continue;
                }
                let (Some(va), Some(vb)) = (
                    RasterElement::to_f64(a.data()[(row, col)]),
                    RasterElement::to_f64(b.data()[(row, col)]),
                ) else {
                    continue;
                };

                let sum = va + vb;
                if sum == 0.0 {
                    continue;
                }
                let nd = (vb - va) / sum;
                if nd.is_finite() {
                    *out = nd;
                }
            }
            row_data
        })
        .collect();

    build_output(a, rows, cols, data)
}

/// Normalized difference of two bands of a stack (0-indexed): `(b - a) / (b + a)`
pub fn normalized_difference_stack<T: RasterElement>(
    stack: &RasterStack<T>,
    a_band: usize,
    b_band: usize,
) -> Result<Raster<f64>> {
    normalized_difference(&stack.band(a_band)?, &stack.band(b_band)?)
}

// ---------------------------------------------------------------------------
// Named indices
// ---------------------------------------------------------------------------

/// Normalized Difference Vegetation Index
///
/// `NDVI = (NIR - Red) / (NIR + Red)`
///
/// Values range from -1 to 1:
/// - Dense vegetation: 0.6 to 0.9
/// - Sparse vegetation: 0.2 to 0.5
/// - Bare soil: 0.1 to 0.2
/// - Water/clouds: -1.0 to 0.0
pub fn ndvi<T: RasterElement>(nir: &Raster<T>, red: &Raster<T>) -> Result<Raster<f64>> {
    normalized_difference(red, nir)
}

/// Normalized Difference Water Index (McFeeters, 1996)
///
/// `NDWI = (Green - NIR) / (Green + NIR)`; positive values indicate water.
pub fn ndwi<T: RasterElement>(green: &Raster<T>, nir: &Raster<T>) -> Result<Raster<f64>> {
    normalized_difference(nir, green)
}

/// Modified Normalized Difference Water Index (Xu, 2006)
///
/// `MNDWI = (Green - SWIR) / (Green + SWIR)`
pub fn mndwi<T: RasterElement>(green: &Raster<T>, swir: &Raster<T>) -> Result<Raster<f64>> {
    normalized_difference(swir, green)
}

/// Normalized Burn Ratio
///
/// `NBR = (NIR - SWIR) / (NIR + SWIR)`
pub fn nbr<T: RasterElement>(nir: &Raster<T>, swir: &Raster<T>) -> Result<Raster<f64>> {
    normalized_difference(swir, nir)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn check_dimensions<T: RasterElement, U: RasterElement>(a: &Raster<T>, b: &Raster<U>) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(Error::SizeMismatch {
            er: a.rows(),
            ec: a.cols(),
            ar: b.rows(),
            ac: b.cols(),
        });
    }
    Ok(())
}

fn build_output<T: RasterElement>(
    template: &Raster<T>,
    rows: usize,
    cols: usize,
    data: Vec<f64>,
) -> Result<Raster<f64>> {
    let mut output = template.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    let mask = output.data().mapv(f64::is_nan);
    output.set_mask(Some(mask))?;
    Ok(output)
}
