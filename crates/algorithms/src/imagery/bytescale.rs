//! Linear rescaling of raster values to bytes for display

use geolab_core::raster::{DataType, Raster, RasterElement};
use geolab_core::{Error, Result};

/// Parameters for [`bytescale`]
#[derive(Debug, Clone)]
pub struct BytescaleParams {
    /// Input value mapped to `low`; defaults to (and is raised to) the data minimum
    pub cmin: Option<f64>,
    /// Input value mapped to `high`; defaults to (and is lowered to) the data maximum
    pub cmax: Option<f64>,
    /// Lowest output byte (>= 0)
    pub low: i32,
    /// Highest output byte (<= 255)
    pub high: i32,
}

impl Default for BytescaleParams {
    fn default() -> Self {
        Self {
            cmin: None,
            cmax: None,
            low: 0,
            high: 255,
        }
    }
}

/// Rescale a raster linearly into `[low, high]`.
///
/// Values above `cmax` are clipped to `cmax` before scaling; results are
/// rounded half up. Masked cells are ignored when finding the data range and
/// map to `low`; the output keeps the input's mask. Rasters that are already
/// bytes are returned unchanged.
pub fn bytescale<T: RasterElement>(raster: &Raster<T>, params: &BytescaleParams) -> Result<Raster<u8>> {
    validate(params)?;
    let invalid = raster.invalid_mask();

    let mut output = raster.with_same_meta::<u8>(raster.rows(), raster.cols());
    output.set_mask(Some(invalid.clone()))?;

    if T::DATA_TYPE == DataType::U8 {
        *output.data_mut() = raster.data().mapv(|v| num_traits::cast(v).unwrap_or(0));
        output.set_nodata(raster.nodata().and_then(num_traits::cast));
        return Ok(output);
    }

    let values = raster.data().mapv(|v| RasterElement::to_f64(v).unwrap_or(f64::NAN));
    let (dmin, dmax) = values
        .iter()
        .zip(invalid.iter())
        .filter(|&(v, &masked)| !masked && v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, (&v, _)| match acc {
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            None => Some((v, v)),
        })
        .ok_or_else(|| Error::EmptyInput("raster has no valid cells to scale".into()))?;

    let cmin = params.cmin.filter(|&c| c >= dmin).unwrap_or(dmin);
    let cmax = params.cmax.filter(|&c| c <= dmax).unwrap_or(dmax);
    let crange = cmax - cmin;
    if crange <= 0.0 {
        return Err(Error::InvalidParameter {
            name: "cmax",
            value: cmax.to_string(),
            reason: format!("must be larger than cmin ({})", cmin),
        });
    }

    let (low, high) = (f64::from(params.low), f64::from(params.high));
    let scale = (high - low) / crange;

    let mut bytes = values.mapv(|v| {
        let scaled = (v.min(cmax) - cmin) * scale + low;
        (scaled.clamp(low, high) + 0.5) as u8
    });
    bytes.zip_mut_with(&invalid, |b, &masked| {
        if masked {
            *b = params.low as u8;
        }
    });
    *output.data_mut() = bytes;
    Ok(output)
}

fn validate(params: &BytescaleParams) -> Result<()> {
    let fail = |name: &'static str, value: i32, reason: &str| {
        Err(Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.to_string(),
        })
    };
    if params.high > 255 {
        return fail("high", params.high, "should be less than or equal to 255");
    }
    if params.low < 0 {
        return fail("low", params.low, "should be greater than or equal to 0");
    }
    if params.high < params.low {
        return fail("high", params.high, "should be greater than or equal to low");
    }
    Ok(())
}
