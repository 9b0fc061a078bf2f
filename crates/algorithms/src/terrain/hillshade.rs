//! Hillshade (shaded relief) calculation
//!
//! Creates a shaded relief visualization from a DEM based on
//! illumination angle and direction.

use crate::maybe_rayon::*;
use geolab_core::raster::{Raster, RasterStack, Window3x3};
use geolab_core::{Algorithm, Error, Result};
use ndarray::Array2;

/// Parameters for hillshade calculation
#[derive(Debug, Clone)]
pub struct HillshadeParams {
    /// Sun azimuth in degrees (0 = North, clockwise)
    pub azimuth: f64,
    /// Sun altitude in degrees above horizon (0-90)
    pub altitude: f64,
    /// Z-factor for vertical exaggeration
    pub z_factor: f64,
    /// Output range: false = 0-255, true = 0.0-1.0
    pub normalized: bool,
}

impl Default for HillshadeParams {
    fn default() -> Self {
        Self {
            azimuth: 30.0,
            altitude: 30.0,
            z_factor: 1.0,
            normalized: false,
        }
    }
}

/// Hillshade algorithm
#[derive(Debug, Clone, Default)]
pub struct Hillshade;

impl Algorithm for Hillshade {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = HillshadeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Hillshade"
    }

    fn description(&self) -> &'static str {
        "Calculate shaded relief from a DEM"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        hillshade(&input, params)
    }
}

/// Calculate hillshade from a DEM
///
/// Gradients use Horn's 3x3 weights scaled by pixel width and height. Cells
/// outside the grid take the value of the nearest edge cell, so the output
/// has the input's shape with no blank border. Masked or NaN cells produce
/// NaN (masked); a masked neighbour is replaced by the centre value.
///
/// `shade = cos(zenith)·cos(slope) + sin(zenith)·sin(slope)·cos(azimuth_math - aspect)`
/// is mapped from [-1, 1] to [0, 255], or to [0, 1] when `normalized`.
pub fn hillshade(dem: &Raster<f64>, params: HillshadeParams) -> Result<Raster<f64>> {
    validate(&params)?;

    let (rows, cols) = dem.shape();
    let transform = dem.transform();
    let dx = transform.pixel_width.abs();
    let dy = transform.pixel_height.abs();
    if dx == 0.0 || dy == 0.0 {
        return Err(Error::InvalidParameter {
            name: "transform",
            value: format!("{} x {}", dx, dy),
            reason: "pixel size must be non-zero".into(),
        });
    }

    // Illumination angles in radians; compass azimuth to math angle
    let azimuth_math = (90.0 - params.azimuth).to_radians();
    let zenith = (90.0 - params.altitude).to_radians();
    let (sin_zenith, cos_zenith) = zenith.sin_cos();

    let invalid = dem.invalid_mask();
    let mut values = dem.data().clone();
    values.zip_mut_with(&invalid, |v, &masked| {
        if masked {
            *v = f64::NAN;
        }
    });
    let view = values.view();

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];

            for (col, out) in row_data.iter_mut().enumerate() {
                let mut w = Window3x3::replicate_edges(&view, row, col);
                let e = w.center();
                if e.is_nan() {
                    continue;
                }
                for v in w.values.iter_mut() {
                    if v.is_nan() {
                        *v = e;
                    }
                }
                let [a, b, c, d, _, f, g, h, i] = w.values;

                // Horn's method; y grows southward with the row index
                let dz_dx = params.z_factor * ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / (8.0 * dx);
                let dz_dy = params.z_factor * ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / (8.0 * dy);

                let slope = dz_dx.hypot(dz_dy).atan();
                // Downslope direction as a math angle (counter-clockwise from east)
                let aspect = dz_dy.atan2(-dz_dx);

                let shade = cos_zenith * slope.cos()
                    + sin_zenith * slope.sin() * (azimuth_math - aspect).cos();

                let unit = (shade + 1.0) / 2.0;
                *out = if params.normalized { unit } else { 255.0 * unit };
            }

            row_data
        })
        .collect();

    let mut output = dem.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;
    let mask = output.data().mapv(f64::is_nan);
    output.set_mask(Some(mask))?;

    Ok(output)
}

/// Hillshade of a one-band stack; multi-band stacks are rejected
pub fn hillshade_stack(dem: &RasterStack<f64>, params: HillshadeParams) -> Result<Raster<f64>> {
    if dem.band_count() != 1 {
        return Err(Error::InvalidBandCount(dem.band_count()));
    }
    hillshade(&dem.band(0)?, params)
}

fn validate(params: &HillshadeParams) -> Result<()> {
    if !(0.0..=90.0).contains(&params.altitude) {
        return Err(Error::InvalidParameter {
            name: "altitude",
            value: params.altitude.to_string(),
            reason: "must be between 0 and 90 degrees".into(),
        });
    }
    if !params.azimuth.is_finite() {
        return Err(Error::InvalidParameter {
            name: "azimuth",
            value: params.azimuth.to_string(),
            reason: "must be a finite angle".into(),
        });
    }
    if !params.z_factor.is_finite() || params.z_factor <= 0.0 {
        return Err(Error::InvalidParameter {
            name: "z_factor",
            value: params.z_factor.to_string(),
            reason: "must be positive".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geolab_core::GeoTransform;

    fn dem_from(f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
        let mut dem = Raster::new(10, 10);
        dem.set_transform(GeoTransform::new(0.0, 10.0, 1.0, -1.0));
        for row in 0..10 {
            for col in 0..10 {
                dem.set(row, col, f(row, col)).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_hillshade_range() {
        let dem = dem_from(|r, c| (r + c) as f64 * 10.0);
        let result = hillshade(&dem, HillshadeParams::default()).unwrap();

        for &val in result.data().iter() {
            assert!((0.0..=255.0).contains(&val), "Hillshade value {} out of range", val);
        }
    }

    #[test]
    fn test_flat_surface() {
        let dem = dem_from(|_, _| 100.0);
        let result = hillshade(&dem, HillshadeParams::default()).unwrap();

        // slope 0: shade = cos(60°) = 0.5, mapped to 255 * 1.5 / 2
        for &val in result.data().iter() {
            assert_relative_eq!(val, 191.25, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_edges_are_shaded() {
        let dem = dem_from(|r, c| (r * 3 + c) as f64);
        let result = hillshade(&dem, HillshadeParams::default()).unwrap();
        assert_eq!(result.shape(), (10, 10));
        assert!(result.data().iter().all(|v| v.is_finite()));
        assert!(!result.is_masked(0, 0).unwrap());
    }

    #[test]
    fn test_sun_facing_slope_is_brighter() {
        // Elevation drops toward the east: the slope faces east
        let dem = dem_from(|_, c| 100.0 - 10.0 * c as f64);
        let east = hillshade(&dem, HillshadeParams { azimuth: 90.0, ..Default::default() }).unwrap();
        let west = hillshade(&dem, HillshadeParams { azimuth: 270.0, ..Default::default() }).unwrap();
        assert!(east.get(5, 5).unwrap() > west.get(5, 5).unwrap());

        // Elevation drops toward the north (row 0): the slope faces north
        let dem = dem_from(|r, _| 10.0 * r as f64);
        let north = hillshade(&dem, HillshadeParams { azimuth: 0.0, ..Default::default() }).unwrap();
        let south = hillshade(&dem, HillshadeParams { azimuth: 180.0, ..Default::default() }).unwrap();
        assert!(north.get(5, 5).unwrap() > south.get(5, 5).unwrap());
    }

    #[test]
    fn test_normalized() {
        let dem = dem_from(|r, c| (r * c) as f64);
        let result = hillshade(&dem, HillshadeParams { normalized: true, ..Default::default() }).unwrap();
        for &val in result.data().iter() {
            assert!((0.0..=1.0).contains(&val), "Normalized hillshade {} out of range", val);
        }
    }

    #[test]
    fn test_nodata_propagates() {
        let mut dem = dem_from(|_, _| 100.0);
        dem.set(4, 4, -9999.0).unwrap();
        dem.set_nodata(Some(-9999.0));

        let result = hillshade(&dem, HillshadeParams::default()).unwrap();
        assert!(result.get(4, 4).unwrap().is_nan());
        assert!(result.is_masked(4, 4).unwrap());
        // Neighbours treat the hole as flat
        assert_relative_eq!(result.get(4, 5).unwrap(), 191.25, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_altitude() {
        let dem = dem_from(|_, _| 0.0);
        let err = hillshade(&dem, HillshadeParams { altitude: 95.0, ..Default::default() }).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "altitude", .. }));
    }

    #[test]
    fn test_stack_must_be_single_band() {
        let dem = dem_from(|_, _| 0.0);
        let two = RasterStack::from_bands(&[dem.clone(), dem.clone()]).unwrap();
        assert!(matches!(
            hillshade_stack(&two, HillshadeParams::default()),
            Err(Error::InvalidBandCount(2))
        ));
        let one = RasterStack::from_raster(&dem).unwrap();
        assert!(hillshade_stack(&one, HillshadeParams::default()).is_ok());
    }
}
