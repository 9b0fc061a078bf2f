//! Band stacking
//!
//! Combines single-band sources that share one grid into a multi-band
//! [`RasterStack`], optionally writing it out as a GeoTIFF.

use geolab_core::io::{read_geotiff_stack, write_geotiff_stack, GeoTiffOptions};
use geolab_core::raster::{validate_consistent, validate_sources, Raster, RasterElement, RasterStack};
use geolab_core::{Algorithm, Error, Result};
use ndarray::{Array3, Axis};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Parameters for band stacking
#[derive(Debug, Clone, Default)]
pub struct StackOptions {
    /// Write the stack to this GeoTIFF path
    pub output: Option<PathBuf>,
    /// Mask cells equal to each band's own no-data value
    pub mask_nodata: bool,
    /// Absolute tolerance for the no-data comparison; exact equality when `None`
    pub nodata_tolerance: Option<f64>,
    pub write_options: GeoTiffOptions,
}

/// Stacked bands plus the path they were written to, if any
#[derive(Debug, Clone)]
pub struct StackOutput<T: RasterElement> {
    pub stack: RasterStack<T>,
    pub written: Option<PathBuf>,
}

/// Band stacking algorithm
#[derive(Debug, Clone, Default)]
pub struct Stack;

impl Algorithm for Stack {
    type Input = Vec<Raster<f64>>;
    type Output = RasterStack<f64>;
    type Params = StackOptions;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Stack"
    }

    fn description(&self) -> &'static str {
        "Stack single-band rasters sharing one grid into a multi-band raster"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        stack_rasters(&input, &params)
    }
}

/// Stack in-memory bands in the given order.
///
/// All bands must share CRS, transform and dimensions. The result takes the
/// spatial metadata of the first band and the no-data value of the first band
/// that declares one. Cells holding a band's own, different no-data value
/// are rewritten to that shared value so the stack has one no-data marker.
/// Existing band masks are kept; with `mask_nodata` each band additionally
/// masks cells matching its own no-data value.
pub fn stack_rasters<T: RasterElement>(bands: &[Raster<T>], options: &StackOptions) -> Result<RasterStack<T>> {
    if bands.is_empty() {
        return Err(Error::EmptyInput("no rasters to stack".into()));
    }
    let metadata: Vec<_> = bands.iter().map(|b| b.metadata()).collect();
    validate_consistent(&metadata)?;

    let mut stack = RasterStack::from_bands(bands)?;
    unify_nodata(&mut stack, bands, options.nodata_tolerance);
    if options.mask_nodata {
        let nodata_mask = nodata_mask(bands, options.nodata_tolerance);
        let merged = match stack.mask() {
            Some(existing) => existing | &nodata_mask,
            None => nodata_mask,
        };
        stack.set_mask(Some(merged))?;
    }

    debug!(
        bands = stack.band_count(),
        rows = stack.rows(),
        cols = stack.cols(),
        masked = stack.masked_count(),
        "stacked rasters"
    );
    Ok(stack)
}

/// Rewrite each band's own no-data cells to the stack's no-data value
fn unify_nodata<T: RasterElement>(stack: &mut RasterStack<T>, bands: &[Raster<T>], tolerance: Option<f64>) {
    let Some(shared) = stack.nodata() else {
        return;
    };
    for (band, mut plane) in bands.iter().zip(stack.data_mut().axis_iter_mut(Axis(0))) {
        let own = band.nodata();
        if own.map_or(true, |nd| nd.is_nodata(Some(shared))) {
            continue;
        }
        plane.zip_mut_with(band.data(), |out, v| {
            let hit = match tolerance {
                Some(tol) => v.is_nodata_within(own, tol),
                None => v.is_nodata(own),
            };
            if hit {
                *out = shared;
            }
        });
    }
}

/// Per-band no-data mask; each band is compared with its own no-data value
fn nodata_mask<T: RasterElement>(bands: &[Raster<T>], tolerance: Option<f64>) -> Array3<bool> {
    let (rows, cols) = bands[0].shape();
    let mut mask = Array3::from_elem((bands.len(), rows, cols), false);
    for (band, mut plane) in bands.iter().zip(mask.axis_iter_mut(Axis(0))) {
        let nodata = band.nodata();
        plane.zip_mut_with(band.data(), |m, v| {
            *m = match tolerance {
                Some(tol) => v.is_nodata_within(nodata, tol),
                None => v.is_nodata(nodata),
            };
        });
    }
    mask
}

/// Read, validate and stack raster files in order, optionally writing the result.
///
/// Multi-band sources contribute all their bands in order. The output
/// location is checked before any source is read and every source is
/// validated before anything is written, so a failed call leaves no file.
pub fn stack<T, P>(paths: &[P], options: &StackOptions) -> Result<StackOutput<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    if paths.is_empty() {
        return Err(Error::EmptyInput("no raster paths to stack".into()));
    }
    if let Some(out) = &options.output {
        check_output_path(out)?;
    }

    let mut labelled = Vec::with_capacity(paths.len());
    let mut bands: Vec<Raster<T>> = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let source: RasterStack<T> = read_geotiff_stack(path)?;
        for b in 0..source.band_count() {
            bands.push(source.band(b)?);
        }
        labelled.push((path.display().to_string(), source.metadata().clone()));
    }
    validate_sources(&labelled)?;

    let stack = stack_rasters(&bands, options)?;

    let written = match &options.output {
        Some(out) => {
            write_geotiff_stack(&stack, out, Some(options.write_options.clone()))?;
            debug!(path = %out.display(), "wrote stack");
            Some(out.clone())
        }
        None => None,
    };

    Ok(StackOutput { stack, written })
}

/// The output must name a `.tif`/`.tiff` file inside an existing directory
fn check_output_path(out: &Path) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidPath {
        path: out.display().to_string(),
        reason: reason.to_string(),
    };

    let has_tiff_ext = out
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"));
    if !has_tiff_ext {
        return Err(invalid("output must be a .tif or .tiff file"));
    }

    match out.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => {
            Err(invalid("output directory does not exist"))
        }
        _ => Ok(()),
    }
}
