//! Cropping rasters to vector geometries
//!
//! The output covers the pixel window spanned by the clip geometries'
//! bounding box; pixels inside the window that no geometry touches are filled
//! and masked.

use crate::maybe_rayon::*;
use geo::{BoundingRect, Intersects};
use geo_types::{Coord, Geometry, LineString, Point, Polygon};
use geolab_core::raster::{GeoTransform, Raster, RasterElement, RasterStack};
use geolab_core::vector::{BoundingBox, FeatureCollection};
use geolab_core::{Error, Result, CRS};
use ndarray::{s, Array2, Array3, Axis, Zip};
use num_traits::Zero;
use tracing::debug;

/// What to crop to
#[derive(Debug, Clone)]
pub enum ClipShape<'a> {
    /// Features of a collection; its CRS is checked against the raster
    Features(&'a FeatureCollection),
    /// Bare geometries, assumed to be in the raster's CRS
    Geometries(Vec<Geometry<f64>>),
    /// An axis-aligned extent in the raster's CRS
    Bounds(BoundingBox),
}

/// Parameters for cropping
#[derive(Debug, Clone)]
pub struct CropOptions {
    /// Keep every pixel whose footprint touches a geometry (default). When
    /// false, polygons keep only pixels whose centre falls inside them.
    pub all_touched: bool,
}

impl Default for CropOptions {
    fn default() -> Self {
        Self { all_touched: true }
    }
}

/// Pixel window of the source grid covered by a crop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub col_off: usize,
    pub row_off: usize,
    pub width: usize,
    pub height: usize,
}

/// Cropped stack and the source window it was cut from
#[derive(Debug, Clone)]
pub struct CropResult<T: RasterElement> {
    pub stack: RasterStack<T>,
    pub window: PixelWindow,
}

/// Axis-aligned polygon covering `bbox`
pub fn extent_polygon(bbox: &BoundingBox) -> Polygon<f64> {
    bbox.to_polygon()
}

/// Crop a stack to the given shapes.
///
/// # Errors
/// - `CrsMismatch` when a feature collection declares a CRS different from the raster's
/// - `EmptyInput` when there are no geometries
/// - `EmptyIntersection` when the shapes miss the raster or no pixel survives
pub fn crop<T: RasterElement>(
    source: &RasterStack<T>,
    clip: &ClipShape<'_>,
    options: &CropOptions,
) -> Result<CropResult<T>> {
    let geometries = clip_geometries(source.crs(), clip)?;
    if geometries.is_empty() {
        return Err(Error::EmptyInput("no clip geometries".into()));
    }
    let bbox = BoundingBox::of_geometries(geometries.iter())
        .ok_or_else(|| Error::EmptyInput("clip geometries have no extent".into()))?;

    let transform = *source.transform();
    let window = pixel_window(&transform, &bbox, source.rows(), source.cols())?;
    let keep = coverage(&transform, &window, &geometries, options.all_touched);
    if !keep.iter().any(|&k| k) {
        return Err(Error::EmptyIntersection(
            "no pixel of the crop window touches the clip geometries".into(),
        ));
    }

    let fill = source.nodata().unwrap_or_else(T::zero);
    let (r0, r1) = (window.row_off, window.row_off + window.height);
    let (c0, c1) = (window.col_off, window.col_off + window.width);

    let mut data: Array3<T> = source.data().slice(s![.., r0..r1, c0..c1]).to_owned();
    let mut mask = match source.mask() {
        Some(m) => m.slice(s![.., r0..r1, c0..c1]).to_owned(),
        None => Array3::from_elem(data.dim(), false),
    };
    for (mut band, mut band_mask) in data.axis_iter_mut(Axis(0)).zip(mask.axis_iter_mut(Axis(0))) {
        Zip::from(&mut band)
            .and(&mut band_mask)
            .and(&keep)
            .for_each(|v, m, &k| {
                if !k {
                    *v = fill;
                    *m = true;
                }
            });
    }

    let mut meta = source.metadata().clone();
    meta.transform = transform.shifted_to(window.col_off, window.row_off);
    meta.width = window.width;
    meta.height = window.height;

    let mut stack = RasterStack::new(data, meta)?;
    stack.set_mask(Some(mask))?;

    debug!(
        col_off = window.col_off,
        row_off = window.row_off,
        width = window.width,
        height = window.height,
        all_touched = options.all_touched,
        "cropped raster"
    );
    Ok(CropResult { stack, window })
}

/// Crop a single-band raster; see [`crop`]
pub fn crop_raster<T: RasterElement>(
    source: &Raster<T>,
    clip: &ClipShape<'_>,
    options: &CropOptions,
) -> Result<Raster<T>> {
    let stack = RasterStack::from_raster(source)?;
    crop(&stack, clip, options)?.stack.into_single_band()
}

/// Flattened clip geometries, after the CRS check
fn clip_geometries(raster_crs: Option<&CRS>, clip: &ClipShape<'_>) -> Result<Vec<Geometry<f64>>> {
    let geometries: Vec<Geometry<f64>> = match clip {
        ClipShape::Features(fc) => {
            if let (Some(raster), Some(vector)) = (raster_crs, fc.crs.as_ref()) {
                if !raster.is_equivalent(vector) {
                    return Err(Error::CrsMismatch(raster.identifier(), vector.identifier()));
                }
            }
            fc.geometries().cloned().collect()
        }
        ClipShape::Geometries(g) => g.clone(),
        ClipShape::Bounds(b) => vec![Geometry::Polygon(b.to_polygon())],
    };

    let mut flat = Vec::with_capacity(geometries.len());
    for g in geometries {
        flatten(g, &mut flat);
    }
    Ok(flat)
}

fn flatten(geometry: Geometry<f64>, out: &mut Vec<Geometry<f64>>) {
    match geometry {
        Geometry::GeometryCollection(gc) => {
            for g in gc {
                flatten(g, out);
            }
        }
        other => out.push(other),
    }
}

/// Bounding box in pixel space, expanded outward to whole pixels and
/// clipped to the grid
fn pixel_window(transform: &GeoTransform, bbox: &BoundingBox, rows: usize, cols: usize) -> Result<PixelWindow> {
    let corners = [
        transform.geo_to_pixel(bbox.min_x, bbox.min_y),
        transform.geo_to_pixel(bbox.min_x, bbox.max_y),
        transform.geo_to_pixel(bbox.max_x, bbox.min_y),
        transform.geo_to_pixel(bbox.max_x, bbox.max_y),
    ];
    let (mut c0, mut r0) = (f64::INFINITY, f64::INFINITY);
    let (mut c1, mut r1) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for (c, r) in corners {
        c0 = c0.min(c);
        c1 = c1.max(c);
        r0 = r0.min(r);
        r1 = r1.max(r);
    }

    // Degenerate extents (points, axis-parallel lines) still cover one pixel
    let col_start = c0.floor();
    let row_start = r0.floor();
    let col_end = c1.ceil().max(col_start + 1.0);
    let row_end = r1.ceil().max(row_start + 1.0);

    let clamp = |v: f64, max: usize| v.max(0.0).min(max as f64) as usize;
    let (col_start, col_end) = (clamp(col_start, cols), clamp(col_end, cols));
    let (row_start, row_end) = (clamp(row_start, rows), clamp(row_end, rows));

    if col_end <= col_start || row_end <= row_start {
        return Err(Error::EmptyIntersection(
            "shape and crop extent do not overlap".into(),
        ));
    }

    Ok(PixelWindow {
        col_off: col_start,
        row_off: row_start,
        width: col_end - col_start,
        height: row_end - row_start,
    })
}

/// `true` for every window pixel that a geometry touches
fn coverage(
    transform: &GeoTransform,
    window: &PixelWindow,
    geometries: &[Geometry<f64>],
    all_touched: bool,
) -> Array2<bool> {
    let boxes: Vec<Option<BoundingBox>> = geometries
        .iter()
        .map(|g| g.bounding_rect().map(BoundingBox::from_rect))
        .collect();

    let cells: Vec<bool> = (0..window.height)
        .into_par_iter()
        .flat_map(|r| {
            let row = window.row_off + r;
            (0..window.width)
                .map(|c| {
                    let col = window.col_off + c;
                    let footprint = pixel_footprint(transform, col, row);
                    let fp_box = footprint.bounding_rect().map(BoundingBox::from_rect);
                    geometries.iter().zip(&boxes).any(|(g, gb)| {
                        let near = match (gb, &fp_box) {
                            (Some(a), Some(b)) => a.intersects(b),
                            _ => true,
                        };
                        near && pixel_hit(g, &footprint, transform, col, row, all_touched)
                    })
                })
                .collect::<Vec<_>>()
        })
        .collect();

    Array2::from_shape_vec((window.height, window.width), cells)
        .unwrap_or_else(|_| Array2::from_elem((window.height, window.width), false))
}

fn pixel_hit(
    geometry: &Geometry<f64>,
    footprint: &Polygon<f64>,
    transform: &GeoTransform,
    col: usize,
    row: usize,
    all_touched: bool,
) -> bool {
    let polygonal = matches!(
        geometry,
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) | Geometry::Rect(_) | Geometry::Triangle(_)
    );
    if all_touched || !polygonal {
        // Lines and points have no area, so they use the footprint either way
        geometry.intersects(footprint)
    } else {
        let (x, y) = transform.pixel_to_geo(col, row);
        geometry.intersects(&Point::new(x, y))
    }
}

/// Pixel footprint as a polygon, exact for rotated grids too
fn pixel_footprint(transform: &GeoTransform, col: usize, row: usize) -> Polygon<f64> {
    let corner = |c: usize, r: usize| {
        let (x, y) = transform.pixel_to_geo_corner(c, r);
        Coord { x, y }
    };
    Polygon::new(
        LineString::new(vec![
            corner(col, row),
            corner(col + 1, row),
            corner(col + 1, row + 1),
            corner(col, row + 1),
            corner(col, row),
        ]),
        vec![],
    )
}
