//! End-to-end file pipeline: write band files, stack them, crop the stack
//! to a field boundary, compute NDVI and shade a DEM.

use approx::assert_relative_eq;
use geo_types::{polygon, Geometry};
use geolab_algorithms::cropping::{crop, ClipShape, CropOptions};
use geolab_algorithms::imagery::ndvi;
use geolab_algorithms::stacking::{stack, StackOptions};
use geolab_algorithms::terrain::{hillshade_stack, HillshadeParams};
use geolab_algorithms::vector::clip;
use geolab_core::io::{read_geojson, read_geotiff_stack, write_geojson, write_geotiff};
use geolab_core::vector::{AttributeValue, Feature, FeatureCollection};
use geolab_core::{GeoTransform, Raster, CRS};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SIZE: usize = 20;
const ORIGIN_X: f64 = 500_000.0;
const ORIGIN_Y: f64 = 4_200_000.0;
const CELL: f64 = 30.0;

fn band(f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
    let mut r = Raster::new(SIZE, SIZE);
    r.set_transform(GeoTransform::new(ORIGIN_X, ORIGIN_Y, CELL, -CELL));
    r.set_crs(Some(CRS::from_epsg(32613)));
    r.set_nodata(Some(-9999.0));
    for row in 0..SIZE {
        for col in 0..SIZE {
            r.set(row, col, f(row, col)).unwrap();
        }
    }
    r
}

fn write_bands(dir: &Path) -> Vec<PathBuf> {
    let bands = [
        ("red.tif", band(|_, c| 100.0 + c as f64)),
        ("green.tif", band(|_, _| 150.0)),
        ("nir.tif", band(|r, _| 300.0 + r as f64)),
    ];
    bands
        .iter()
        .map(|(name, raster)| {
            let path = dir.join(name);
            write_geotiff(raster, &path, None).unwrap();
            path
        })
        .collect()
}

/// Map coordinates of a pixel corner
fn corner(col: usize, row: usize) -> (f64, f64) {
    (ORIGIN_X + col as f64 * CELL, ORIGIN_Y - row as f64 * CELL)
}

/// Triangle over the top-left half of pixels rows 5..15, cols 5..15
fn field() -> FeatureCollection {
    let (x0, y0) = corner(5, 5);
    let (x1, y1) = corner(15, 15);
    let mut fc = FeatureCollection::with_crs(Some(CRS::from_epsg(32613)));
    let mut f = Feature::new(Geometry::Polygon(polygon![
        (x: x0, y: y0),
        (x: x1, y: y0),
        (x: x0, y: y1),
        (x: x0, y: y0),
    ]));
    f.set_property("field", AttributeValue::String("north".into()));
    fc.push(f);
    fc
}

#[test]
fn stack_crop_ndvi() {
    let dir = TempDir::new().unwrap();
    let sources = write_bands(dir.path());
    let out = dir.path().join("stack.tif");

    let stacked = stack::<f64, _>(
        &sources,
        &StackOptions {
            output: Some(out.clone()),
            mask_nodata: true,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(stacked.written.as_deref(), Some(out.as_path()));
    assert_eq!(stacked.stack.shape(), (3, SIZE, SIZE));

    let reread = read_geotiff_stack::<f64, _>(&out).unwrap();
    assert_eq!(reread.shape(), (3, SIZE, SIZE));
    assert_eq!(reread.crs().and_then(|c| c.epsg()), Some(32613));
    assert_relative_eq!(reread.data()[[2, 7, 0]], 307.0);

    // The GeoJSON goes through a file as it would in a workflow
    let boundary_path = dir.path().join("field.geojson");
    write_geojson(&field(), &boundary_path).unwrap();
    let boundary = read_geojson(&boundary_path).unwrap();

    let cropped = crop(
        &reread,
        &ClipShape::Features(&boundary),
        &CropOptions { all_touched: false },
    )
    .unwrap();
    assert_eq!(cropped.window.width, 10);
    assert_eq!(cropped.window.height, 10);
    assert_eq!(cropped.stack.shape(), (3, 10, 10));
    let (x, y) = corner(5, 5);
    assert_relative_eq!(cropped.stack.transform().origin_x, x);
    assert_relative_eq!(cropped.stack.transform().origin_y, y);

    // Bottom-right pixel centre falls outside the triangle
    assert!(cropped.stack.is_masked(0, 9, 9));
    assert!(!cropped.stack.is_masked(0, 0, 0));

    let index = ndvi(&cropped.stack.band(2).unwrap(), &cropped.stack.band(0).unwrap()).unwrap();
    assert_relative_eq!(index.get(0, 0).unwrap(), 200.0 / 410.0, epsilon = 1e-9);
    assert!(index.get(9, 9).unwrap().is_nan());
    assert!(index.is_masked(9, 9).unwrap());
}

#[test]
fn mismatched_source_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let mut sources = write_bands(dir.path());

    let mut shifted = band(|_, _| 1.0);
    shifted.set_transform(GeoTransform::new(ORIGIN_X + CELL, ORIGIN_Y, CELL, -CELL));
    let odd = dir.path().join("shifted.tif");
    write_geotiff(&shifted, &odd, None).unwrap();
    sources.push(odd);

    let out = dir.path().join("stack.tif");
    let result = stack::<f64, _>(
        &sources,
        &StackOptions {
            output: Some(out.clone()),
            ..Default::default()
        },
    );
    assert!(result.is_err());
    assert!(!out.exists());
}

#[test]
fn dem_hillshade_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dem.tif");
    let dem = band(|r, c| 1500.0 + 10.0 * r as f64 + 5.0 * c as f64);
    write_geotiff(&dem, &path, None).unwrap();

    let reread = read_geotiff_stack::<f64, _>(&path).unwrap();
    let shaded = hillshade_stack(&reread, HillshadeParams::default()).unwrap();

    assert_eq!(shaded.shape(), (SIZE, SIZE));
    for &v in shaded.data().iter() {
        assert!(v.is_finite() && (0.0..=255.0).contains(&v));
    }
    // A plane shades uniformly away from the edges
    assert_relative_eq!(shaded.get(3, 4).unwrap(), shaded.get(10, 10).unwrap(), epsilon = 1e-9);
    assert!(!shaded.is_masked(0, 0).unwrap());

    let out = dir.path().join("hillshade.tif");
    write_geotiff(&shaded, &out, None).unwrap();
    assert!(out.exists());
}

#[test]
fn clip_field_points() {
    let mut samples = FeatureCollection::with_crs(Some(CRS::from_epsg(32613)));
    let (x, y) = corner(6, 6);
    let (far_x, far_y) = corner(14, 14);
    for (id, (px, py)) in [(x, y), (far_x, far_y)].into_iter().enumerate() {
        let mut f = Feature::new(Geometry::Point(geo_types::Point::new(px, py)));
        f.set_property("sample", AttributeValue::Int(id as i64));
        samples.push(f);
    }

    let kept = clip(&samples, &field()).unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept.features[0].get_property("sample"), Some(&AttributeValue::Int(0)));
}
