//! GeoTIFF reading and writing using GDAL

use super::GeoTiffOptions;
use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{DataType, GeoTransform, GridMetadata, Raster, RasterElement, RasterStack};
use gdal::cpl::CslStringList;
use gdal::raster::{Buffer, GdalType};
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager};
use ndarray::{s, Array3, ArrayView2, Axis};
use num_traits::{NumCast, Zero};
use std::path::Path;
use tracing::debug;

/// Read a GeoTIFF file into a Raster
///
/// # Arguments
/// * `path` - Path to the GeoTIFF file
/// * `band` - Band number (1-indexed), defaults to 1
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let dataset = Dataset::open(path.as_ref())?;
    let band_idx = band.unwrap_or(1);
    if band_idx == 0 || band_idx > dataset.raster_count() {
        return Err(Error::InvalidParameter {
            name: "band",
            value: band_idx.to_string(),
            reason: format!("dataset has {} bands (1-indexed)", dataset.raster_count()),
        });
    }

    let (cols, rows) = dataset.raster_size();
    let rasterband = dataset.rasterband(band_idx)?;
    let buffer = rasterband.read_as::<f64>((0, 0), (cols, rows), (cols, rows), None)?;

    let mut raster = Raster::from_vec(cast_samples(buffer.data()), rows, cols)?;
    raster.apply_metadata(&dataset_metadata::<T>(&dataset, 1, rasterband.no_data_value())?);
    Ok(raster)
}

/// Read every band of a GeoTIFF file
pub fn read_geotiff_stack<T, P>(path: P) -> Result<RasterStack<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let dataset = Dataset::open(path.as_ref())?;
    let (cols, rows) = dataset.raster_size();
    let count = dataset.raster_count();

    let mut data = Array3::<T>::zeros((count, rows, cols));
    let mut nodata = None;
    for b in 0..count {
        let band = dataset.rasterband(b + 1)?;
        let buffer = band.read_as::<f64>((0, 0), (cols, rows), (cols, rows), None)?;
        let values = cast_samples::<T>(buffer.data());
        let plane = ArrayView2::from_shape((rows, cols), values.as_slice())
            .map_err(|e| Error::Other(e.to_string()))?;
        data.slice_mut(s![b, .., ..]).assign(&plane);
        nodata = nodata.or(band.no_data_value());
    }

    debug!(path = %path.as_ref().display(), bands = count, rows, cols, "read GeoTIFF (GDAL)");
    RasterStack::new(data, dataset_metadata::<T>(&dataset, count, nodata)?)
}

fn cast_samples<T: RasterElement>(values: &[f64]) -> Vec<T> {
    values
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(T::default_nodata()))
        .collect()
}

fn dataset_metadata<T: RasterElement>(
    dataset: &Dataset,
    band_count: usize,
    nodata: Option<f64>,
) -> Result<GridMetadata> {
    let (width, height) = dataset.raster_size();
    let transform = dataset
        .geo_transform()
        .map(GeoTransform::from_gdal)
        .unwrap_or_default();

    // Prefer the EPSG code, keep WKT otherwise
    let crs = dataset.spatial_ref().ok().and_then(|srs| match srs.auth_code() {
        Ok(code) if code > 0 => Some(CRS::from_epsg(code as u32)),
        _ => srs.to_wkt().ok().map(CRS::from_wkt),
    });

    Ok(GridMetadata {
        crs,
        transform,
        width,
        height,
        band_count,
        dtype: T::DATA_TYPE,
        nodata,
    })
}

/// Write a Raster to a GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    write_geotiff_stack(&RasterStack::from_raster(raster)?, path, options)
}

/// Write every band of a stack to a multi-band GeoTIFF file
pub fn write_geotiff_stack<T, P>(
    stack: &RasterStack<T>,
    path: P,
    options: Option<GeoTiffOptions>,
) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let opts = options.unwrap_or_default();
    // GDAL band type follows the cell type; 64-bit integers go out as Float64
    match T::DATA_TYPE {
        DataType::U8 => write_typed::<T, u8>(stack, path, &opts)?,
        DataType::U16 => write_typed::<T, u16>(stack, path, &opts)?,
        DataType::U32 => write_typed::<T, u32>(stack, path, &opts)?,
        DataType::I8 | DataType::I16 => write_typed::<T, i16>(stack, path, &opts)?,
        DataType::I32 => write_typed::<T, i32>(stack, path, &opts)?,
        DataType::F32 => write_typed::<T, f32>(stack, path, &opts)?,
        DataType::U64 | DataType::I64 | DataType::F64 => write_typed::<T, f64>(stack, path, &opts)?,
    }

    debug!(path = %path.display(), bands = stack.band_count(), "wrote GeoTIFF (GDAL)");
    Ok(())
}

fn write_typed<T, U>(stack: &RasterStack<T>, path: &Path, opts: &GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    U: GdalType + NumCast + Copy + Zero,
{
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let (bands, rows, cols) = stack.shape();

    let mut create_options = CslStringList::new();
    create_options.set_name_value("COMPRESS", opts.compression.as_gdal())?;

    let mut dataset =
        driver.create_with_band_type_with_options::<U, _>(path, cols, rows, bands, &create_options)?;

    dataset.set_geo_transform(&stack.transform().to_gdal())?;

    if let Some(crs) = stack.crs() {
        let srs = match (crs.epsg(), crs.wkt()) {
            (Some(epsg), _) => Some(SpatialRef::from_epsg(epsg)?),
            (None, Some(wkt)) => Some(SpatialRef::from_wkt(wkt)?),
            (None, None) => crs.proj().map(SpatialRef::from_proj4).transpose()?,
        };
        if let Some(srs) = srs {
            dataset.set_spatial_ref(&srs)?;
        }
    }

    // Masked cells take the no-data value, NaN for floats without one, else zero
    let nodata = stack.metadata().nodata;
    let fill: U = nodata
        .or(T::is_float().then_some(f64::NAN))
        .and_then(num_traits::cast)
        .unwrap_or_else(U::zero);

    for (b, plane) in stack.data().axis_iter(Axis(0)).enumerate() {
        let mut band = dataset.rasterband(b + 1)?;
        if nodata.is_some() {
            band.set_no_data_value(nodata)?;
        }

        let values: Vec<U> = plane
            .indexed_iter()
            .map(|((r, c), &v)| {
                if stack.is_masked(b, r, c) {
                    fill
                } else {
                    num_traits::cast(v).unwrap_or(fill)
                }
            })
            .collect();
        let mut buffer = Buffer::new((cols, rows), values);
        band.write((0, 0), (cols, rows), &mut buffer)?;
    }
    Ok(())
}
