//! Native GeoTIFF reading/writing (without GDAL dependency)
//!
//! Uses the `tiff` crate. Multi-band rasters are stored one page (IFD) per
//! band, each page keeping the sample type of the cell type being written;
//! chunky multi-sample pages are split into bands on read. Georeferencing is carried by the GeoTIFF model tags, the
//! CRS as an EPSG code in the GeoKeyDirectory and no-data in the GDAL_NODATA
//! ASCII tag.

use super::{Compression, GeoTiffOptions};
use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{DataType, GeoTransform, GridMetadata, Raster, RasterElement, RasterStack};
use ndarray::{Array3, Axis};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use num_traits::{NumCast, Zero};
use tiff::encoder::colortype::{
    ColorType, Gray16, Gray32, Gray32Float, Gray64, Gray64Float, Gray8, GrayI16, GrayI32, GrayI64,
    GrayI8,
};
use tiff::encoder::compression::{Compression as TiffCompression, Deflate, Lzw};
use tiff::encoder::{ImageEncoder, TiffEncoder, TiffKind, TiffValue};
use tiff::tags::Tag;
use tracing::debug;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;
const USER_DEFINED: u16 = 32767;

fn geo_tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Read one band (1-indexed, default 1) of a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let stack: RasterStack<T> = read_geotiff_stack(path)?;
    select_band(stack, band)
}

/// Read every band of a GeoTIFF file
pub fn read_geotiff_stack<T, P>(path: P) -> Result<RasterStack<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)?;
    let stack = decode_geotiff(BufReader::new(file))?;
    debug!(
        path = %path.display(),
        bands = stack.band_count(),
        rows = stack.rows(),
        cols = stack.cols(),
        "read GeoTIFF"
    );
    Ok(stack)
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
///
/// Same as `read_geotiff` but operates on a byte slice instead of a file path.
pub fn read_geotiff_from_buffer<T>(data: &[u8], band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
{
    select_band(read_geotiff_stack_from_buffer(data)?, band)
}

/// Read every band of an in-memory GeoTIFF
pub fn read_geotiff_stack_from_buffer<T>(data: &[u8]) -> Result<RasterStack<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
}

fn select_band<T: RasterElement>(stack: RasterStack<T>, band: Option<usize>) -> Result<Raster<T>> {
    match band.unwrap_or(1) {
        0 => Err(Error::InvalidParameter {
            name: "band",
            value: "0".into(),
            reason: "bands are 1-indexed".into(),
        }),
        b => stack.band(b - 1),
    }
}

/// Internal: decode every page of a GeoTIFF from any `Read + Seek` source
fn decode_geotiff<T, R>(reader: R) -> Result<RasterStack<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader)?;

    let (width, height) = decoder.dimensions()?;
    let (rows, cols) = (height as usize, width as usize);
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions { width: cols, height: rows });
    }

    // Georeferencing lives on the first page
    let transform = read_geotransform(&mut decoder).unwrap_or_default();
    let crs = read_crs(&mut decoder);
    let nodata = read_nodata(&mut decoder);

    let mut bands: Vec<Vec<T>> = Vec::new();
    loop {
        let (w, h) = decoder.dimensions()?;
        if (w as usize, h as usize) == (cols, rows) {
            let samples = decoder
                .get_tag_u32(Tag::SamplesPerPixel)
                .map(|s| s as usize)
                .unwrap_or(1)
                .max(1);
            let values = convert_samples::<T>(decoder.read_image()?)?;
            if values.len() != rows * cols * samples {
                return Err(Error::InvalidDimensions { width: cols, height: rows });
            }
            bands.extend(deinterleave(values, samples));
        } else {
            // Overviews and masks stored as extra pages have their own size
            debug!(width = w, height = h, "skipping TIFF page with different size");
        }

        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }

    let band_count = bands.len();
    let flat: Vec<T> = bands.into_iter().flatten().collect();
    let data = Array3::from_shape_vec((band_count, rows, cols), flat)
        .map_err(|e| Error::Other(e.to_string()))?;

    let meta = GridMetadata {
        crs,
        transform,
        width: cols,
        height: rows,
        band_count,
        dtype: T::DATA_TYPE,
        nodata,
    };
    RasterStack::new(data, meta)
}

fn convert_samples<T: RasterElement>(result: DecodingResult) -> Result<Vec<T>> {
    fn cast_all<S: num_traits::NumCast + Copy, T: RasterElement>(buf: Vec<S>) -> Vec<T> {
        buf.into_iter()
            .map(|v| num_traits::cast(v).unwrap_or(T::default_nodata()))
            .collect()
    }

    Ok(match result {
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::U64(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        DecodingResult::I64(buf) => cast_all(buf),
        #[allow(unreachable_patterns)]
        _ => return Err(Error::UnsupportedDataType("unsupported TIFF sample format".into())),
    })
}

/// Split pixel-interleaved samples into one buffer per sample
fn deinterleave<T: Copy>(values: Vec<T>, samples: usize) -> Vec<Vec<T>> {
    if samples == 1 {
        return vec![values];
    }
    (0..samples)
        .map(|s| values.iter().skip(s).step_by(samples).copied().collect())
        .collect()
}

/// Read GeoTransform from ModelPixelScale + ModelTiepoint, or ModelTransformation
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(geo_tag(MODEL_PIXEL_SCALE)).ok();
    let tiepoint = decoder.get_tag_f64_vec(geo_tag(MODEL_TIEPOINT)).ok();

    if let (Some(scale), Some(tiepoint)) = (&scale, &tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
        }
    }

    // 4x4 row-major model matrix
    if let Ok(t) = decoder.get_tag_f64_vec(geo_tag(MODEL_TRANSFORMATION)) {
        if t.len() >= 16 {
            return Ok(GeoTransform::from_gdal([t[3], t[0], t[1], t[7], t[4], t[5]]));
        }
    }

    Err(Error::Tiff("no georeferencing tags".into()))
}

/// Read the EPSG code out of the GeoKeyDirectory
fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder.get_tag_u32_vec(geo_tag(GEO_KEY_DIRECTORY)).ok()?;
    let find = |wanted: u16| {
        keys.get(4..)?
            .chunks_exact(4)
            .find(|entry| entry[0] == <u32 as From<u16>>::from(wanted) && entry[1] == 0)
            .map(|entry| entry[3])
            .filter(|&code| code != 0 && code != <u32 as From<u16>>::from(USER_DEFINED))
    };
    find(PROJECTED_CS_TYPE)
        .or_else(|| find(GEOGRAPHIC_TYPE))
        .map(CRS::from_epsg)
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    decoder
        .get_tag_ascii_string(geo_tag(GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok())
}

/// Write a Raster to a single-page GeoTIFF file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    write_geotiff_stack(&RasterStack::from_raster(raster)?, path, options)
}

/// Write every band of a stack to a GeoTIFF file, one page per band
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
    let mut writer = BufWriter::new(File::create(path)?);
    encode_geotiff(stack, &mut writer, &options.unwrap_or_default())?;
    writer.flush()?;
    debug!(path = %path.display(), bands = stack.band_count(), "wrote GeoTIFF");
    Ok(())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>, options: Option<GeoTiffOptions>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    write_geotiff_stack_to_buffer(&RasterStack::from_raster(raster)?, options)
}

/// Write a stack to an in-memory GeoTIFF buffer
pub fn write_geotiff_stack_to_buffer<T>(
    stack: &RasterStack<T>,
    options: Option<GeoTiffOptions>,
) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(stack, Cursor::new(&mut buf), &options.unwrap_or_default())?;
    Ok(buf)
}

/// Internal: encode a stack as GeoTIFF into any `Write + Seek` sink
fn encode_geotiff<T, W>(stack: &RasterStack<T>, writer: W, options: &GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    match T::DATA_TYPE {
        DataType::U8 => encode_pages::<Gray8, T, W>(stack, writer, options),
        DataType::U16 => encode_pages::<Gray16, T, W>(stack, writer, options),
        DataType::U32 => encode_pages::<Gray32, T, W>(stack, writer, options),
        DataType::U64 => encode_pages::<Gray64, T, W>(stack, writer, options),
        DataType::I8 => encode_pages::<GrayI8, T, W>(stack, writer, options),
        DataType::I16 => encode_pages::<GrayI16, T, W>(stack, writer, options),
        DataType::I32 => encode_pages::<GrayI32, T, W>(stack, writer, options),
        DataType::I64 => encode_pages::<GrayI64, T, W>(stack, writer, options),
        DataType::F32 => encode_pages::<Gray32Float, T, W>(stack, writer, options),
        DataType::F64 => encode_pages::<Gray64Float, T, W>(stack, writer, options),
    }
}

fn encode_pages<C, T, W>(stack: &RasterStack<T>, writer: W, options: &GeoTiffOptions) -> Result<()>
where
    C: ColorType,
    C::Inner: NumCast + Zero + Copy,
    [C::Inner]: TiffValue,
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer)?;
    let (_, rows, cols) = stack.shape();
    let (w, h) = (cols as u32, rows as u32);

    // Masked cells take the declared no-data value, else NaN (floats) or zero
    let fill: C::Inner = stack
        .metadata()
        .nodata
        .or(T::is_float().then_some(f64::NAN))
        .and_then(NumCast::from)
        .unwrap_or_else(<C::Inner as Zero>::zero);

    for (b, band) in stack.data().axis_iter(Axis(0)).enumerate() {
        let samples: Vec<C::Inner> = band
            .indexed_iter()
            .map(|((r, c), &v)| {
                if stack.is_masked(b, r, c) {
                    fill
                } else {
                    NumCast::from(v).unwrap_or(fill)
                }
            })
            .collect();

        match options.compression {
            Compression::None => {
                let image = encoder.new_image::<C>(w, h)?;
                write_page(image, stack.metadata(), &samples)?
            }
            Compression::Deflate => {
                let image = encoder.new_image_with_compression::<C, _>(w, h, Deflate::default())?;
                write_page(image, stack.metadata(), &samples)?
            }
            Compression::Lzw => {
                let image = encoder.new_image_with_compression::<C, _>(w, h, Lzw::default())?;
                write_page(image, stack.metadata(), &samples)?
            }
        }
    }
    Ok(())
}

fn write_page<W, C, K, D>(
    mut image: ImageEncoder<'_, W, C, K, D>,
    meta: &GridMetadata,
    samples: &[C::Inner],
) -> Result<()>
where
    W: Write + Seek,
    C: ColorType,
    [C::Inner]: TiffValue,
    K: TiffKind,
    D: TiffCompression,
{
    let gt = &meta.transform;
    let dir = image.encoder();

    if gt.is_rotated() {
        let matrix = [
            gt.pixel_width, gt.row_rotation, 0.0, gt.origin_x,
            gt.col_rotation, gt.pixel_height, 0.0, gt.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        dir.write_tag(geo_tag(MODEL_TRANSFORMATION), &matrix[..])?;
    } else {
        let scale = [gt.pixel_width, -gt.pixel_height, 0.0];
        dir.write_tag(geo_tag(MODEL_PIXEL_SCALE), &scale[..])?;
        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        dir.write_tag(geo_tag(MODEL_TIEPOINT), &tiepoint[..])?;
    }

    let geokeys = geokey_directory(meta.crs.as_ref());
    dir.write_tag(geo_tag(GEO_KEY_DIRECTORY), geokeys.as_slice())?;

    if let Some(nodata) = meta.nodata {
        let text = format_nodata(nodata);
        dir.write_tag(geo_tag(GDAL_NODATA), text.as_str())?;
    }

    image.write_data(samples)?;
    Ok(())
}

/// GeoKeyDirectory: model type, raster type (PixelIsArea) and the EPSG code
fn geokey_directory(crs: Option<&CRS>) -> Vec<u16> {
    let epsg = crs.and_then(|c| c.epsg()).and_then(|code| u16::try_from(code).ok());
    let geographic = crs.is_some_and(|c| c.is_geographic());

    let mut keys: Vec<[u16; 4]> = vec![
        [GT_MODEL_TYPE, 0, 1, if geographic { 2 } else { 1 }],
        [GT_RASTER_TYPE, 0, 1, 1],
    ];
    if let Some(code) = epsg {
        let key = if geographic { GEOGRAPHIC_TYPE } else { PROJECTED_CS_TYPE };
        keys.push([key, 0, 1, code]);
    }

    let mut out = vec![1, 1, 0, keys.len() as u16];
    out.extend(keys.into_iter().flatten());
    out
}

fn format_nodata(nodata: f64) -> String {
    if nodata.is_nan() {
        "nan".to_string()
    } else {
        nodata.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn sample(values: Vec<f32>) -> Raster<f32> {
        let mut r = Raster::from_vec(values, 2, 3).unwrap();
        r.set_transform(GeoTransform::new(470_000.0, 4_440_000.0, 30.0, -30.0));
        r.set_crs(Some(CRS::from_epsg(32613)));
        r
    }

    #[test]
    fn test_buffer_roundtrip_keeps_georeferencing() {
        let mut raster = sample(vec![1.0, 2.0, 3.0, 4.0, 5.0, -9999.0]);
        raster.set_nodata(Some(-9999.0));

        let buf = write_geotiff_to_buffer(&raster, None).unwrap();
        let back: Raster<f32> = read_geotiff_from_buffer(&buf, None).unwrap();

        assert_eq!(back.shape(), (2, 3));
        assert_relative_eq!(back.get(1, 1).unwrap(), 5.0);
        assert_eq!(back.transform(), raster.transform());
        assert_eq!(back.crs().and_then(|c| c.epsg()), Some(32613));
        assert_eq!(back.nodata(), Some(-9999.0));
        assert!(back.is_nodata_at(1, 2).unwrap());
    }

    #[test]
    fn test_stack_pages_roundtrip_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stack.tif");
        let bands = [sample(vec![1.0; 6]), sample(vec![2.0; 6]), sample(vec![3.0; 6])];
        let stack = RasterStack::from_bands(&bands).unwrap();

        write_geotiff_stack(&stack, &path, Some(GeoTiffOptions { compression: Compression::Deflate }))
            .unwrap();
        let back: RasterStack<f64> = read_geotiff_stack(&path).unwrap();

        assert_eq!(back.shape(), (3, 2, 3));
        assert_relative_eq!(back.data()[(2, 1, 2)], 3.0);

        let second: Raster<f64> = read_geotiff(&path, Some(2)).unwrap();
        assert_relative_eq!(second.get(0, 0).unwrap(), 2.0);
    }

    #[test]
    fn test_masked_cells_written_as_nan_without_nodata() {
        let mut raster = sample(vec![1.0; 6]);
        let mut mask = ndarray::Array2::from_elem((2, 3), false);
        mask[(0, 0)] = true;
        raster.set_mask(Some(mask)).unwrap();

        let buf = write_geotiff_to_buffer(&raster, None).unwrap();
        let back: Raster<f32> = read_geotiff_from_buffer(&buf, None).unwrap();
        assert!(back.get(0, 0).unwrap().is_nan());
        assert!(back.is_masked(0, 0).unwrap());
    }

    #[test]
    fn test_f64_samples_keep_full_precision() {
        let mut raster: Raster<f64> =
            Raster::from_vec(vec![0.123456789012345, 16_777_217.0], 1, 2).unwrap();
        raster.set_transform(GeoTransform::new(0.0, 2.0, 1.0, -1.0));

        let buf = write_geotiff_to_buffer(&raster, None).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&buf, None).unwrap();
        assert_eq!(back.get(0, 0).unwrap(), 0.123456789012345);
        assert_eq!(back.get(0, 1).unwrap(), 16_777_217.0);
    }

    #[test]
    fn test_integer_samples_are_exact() {
        let mut raster: Raster<i32> = Raster::from_vec(vec![16_777_217, 1, -5, 0], 2, 2).unwrap();
        raster.set_nodata(Some(-5));

        let buf = write_geotiff_to_buffer(
            &raster,
            Some(GeoTiffOptions { compression: Compression::Lzw }),
        )
        .unwrap();
        let back: Raster<i32> = read_geotiff_from_buffer(&buf, None).unwrap();
        assert_eq!(back.get(0, 0).unwrap(), 16_777_217);
        assert_eq!(back.get(0, 1).unwrap(), 1);
        assert!(back.is_nodata_at(1, 0).unwrap());

        let mut decoder = Decoder::new(Cursor::new(&buf)).unwrap();
        assert!(matches!(decoder.read_image().unwrap(), DecodingResult::I32(_)));
    }

    #[test]
    fn test_masked_u8_cells_take_nodata() {
        let mut raster: Raster<u8> = Raster::from_vec(vec![10, 20, 30, 40], 2, 2).unwrap();
        raster.set_nodata(Some(255));
        let mut mask = ndarray::Array2::from_elem((2, 2), false);
        mask[(1, 1)] = true;
        raster.set_mask(Some(mask)).unwrap();

        let buf = write_geotiff_to_buffer(&raster, None).unwrap();
        let back: Raster<u8> = read_geotiff_from_buffer(&buf, None).unwrap();
        assert_eq!(back.get(0, 1).unwrap(), 20);
        assert_eq!(back.get(1, 1).unwrap(), 255);
    }

    #[test]
    fn test_rotated_transform_roundtrip() {
        let mut raster = sample(vec![1.0; 6]);
        let rotated = GeoTransform::from_gdal([1000.0, 10.0, 2.0, 5000.0, 1.5, -10.0]);
        raster.set_transform(rotated);

        let buf = write_geotiff_to_buffer(&raster, None).unwrap();
        let back: Raster<f32> = read_geotiff_from_buffer(&buf, None).unwrap();
        assert_eq!(back.transform(), &rotated);
        assert!(back.transform().is_rotated());
    }

    #[test]
    fn test_band_zero_rejected() {
        let buf = write_geotiff_to_buffer(&sample(vec![0.0; 6]), None).unwrap();
        assert!(read_geotiff_from_buffer::<f32>(&buf, Some(0)).is_err());
        assert!(read_geotiff_from_buffer::<f32>(&buf, Some(2)).is_err());
    }

    #[test]
    fn test_geographic_crs_key() {
        let keys = geokey_directory(Some(&CRS::wgs84()));
        assert_eq!(keys[3], 3);
        assert!(keys.chunks(4).any(|k| k == [GEOGRAPHIC_TYPE, 0, 1, 4326]));
    }

    #[test]
    fn test_deinterleave() {
        let bands = deinterleave(vec![1, 10, 2, 20, 3, 30], 2);
        assert_eq!(bands, vec![vec![1, 2, 3], vec![10, 20, 30]]);
    }
}
