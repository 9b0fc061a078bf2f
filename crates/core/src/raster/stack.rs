//! Multi-band raster type

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, GridMetadata, Raster, RasterElement};
use ndarray::{s, Array2, Array3, ArrayView2, Axis};

/// A georeferenced 3D raster laid out as (band, row, col).
///
/// The optional mask has the same shape as the data; `true` marks an
/// invalid cell. Masks are per band: masking a pixel in one band says
/// nothing about the other bands.
#[derive(Debug, Clone)]
pub struct RasterStack<T: RasterElement> {
    data: Array3<T>,
    mask: Option<Array3<bool>>,
    meta: GridMetadata,
}

impl<T: RasterElement> RasterStack<T> {
    /// Build a stack from data and metadata; the metadata is brought in line
    /// with the array (dtype) and must agree with its shape.
    pub fn new(data: Array3<T>, mut meta: GridMetadata) -> Result<Self> {
        let (bands, rows, cols) = data.dim();
        if meta.shape() != (bands, rows, cols) {
            return Err(Error::ShapeMismatch {
                expected: vec![meta.band_count, meta.height, meta.width],
                actual: vec![bands, rows, cols],
            });
        }
        meta.dtype = T::DATA_TYPE;
        Ok(Self { data, mask: None, meta })
    }

    /// Build a stack from bands that already share one geometry.
    ///
    /// Callers are expected to have validated the bands; only shapes are
    /// checked here.
    pub fn from_bands(bands: &[Raster<T>]) -> Result<Self> {
        let first = bands
            .first()
            .ok_or_else(|| Error::EmptyInput("no bands to stack".into()))?;
        let (rows, cols) = first.shape();

        let mut data = Array3::zeros((bands.len(), rows, cols));
        let mut mask: Option<Array3<bool>> = None;

        for (i, band) in bands.iter().enumerate() {
            if band.shape() != (rows, cols) {
                return Err(Error::SizeMismatch {
                    er: rows,
                    ec: cols,
                    ar: band.rows(),
                    ac: band.cols(),
                });
            }
            data.slice_mut(s![i, .., ..]).assign(band.data());
            if let Some(m) = band.mask() {
                mask.get_or_insert_with(|| Array3::from_elem((bands.len(), rows, cols), false))
                    .slice_mut(s![i, .., ..])
                    .assign(m);
            }
        }

        let mut meta = first.metadata();
        meta.band_count = bands.len();
        meta.nodata = bands
            .iter()
            .find_map(|b| b.nodata().and_then(RasterElement::to_f64));

        let mut stack = Self::new(data, meta)?;
        stack.mask = mask;
        Ok(stack)
    }

    /// One-band stack wrapping a single raster
    pub fn from_raster(raster: &Raster<T>) -> Result<Self> {
        Self::from_bands(std::slice::from_ref(raster))
    }

    // Dimensions

    pub fn band_count(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn rows(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn cols(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// Dimensions as (bands, rows, cols)
    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    // Data access

    pub fn data(&self) -> &Array3<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array3<T> {
        &mut self.data
    }

    /// View of one band (0-indexed)
    pub fn band_view(&self, band: usize) -> Result<ArrayView2<'_, T>> {
        self.check_band(band)?;
        Ok(self.data.index_axis(Axis(0), band))
    }

    /// Copy one band (0-indexed) out as a georeferenced [`Raster`]
    pub fn band(&self, band: usize) -> Result<Raster<T>> {
        let view = self.band_view(band)?;
        let mut raster = Raster::from_array(view.to_owned());
        raster.apply_metadata(&self.meta);
        if let Some(m) = &self.mask {
            raster.set_mask(Some(m.index_axis(Axis(0), band).to_owned()))?;
        }
        Ok(raster)
    }

    /// Collapse a one-band stack into a [`Raster`]; multi-band stacks are rejected
    pub fn into_single_band(self) -> Result<Raster<T>> {
        if self.band_count() != 1 {
            return Err(Error::InvalidBandCount(self.band_count()));
        }
        self.band(0)
    }

    // Mask

    pub fn mask(&self) -> Option<&Array3<bool>> {
        self.mask.as_ref()
    }

    pub fn set_mask(&mut self, mask: Option<Array3<bool>>) -> Result<()> {
        if let Some(m) = &mask {
            if m.dim() != self.shape() {
                let (b, r, c) = self.shape();
                let (mb, mr, mc) = m.dim();
                return Err(Error::ShapeMismatch {
                    expected: vec![b, r, c],
                    actual: vec![mb, mr, mc],
                });
            }
        }
        self.mask = mask;
        Ok(())
    }

    /// Set the mask bit of every band at (row, col) where `mask2d` is true,
    /// keeping bits that are already set.
    pub fn union_mask_2d(&mut self, mask2d: &Array2<bool>) -> Result<()> {
        let (bands, rows, cols) = self.shape();
        if mask2d.dim() != (rows, cols) {
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar: mask2d.nrows(),
                ac: mask2d.ncols(),
            });
        }
        let mask = self
            .mask
            .get_or_insert_with(|| Array3::from_elem((bands, rows, cols), false));
        for mut band in mask.outer_iter_mut() {
            band.zip_mut_with(mask2d, |m, &flag| *m |= flag);
        }
        Ok(())
    }

    /// Whether (band, row, col) is masked by the explicit mask
    pub fn is_masked(&self, band: usize, row: usize, col: usize) -> bool {
        self.mask
            .as_ref()
            .and_then(|m| m.get((band, row, col)).copied())
            .unwrap_or(false)
    }

    /// Number of masked cells across all bands
    pub fn masked_count(&self) -> usize {
        self.mask
            .as_ref()
            .map_or(0, |m| m.iter().filter(|&&flag| flag).count())
    }

    // Metadata

    pub fn metadata(&self) -> &GridMetadata {
        &self.meta
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.meta.transform
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.meta.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.meta.crs = crs;
    }

    /// No-data value in the cell type, if declared and representable
    pub fn nodata(&self) -> Option<T> {
        self.meta.nodata.and_then(num_traits::cast)
    }

    pub fn set_nodata(&mut self, nodata: Option<f64>) {
        self.meta.nodata = nodata;
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.meta.bounds()
    }

    fn check_band(&self, band: usize) -> Result<()> {
        if band >= self.band_count() {
            return Err(Error::InvalidParameter {
                name: "band",
                value: band.to_string(),
                reason: format!("stack has {} bands", self.band_count()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(values: Vec<u8>) -> Raster<u8> {
        let mut r = Raster::from_vec(values, 2, 2).unwrap();
        r.set_transform(GeoTransform::new(500.0, 1000.0, 10.0, -10.0));
        r.set_crs(Some(CRS::from_epsg(32613)));
        r
    }

    #[test]
    fn test_from_bands_keeps_order() {
        let stack = RasterStack::from_bands(&[band(vec![1, 2, 3, 4]), band(vec![5, 6, 7, 8])]).unwrap();

        assert_eq!(stack.shape(), (2, 2, 2));
        assert_eq!(stack.data()[(0, 1, 0)], 3);
        assert_eq!(stack.data()[(1, 0, 1)], 6);
        assert_eq!(stack.metadata().band_count, 2);
        assert_eq!(stack.crs().and_then(|c| c.epsg()), Some(32613));
    }

    #[test]
    fn test_band_roundtrip_keeps_geometry() {
        let stack = RasterStack::from_bands(&[band(vec![1, 2, 3, 4])]).unwrap();
        let back = stack.into_single_band().unwrap();
        assert_eq!(back.transform().origin_x, 500.0);
        assert_eq!(back.get(1, 1).unwrap(), 4);
    }

    #[test]
    fn test_multi_band_cannot_collapse() {
        let stack = RasterStack::from_bands(&[band(vec![0; 4]), band(vec![0; 4])]).unwrap();
        assert!(matches!(stack.into_single_band(), Err(Error::InvalidBandCount(2))));
    }

    #[test]
    fn test_shape_must_match_metadata() {
        let meta = band(vec![0; 4]).metadata();
        let data = Array3::<u8>::zeros((2, 2, 2));
        assert!(RasterStack::new(data, meta).is_err());
    }

    #[test]
    fn test_union_mask_2d_broadcasts() {
        let mut stack = RasterStack::from_bands(&[band(vec![0; 4]), band(vec![0; 4])]).unwrap();
        let mut m = Array2::from_elem((2, 2), false);
        m[(0, 1)] = true;
        stack.union_mask_2d(&m).unwrap();

        assert!(stack.is_masked(0, 0, 1));
        assert!(stack.is_masked(1, 0, 1));
        assert!(!stack.is_masked(1, 1, 1));
        assert_eq!(stack.masked_count(), 2);
    }
}
