//! Quality-assessment (cloud, shadow, fill) masking
//!
//! Landsat and MODIS ship a per-pixel QA band whose values flag clouds,
//! shadows and fill. These helpers turn chosen QA values into a boolean mask
//! and apply it to every band of a stack.

use geolab_core::raster::{Raster, RasterElement, RasterStack};
use geolab_core::Result;
use ndarray::Array2;
use tracing::debug;

/// `true` wherever the QA value is one of `values`
pub fn make_qa_mask<Q: RasterElement>(qa: &Raster<Q>, values: &[Q]) -> Array2<bool> {
    qa.data().mapv(|v| values.contains(&v))
}

/// Mask every band of `stack` where `mask` is true, keeping existing masks
pub fn apply_mask<T: RasterElement>(stack: &RasterStack<T>, mask: &Array2<bool>) -> Result<RasterStack<T>> {
    let mut out = stack.clone();
    out.union_mask_2d(mask)?;
    debug!(masked = out.masked_count(), "applied QA mask");
    Ok(out)
}

/// [`make_qa_mask`] followed by [`apply_mask`]
pub fn make_apply_mask<T: RasterElement, Q: RasterElement>(
    stack: &RasterStack<T>,
    qa: &Raster<Q>,
    values: &[Q],
) -> Result<RasterStack<T>> {
    apply_mask(stack, &make_qa_mask(qa, values))
}
