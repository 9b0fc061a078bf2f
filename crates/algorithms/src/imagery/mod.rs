//! Imagery analysis algorithms
//!
//! - Spectral indices: normalized difference, NDVI, NDWI, MNDWI, NBR
//! - Byte scaling for display
//! - QA/cloud masking

mod bytescale;
mod indices;
mod qa_mask;

pub use bytescale::{bytescale, BytescaleParams};
pub use indices::{
    mndwi, nbr, ndvi, ndwi, normalized_difference, normalized_difference_stack, SpectralIndex,
};
pub use qa_mask::{apply_mask, make_apply_mask, make_qa_mask};
