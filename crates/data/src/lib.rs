//! # geolab Data
//!
//! Named example datasets for the course material, downloaded on demand
//! into a local data directory. Archives are extracted into a directory
//! named after the dataset entry; a target that already exists is returned
//! without touching the network unless replacement is requested.

mod archive;
pub mod error;
pub mod registry;
mod store;

pub use archive::extract;
pub use error::{DataError, Result};
pub use registry::{DataEntry, DataKind};
pub use store::{DataStore, FetchOptions, DATA_DIR_ENV};
