//! Mosaic GSI Fundamental Geospatial Data DEM tiles into a single GeoTIFF.

pub mod affine;
pub mod config;
pub mod convert;
pub mod error;
pub mod inputs;
pub mod mosaic;
pub mod sink;
pub mod tile;
pub mod worker;

pub use config::{MosaicConfig, WorkerCount};
pub use convert::{run, run_with_sink, MosaicSummary};
pub use error::MosaicError;
pub use inputs::expand_inputs;
