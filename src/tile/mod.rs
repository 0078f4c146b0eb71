//! Tile documents: metadata, elevation grids and the streaming parser.

pub mod parser;
pub mod samples;

#[cfg(test)]
pub(crate) mod fixtures;

use ndarray::Array2;

pub use parser::{parse_reader, parse_tile};

/// Default NODATA sentinel for elevation samples.
pub const NODATA: f32 = -9999.0;

/// A geographic point in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Geometry of one tile.
#[derive(Clone, Debug, PartialEq)]
pub struct TileMeta {
    /// Mesh code from the identifier record, 0 when absent or unparsable.
    pub mesh_id: u64,
    /// South-west corner.
    pub lower: LatLon,
    /// North-east corner.
    pub upper: LatLon,
    /// (rows, cols) of the elevation grid.
    pub grid_size: (usize, usize),
}

impl TileMeta {
    pub fn rows(&self) -> usize {
        self.grid_size.0
    }

    pub fn cols(&self) -> usize {
        self.grid_size.1
    }

    /// Longitude span of one sample column.
    pub fn pixel_width(&self) -> f64 {
        (self.upper.lon - self.lower.lon) / self.cols() as f64
    }
}

/// Options shared by every parse in a run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParseOptions {
    /// Replace NODATA samples with 0.0 (sea level).
    pub sea_at_zero: bool,
    /// Sentinel written for missing or malformed samples.
    pub nodata: f32,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            sea_at_zero: false,
            nodata: NODATA,
        }
    }
}

/// One fully parsed tile document.
#[derive(Clone, Debug)]
pub struct ParsedTile {
    pub meta: TileMeta,
    /// Row-major samples, shape == `meta.grid_size`.
    pub grid: Array2<f32>,
}

impl ParsedTile {
    pub fn mesh_id(&self) -> u64 {
        self.meta.mesh_id
    }
}
