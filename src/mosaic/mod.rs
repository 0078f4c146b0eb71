//! Mosaic planning and tile placement.

pub mod placer;
pub mod planner;

pub use placer::{place, Clip, Placement, TilePlacer, Window};
pub use planner::plan;

use crate::affine::Affine;
use crate::tile::LatLon;

/// Pixel fractions closer than this to a whole pixel are treated as whole.
/// Tile corners are decimal degrees and carry float jitter relative to the
/// pixel grid.
const SNAP_EPS: f64 = 1e-6;

/// Output raster layout shared by every tile of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct MosaicSpec {
    /// South-west corner of the union of all tiles.
    pub lower: LatLon,
    /// North-east corner of the union of all tiles.
    pub upper: LatLon,
    /// Pixel size in degrees, same in both axes.
    pub pixel_size: f64,
    pub width: usize,
    pub height: usize,
    pub nodata: f32,
}

impl MosaicSpec {
    /// Top-left corner (max latitude, min longitude).
    pub fn origin(&self) -> LatLon {
        LatLon::new(self.upper.lat, self.lower.lon)
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// North-up geotransform mapping (col, row) to (lon, lat).
    pub fn geotransform(&self) -> Affine {
        let origin = self.origin();
        Affine::north_up(origin.lon, origin.lat, self.pixel_size)
    }
}

pub(crate) fn snap_floor(v: f64) -> f64 {
    let r = v.round();
    if (v - r).abs() < SNAP_EPS {
        r
    } else {
        v.floor()
    }
}

pub(crate) fn snap_ceil(v: f64) -> f64 {
    let r = v.round();
    if (v - r).abs() < SNAP_EPS {
        r
    } else {
        v.ceil()
    }
}
