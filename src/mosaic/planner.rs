//! Mosaic planner: reduces tile metadata to a single output raster layout.

use tracing::debug;

use super::{snap_ceil, MosaicSpec};
use crate::error::PlanError;
use crate::tile::{LatLon, TileMeta};

/// Plan the mosaic covering every tile.
///
/// The bounding box is the componentwise union of all tile corners. A
/// `pixel_size_hint` is used as given; without one the pixel size is the median
/// of the tiles' column widths, which tolerates a minority of tiles whose
/// corners disagree with the rest.
pub fn plan<'a, I>(
    metas: I,
    pixel_size_hint: Option<f64>,
    nodata: f32,
) -> Result<MosaicSpec, PlanError>
where
    I: IntoIterator<Item = &'a TileMeta>,
{
    let mut lower = LatLon::new(f64::INFINITY, f64::INFINITY);
    let mut upper = LatLon::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    let mut widths = Vec::new();

    for meta in metas {
        lower.lat = lower.lat.min(meta.lower.lat);
        lower.lon = lower.lon.min(meta.lower.lon);
        upper.lat = upper.lat.max(meta.upper.lat);
        upper.lon = upper.lon.max(meta.upper.lon);
        widths.push(meta.pixel_width());
    }

    if widths.is_empty() {
        return Err(PlanError::NoInputTiles);
    }

    let pixel_size = match pixel_size_hint {
        Some(hint) => hint,
        None => median(&mut widths).ok_or(PlanError::NoInputTiles)?,
    };
    if !(pixel_size.is_finite() && pixel_size > 0.0) {
        return Err(PlanError::InvalidPixelSize(pixel_size));
    }

    let width = snap_ceil((upper.lon - lower.lon) / pixel_size).max(1.0) as usize;
    let height = snap_ceil((upper.lat - lower.lat) / pixel_size).max(1.0) as usize;

    debug!(
        tiles = widths.len(),
        pixel_size,
        width,
        height,
        "Planned mosaic"
    );

    Ok(MosaicSpec {
        lower,
        upper,
        pixel_size,
        width,
        height,
        nodata,
    })
}

/// Median of `values`; the mean of the two middle values for even lengths.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}
