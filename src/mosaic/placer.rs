//! Tile placer: maps each tile grid into the mosaic and writes the overlap.

use ndarray::{s, ArrayView2};
use tracing::debug;

use super::{snap_floor, MosaicSpec};
use crate::affine::Affine;
use crate::error::{MosaicError, SinkError};
use crate::sink::RasterSink;
use crate::tile::TileMeta;

/// Samples trimmed from each side of a tile grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Clip {
    pub left: usize,
    pub top: usize,
    pub right: usize,
    pub bottom: usize,
}

impl Clip {
    pub fn is_none(&self) -> bool {
        *self == Clip::default()
    }
}

/// The part of a tile that lands inside the mosaic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    /// Tile grid bounds (row_start, row_end, col_start, col_end), end-exclusive.
    pub src_slice: (usize, usize, usize, usize),
    /// Mosaic pixel (x, y) receiving `src_slice`'s first sample.
    pub dst_offset: (usize, usize),
}

impl Window {
    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        let (r0, r1, c0, c1) = self.src_slice;
        (r1 - r0, c1 - c0)
    }
}

/// Where one tile goes in the mosaic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    /// Unclipped mosaic pixel (x, y) of the tile's top-left sample.
    pub offset: (i64, i64),
    pub clip: Clip,
    /// `None` when the tile lies entirely outside the mosaic.
    pub window: Option<Window>,
}

impl Placement {
    pub fn is_empty(&self) -> bool {
        self.window.is_none()
    }
}

/// Places tiles into one mosaic. Holds the inverse geotransform so it is
/// computed once per run.
#[derive(Clone, Debug)]
pub struct TilePlacer {
    to_pixel: Affine,
    width: i64,
    height: i64,
}

impl TilePlacer {
    pub fn new(spec: &MosaicSpec) -> Result<Self, MosaicError> {
        Ok(Self {
            to_pixel: spec.geotransform().inverse()?,
            width: spec.width as i64,
            height: spec.height as i64,
        })
    }

    /// Compute the placement of a `(rows, cols)` grid described by `meta`.
    ///
    /// The column offset comes from the tile's west edge (`lower.lon`), not
    /// from `upper.lon`. Samples run west to east, so the first sample of a
    /// row sits on the west edge, and only that anchor lets horizontally
    /// adjacent tiles abut without a gap or overlap.
    pub fn placement(&self, meta: &TileMeta, shape: (usize, usize)) -> Placement {
        // Top-left sample sits at the tile's north-west corner.
        let (col, row) = self.to_pixel.forward(meta.lower.lon, meta.upper.lat);
        let x = snap_floor(col) as i64;
        let y = snap_floor(row) as i64;
        let rows = shape.0 as i64;
        let cols = shape.1 as i64;

        let left = (-x).clamp(0, cols);
        let top = (-y).clamp(0, rows);
        let right = (x + cols - self.width).clamp(0, cols);
        let bottom = (y + rows - self.height).clamp(0, rows);
        let clip = Clip {
            left: left as usize,
            top: top as usize,
            right: right as usize,
            bottom: bottom as usize,
        };

        let window = (left + right < cols && top + bottom < rows).then(|| Window {
            src_slice: (
                top as usize,
                (rows - bottom) as usize,
                left as usize,
                (cols - right) as usize,
            ),
            dst_offset: ((x + left) as usize, (y + top) as usize),
        });

        Placement {
            offset: (x, y),
            clip,
            window,
        }
    }

    /// Write the overlapping part of `grid` to `sink`.
    ///
    /// Overlapping tiles are not merged: whichever tile is written last wins.
    pub fn place<S: RasterSink + ?Sized>(
        &self,
        sink: &mut S,
        meta: &TileMeta,
        grid: ArrayView2<'_, f32>,
    ) -> Result<Placement, SinkError> {
        let placement = self.placement(meta, grid.dim());
        match placement.window {
            Some(window) => {
                let (r0, r1, c0, c1) = window.src_slice;
                sink.write_block(window.dst_offset, grid.slice(s![r0..r1, c0..c1]))?;
                if !placement.clip.is_none() {
                    debug!(mesh_id = meta.mesh_id, clip = ?placement.clip, "Tile clipped at mosaic edge");
                }
            }
            None => {
                debug!(mesh_id = meta.mesh_id, offset = ?placement.offset, "Tile outside mosaic, skipped");
            }
        }
        Ok(placement)
    }
}

/// Place a single tile into `sink`.
pub fn place<S: RasterSink + ?Sized>(
    sink: &mut S,
    spec: &MosaicSpec,
    meta: &TileMeta,
    grid: ArrayView2<'_, f32>,
) -> Result<Placement, MosaicError> {
    Ok(TilePlacer::new(spec)?.place(sink, meta, grid)?)
}
