//! Raster sinks: destinations for placed tile blocks.

pub mod geotiff;

use ndarray::{s, Array2, ArrayView2};

pub use geotiff::GeoTiffSink;

use crate::error::SinkError;
use crate::mosaic::MosaicSpec;

/// Destination of the mosaic. Accessed from a single writer only.
pub trait RasterSink {
    /// (width, height) in pixels.
    fn size(&self) -> (usize, usize);

    /// Copy `block` into the raster with its first sample at pixel `offset` (x, y).
    fn write_block(&mut self, offset: (usize, usize), block: ArrayView2<'_, f32>)
        -> Result<(), SinkError>;
}

/// Whole-raster in-memory buffer, initialised to NODATA.
#[derive(Clone, Debug)]
pub struct MemorySink {
    data: Array2<f32>,
}

impl MemorySink {
    /// Allocate a `width x height` raster. Sizes that cannot be allocated are
    /// reported as [`SinkError::InvalidSize`].
    pub fn new(width: usize, height: usize, nodata: f32) -> Result<Self, SinkError> {
        let invalid = || SinkError::InvalidSize { width, height };
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        let len = width.checked_mul(height).ok_or_else(invalid)?;
        let mut samples = Vec::new();
        samples.try_reserve_exact(len).map_err(|_| invalid())?;
        samples.resize(len, nodata);
        Ok(Self {
            data: Array2::from_shape_vec((height, width), samples).map_err(|_| invalid())?,
        })
    }

    pub fn for_spec(spec: &MosaicSpec) -> Result<Self, SinkError> {
        Self::new(spec.width, spec.height, spec.nodata)
    }

    /// Raster samples, shape (height, width).
    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn into_data(self) -> Array2<f32> {
        self.data
    }
}

impl RasterSink for MemorySink {
    fn size(&self) -> (usize, usize) {
        let (height, width) = self.data.dim();
        (width, height)
    }

    fn write_block(
        &mut self,
        offset: (usize, usize),
        block: ArrayView2<'_, f32>,
    ) -> Result<(), SinkError> {
        let (x, y) = offset;
        let (rows, cols) = block.dim();
        let (width, height) = self.size();
        let fits = x.checked_add(cols).is_some_and(|end| end <= width)
            && y.checked_add(rows).is_some_and(|end| end <= height);
        if !fits {
            return Err(SinkError::OutOfBounds {
                x,
                y,
                rows,
                cols,
                width,
                height,
            });
        }
        self.data
            .slice_mut(s![y..y + rows, x..x + cols])
            .assign(&block);
        Ok(())
    }
}
