//! End-to-end conversion: parse tiles, plan the mosaic, place every tile.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::info;

use crate::config::MosaicConfig;
use crate::error::{MosaicError, PlanError, SinkError};
use crate::mosaic::{plan, MosaicSpec, TilePlacer};
use crate::sink::{GeoTiffSink, RasterSink};
use crate::worker::pool::run_all;

/// What a run produced.
#[derive(Clone, Debug, PartialEq)]
pub struct MosaicSummary {
    pub spec: MosaicSpec,
    pub tiles: usize,
    /// Tiles written without clipping.
    pub written: usize,
    /// Tiles written after trimming at the mosaic edge.
    pub clipped: usize,
    /// Tiles entirely outside the mosaic.
    pub skipped: usize,
}

/// Mosaic `inputs` into the sink returned by `create_sink`.
///
/// The sink is only created once every tile has parsed and the layout is
/// known; an empty input list fails before any parsing. Tiles are placed in
/// input order whatever the worker count, so the raster does not depend on
/// scheduling.
pub fn run_with_sink<S, F>(
    inputs: &[PathBuf],
    config: &MosaicConfig,
    create_sink: F,
) -> Result<(MosaicSummary, S), MosaicError>
where
    S: RasterSink,
    F: FnOnce(&MosaicSpec) -> Result<S, SinkError>,
{
    if inputs.is_empty() {
        return Err(PlanError::NoInputTiles.into());
    }

    let started = Instant::now();
    let mut tiles = run_all(inputs, &config.parse_options(), config.workers)?;
    tiles.sort_unstable_by_key(|t| t.index);
    info!(tiles = tiles.len(), elapsed = ?started.elapsed(), "Parsed tiles");

    let spec = plan(
        tiles.iter().map(|t| &t.tile.meta),
        config.pixel_size,
        config.nodata,
    )?;
    info!(
        width = spec.width,
        height = spec.height,
        geotransform = ?spec.geotransform().to_gdal(),
        "Planned mosaic"
    );

    let mut sink = create_sink(&spec)?;
    let placer = TilePlacer::new(&spec)?;
    let mut summary = MosaicSummary {
        spec,
        tiles: tiles.len(),
        written: 0,
        clipped: 0,
        skipped: 0,
    };
    for t in &tiles {
        let placement = placer.place(&mut sink, &t.tile.meta, t.tile.grid.view())?;
        if placement.is_empty() {
            summary.skipped += 1;
        } else if placement.clip.is_none() {
            summary.written += 1;
        } else {
            summary.clipped += 1;
        }
    }
    info!(
        written = summary.written,
        clipped = summary.clipped,
        skipped = summary.skipped,
        elapsed = ?started.elapsed(),
        "Placed tiles"
    );

    Ok((summary, sink))
}

/// Mosaic `inputs` into a GeoTIFF at `out_path`.
pub fn run(
    inputs: &[PathBuf],
    out_path: &Path,
    config: &MosaicConfig,
) -> Result<MosaicSummary, MosaicError> {
    let (summary, sink) = run_with_sink(inputs, config, |spec| GeoTiffSink::create(out_path, spec))?;
    sink.finish()?;
    Ok(summary)
}
