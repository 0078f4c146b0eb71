//! Parallel tile parsing.
//!
//! Tiles are dispatched to a fixed-size rayon pool in input order. Each task owns its tile
//! from open to reshape and reports back over a channel; the scope is the join
//! barrier. After the first failure the remaining queued tasks return without
//! parsing, while tasks already running are left to finish.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use tracing::{debug, info};

use crate::config::WorkerCount;
use crate::error::{MosaicError, TileError};
use crate::tile::{parse_tile, ParseOptions, ParsedTile};

/// A parsed tile tagged with its position in the input list.
#[derive(Clone, Debug)]
pub struct IndexedTile {
    pub index: usize,
    pub tile: ParsedTile,
}

/// Parse every tile. Results come back in completion order; use the index to
/// restore input order.
pub fn run_all(
    tiles: &[PathBuf],
    opts: &ParseOptions,
    workers: WorkerCount,
) -> Result<Vec<IndexedTile>, MosaicError> {
    let threads = workers.resolve().get().min(tiles.len().max(1));
    info!(tiles = tiles.len(), threads, "Parsing tiles");
    if threads == 1 {
        return Ok(run_serial(tiles, opts)?);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("tile-worker-{i}"))
        .build()?;
    Ok(run_on_pool(&pool, tiles, opts)?)
}

/// Parse tiles one after another in input order, stopping at the first error.
pub fn run_serial(tiles: &[PathBuf], opts: &ParseOptions) -> Result<Vec<IndexedTile>, TileError> {
    tiles
        .iter()
        .enumerate()
        .map(|(index, path)| Ok(IndexedTile { index, tile: parse_tile(path, opts)? }))
        .collect()
}

/// Parse tiles on an existing pool.
pub fn run_on_pool(
    pool: &rayon::ThreadPool,
    tiles: &[PathBuf],
    opts: &ParseOptions,
) -> Result<Vec<IndexedTile>, TileError> {
    let parsed = dispatch(pool, tiles.len(), |index| parse_tile(&tiles[index], opts))?;
    Ok(parsed
        .into_iter()
        .map(|(index, tile)| IndexedTile { index, tile })
        .collect())
}

/// Run `task(i)` for every `i` in `0..count`, started in index order.
///
/// Once a task fails, tasks that have not started yet return without running.
fn dispatch<T, E, F>(pool: &rayon::ThreadPool, count: usize, task: F) -> Result<Vec<(usize, T)>, E>
where
    T: Send,
    E: Send,
    F: Fn(usize) -> Result<T, E> + Sync,
{
    let (tx, rx) = mpsc::channel();
    let failed = AtomicBool::new(false);

    pool.scope_fifo(|s| {
        for index in 0..count {
            let tx = tx.clone();
            let failed = &failed;
            let task = &task;
            s.spawn_fifo(move |_| {
                if failed.load(Ordering::Acquire) {
                    debug!(index, "Skipping tile after earlier failure");
                    return;
                }
                let result = task(index);
                if result.is_err() {
                    failed.store(true, Ordering::Release);
                }
                // The receiver outlives the scope.
                let _ = tx.send((index, result));
            });
        }
    });
    drop(tx);

    rx.into_iter()
        .map(|(index, result)| result.map(|value| (index, value)))
        .collect()
}
