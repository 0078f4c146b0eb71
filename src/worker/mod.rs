//! Tile parsing workers.

pub mod pool;

pub use pool::{run_all, IndexedTile};
