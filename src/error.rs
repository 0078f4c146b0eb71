use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MosaicError {
    #[error("Tile error: {0}")]
    Tile(#[from] TileError),

    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    #[error("Raster sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("Invalid affine transform: {0}")]
    Affine(String),

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Per-tile failures. All of these abort the whole run.
#[derive(Error, Debug)]
pub enum TileError {
    #[error("{path}: cannot read tile document: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: missing required field `{field}`")]
    MissingRequiredField { path: PathBuf, field: &'static str },

    #[error("{path}: malformed `{field}` value {value:?}")]
    MalformedField {
        path: PathBuf,
        field: &'static str,
        value: String,
    },

    #[error("{path}: upper corner is not north-east of lower corner")]
    DegenerateCoverage { path: PathBuf },
}

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Invalid input pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Cannot read archive {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot extract archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("No input tiles")]
    NoInputTiles,

    #[error("Invalid pixel size: {0}")]
    InvalidPixelSize(f64),
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Cannot create output raster {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write output raster {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid raster size {width}x{height}")]
    InvalidSize { width: usize, height: usize },

    #[error("Block {rows}x{cols} at ({x}, {y}) exceeds raster {width}x{height}")]
    OutOfBounds {
        x: usize,
        y: usize,
        rows: usize,
        cols: usize,
        width: usize,
        height: usize,
    },

    #[error("TIFF encoding failed: {0}")]
    Encode(#[from] tiff::TiffError),

    #[error("Cannot persist output raster: {0}")]
    Persist(#[from] tempfile::PersistError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid worker count: {0}")]
    WorkerCount(String),
}
