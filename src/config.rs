//! Run configuration.
//!
//! Values come from an optional TOML file; command-line flags override them.
//!
//! ```toml
//! sea_at_zero = true
//! workers = "auto"     # or a positive integer
//! pixel_size = 0.0000555555555556
//! nodata = -9999.0
//! ```

use std::fmt;
use std::num::NonZeroUsize;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::tile::{ParseOptions, NODATA};

/// Degree of parallelism for tile parsing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WorkerCount {
    /// One worker per available CPU.
    #[default]
    Auto,
    /// Exactly this many workers; 1 parses serially in input order.
    Fixed(NonZeroUsize),
}

impl WorkerCount {
    /// Number of worker threads this setting stands for.
    pub fn resolve(self) -> NonZeroUsize {
        match self {
            WorkerCount::Auto => std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
            WorkerCount::Fixed(n) => n,
        }
    }
}

impl FromStr for WorkerCount {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(WorkerCount::Auto);
        }
        s.parse::<NonZeroUsize>()
            .map(WorkerCount::Fixed)
            .map_err(|_| ConfigError::WorkerCount(s.to_string()))
    }
}

impl fmt::Display for WorkerCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerCount::Auto => write!(f, "auto"),
            WorkerCount::Fixed(n) => write!(f, "{n}"),
        }
    }
}

impl<'de> Deserialize<'de> for WorkerCount {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Count(u64),
            Name(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Count(n) => usize::try_from(n)
                .ok()
                .and_then(NonZeroUsize::new)
                .map(WorkerCount::Fixed)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid worker count {n}"))),
            Repr::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Options recognised by a mosaic run.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MosaicConfig {
    /// Substitute NODATA samples with 0.0.
    pub sea_at_zero: bool,
    pub workers: WorkerCount,
    /// Forced pixel size in degrees; `None` picks the median tile resolution.
    pub pixel_size: Option<f64>,
    /// NODATA sentinel used while parsing and declared in the output raster.
    pub nodata: f32,
}

impl Default for MosaicConfig {
    fn default() -> Self {
        Self {
            sea_at_zero: false,
            workers: WorkerCount::Auto,
            pixel_size: None,
            nodata: NODATA,
        }
    }
}

impl MosaicConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            sea_at_zero: self.sea_at_zero,
            nodata: self.nodata,
        }
    }
}
