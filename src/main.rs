use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use gsi_dem_mosaic::{expand_inputs, run, MosaicConfig, MosaicError, WorkerCount};
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

/// Mosaic GSI DEM tile documents (FG-GML *.xml) into one float32 GeoTIFF.
#[derive(Parser, Debug)]
#[command(name = "gsi-dem-convert", version, about, long_about = None)]
struct Cli {
    /// Tile files, directories or glob patterns
    #[arg(required = true)]
    inputs: Vec<String>,
    /// Output GeoTIFF path
    #[arg(short, long)]
    out: PathBuf,
    /// Write sea (NODATA) samples as 0.0
    #[arg(long)]
    sea_at_zero: bool,
    /// Parser threads: "auto" or a positive count
    #[arg(short, long)]
    workers: Option<WorkerCount>,
    /// Output pixel size in degrees (default: median tile resolution)
    #[arg(long)]
    pixel_size: Option<f64>,
    /// NODATA value
    #[arg(long, allow_negative_numbers = true)]
    nodata: Option<f32>,
    /// TOML file with defaults for the options above
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> Result<MosaicConfig, MosaicError> {
        let mut config = match &self.config {
            Some(path) => MosaicConfig::from_toml_file(path)?,
            None => MosaicConfig::default(),
        };
        config.sea_at_zero |= self.sea_at_zero;
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(pixel_size) = self.pixel_size {
            config.pixel_size = Some(pixel_size);
        }
        if let Some(nodata) = self.nodata {
            config.nodata = nodata;
        }
        Ok(config)
    }
}

fn convert(cli: &Cli) -> Result<(), MosaicError> {
    let config = cli.config()?;
    let tiles = expand_inputs(cli.inputs.as_slice())?;
    info!(tiles = tiles.len(), workers = %config.workers, "Resolved inputs");
    let summary = run(&tiles, &cli.out, &config)?;
    info!(
        path = %cli.out.display(),
        width = summary.spec.width,
        height = summary.spec.height,
        tiles = summary.tiles,
        "Done"
    );
    Ok(())
}

fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version land here too
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    match convert(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
