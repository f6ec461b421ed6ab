//! Sharko habitat cascade runner.
//!
//! ## Usage
//!
//! ```bash
//! # Probability surface over a region
//! sharko --model-dir models grid \
//!     --min-lat 5 --max-lat 15 --min-lon -45 --max-lon -35 \
//!     --resolution 0.25 --date 2025-05-15 --output surface.json
//!
//! # Explicit points ([{"latitude": .., "longitude": .., "date": "YYYY-MM-DD"}])
//! sharko --config sharko.json points --input points.json
//!
//! # Load and check all four artifacts
//! sharko --model-dir models --model-version 2025-06-12 validate
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use sharko::{
    InferenceEngine, InferenceRequest, ModelRegistry, PointRequest, Region, SharkoConfig,
};

#[derive(Parser, Debug)]
#[command(name = "sharko")]
#[command(version)]
#[command(about = "Species habitat forecasts from cascaded ocean models", long_about = None)]
struct Args {
    /// Configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model store root
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Model version directory, or "latest"
    #[arg(long)]
    model_version: Option<String>,

    /// Batch worker threads (0 = one per core)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Show a progress bar
    #[arg(long)]
    progress: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Forecast a regular grid on one date
    Grid {
        #[arg(long, allow_negative_numbers = true)]
        min_lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        max_lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        min_lon: f64,
        #[arg(long, allow_negative_numbers = true)]
        max_lon: f64,
        /// Cell size in degrees
        #[arg(long, default_value = "0.25")]
        resolution: f64,
        /// Forecast date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Forecast explicit points from a JSON file
    Points {
        /// JSON array of {latitude, longitude, date}
        #[arg(short, long)]
        input: PathBuf,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Load and validate all artifacts
    Validate,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    // Initialize logging
    let level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(
        "Model store: {} (version {})",
        config.model_dir.display(),
        config.model_version
    );

    match args.command {
        Command::Grid {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
            resolution,
            date,
            output,
        } => {
            let engine = InferenceEngine::from_config(&config)?;
            let request = InferenceRequest::Grid {
                region: Region::new(min_lat, max_lat, min_lon, max_lon),
                resolution,
                date,
            };
            let response = engine.handle(&request)?;
            if !response.failures().is_empty() {
                warn!("{} grid points failed", response.failures().len());
            }
            write_json(&response, output.as_deref())?;
        }
        Command::Points { input, output } => {
            let text = std::fs::read_to_string(&input)?;
            let points: Vec<PointRequest> = serde_json::from_str(&text)
                .map_err(|e| format!("failed to parse {}: {e}", input.display()))?;

            let engine = InferenceEngine::from_config(&config)?;
            let response = engine.handle(&InferenceRequest::Points { points })?;
            if !response.failures().is_empty() {
                warn!("{} points failed", response.failures().len());
            }
            write_json(&response, output.as_deref())?;
        }
        Command::Validate => {
            let registry = ModelRegistry::open(&config.model_dir, &config.model_version)?;
            info!("Validating artifacts in {}", registry.location());
            let summaries = registry.summaries()?;
            write_json(&summaries, None)?;
            info!("All {} artifacts are valid", summaries.len());
        }
    }

    Ok(())
}

/// Defaults, then the config file, then command-line flags.
fn resolve_config(args: &Args) -> Result<SharkoConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => SharkoConfig::load(path)?,
        None => SharkoConfig::default(),
    };

    if let Some(dir) = &args.model_dir {
        config.model_dir = dir.clone();
    }
    if let Some(version) = &args.model_version {
        config.model_version = version.clone();
    }
    if let Some(workers) = args.workers {
        config.num_workers = workers;
    }
    if args.progress {
        config.show_progress = true;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }

    config.validate()?;
    Ok(config)
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        Some(path) => {
            let mut writer = std::io::BufWriter::new(std::fs::File::create(path)?);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.flush()?;
            info!("Wrote {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            serde_json::to_writer_pretty(&mut handle, value)?;
            writeln!(handle)?;
        }
    }
    Ok(())
}
