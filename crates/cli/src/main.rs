//! geolab CLI - Earth-observation teaching toolkit

use anyhow::{Context, Result};
use clap::builder::{PossibleValuesParser, TypedValueParser};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geolab_algorithms::cropping::{crop, ClipShape, CropOptions};
use geolab_algorithms::imagery::{bytescale, ndvi, normalized_difference, BytescaleParams};
use geolab_algorithms::stacking::{stack, StackOptions};
use geolab_algorithms::terrain::{hillshade, HillshadeParams};
use geolab_algorithms::vector::clip;
use geolab_core::io::{
    read_geojson, read_geotiff, read_geotiff_stack, write_geojson, write_geotiff,
    write_geotiff_stack, Compression, GeoTiffOptions,
};
use geolab_core::{BoundingBox, Raster, RasterStack};
use geolab_data::{DataStore, FetchOptions, DATA_DIR_ENV};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geolab")]
#[command(author, version, about = "Earth-observation raster and vector toolkit", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// GeoTIFF compression for written rasters
    #[arg(long, global = true, default_value = "none", value_parser = compression_parser())]
    compress: Compression,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Stack rasters sharing one grid into a multi-band GeoTIFF
    Stack {
        /// Input rasters, in band order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Output GeoTIFF (.tif/.tiff)
        #[arg(short, long)]
        output: PathBuf,
        /// Mask cells equal to each band's no-data value
        #[arg(long)]
        mask_nodata: bool,
        /// Absolute tolerance for the no-data comparison
        #[arg(long)]
        nodata_tolerance: Option<f64>,
    },
    /// Crop a raster to the polygons of a GeoJSON file
    Crop {
        /// Input raster
        input: PathBuf,
        /// GeoJSON with the crop geometries
        shapes: PathBuf,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
        /// Keep only pixels whose centre falls inside a polygon
        #[arg(long)]
        center_only: bool,
    },
    /// Crop a raster to an extent
    CropBounds {
        /// Input raster
        input: PathBuf,
        /// Extent as min_x,min_y,max_x,max_y in the raster's CRS
        #[arg(long, allow_hyphen_values = true)]
        bounds: BoundingBox,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Normalized difference (b - a) / (b + a) of two rasters
    Ndiff {
        /// First band (a)
        a: PathBuf,
        /// Second band (b)
        b: PathBuf,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// NDVI: (NIR - Red) / (NIR + Red)
    Ndvi {
        /// Near-infrared band
        nir: PathBuf,
        /// Red band
        red: PathBuf,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Calculate hillshade from DEM
    Hillshade {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
        /// Sun azimuth in degrees (0=North, clockwise)
        #[arg(short, long, default_value = "30")]
        azimuth: f64,
        /// Sun altitude in degrees above horizon
        #[arg(short = 'l', long, default_value = "30")]
        altitude: f64,
        /// Z-factor for vertical exaggeration
        #[arg(short, long, default_value = "1.0")]
        z_factor: f64,
        /// Output 0-1 instead of 0-255
        #[arg(long)]
        normalized: bool,
    },
    /// Rescale a raster to 8-bit for display
    Bytescale {
        /// Input raster
        input: PathBuf,
        /// Output file
        #[arg(short, long)]
        output: PathBuf,
        /// Lower clip value (default: data minimum)
        #[arg(long, allow_hyphen_values = true)]
        cmin: Option<f64>,
        /// Upper clip value (default: data maximum)
        #[arg(long, allow_hyphen_values = true)]
        cmax: Option<f64>,
        /// Lowest output value
        #[arg(long, default_value = "0")]
        low: i32,
        /// Highest output value
        #[arg(long, default_value = "255")]
        high: i32,
    },
    /// Clip GeoJSON features to the polygons of another GeoJSON
    Clip {
        /// Features to clip
        subject: PathBuf,
        /// Boundary polygons
        boundary: PathBuf,
        /// Output GeoJSON
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Download an example dataset (or an ad-hoc URL)
    Fetch {
        /// Dataset key (see `datasets`)
        #[arg(required_unless_present = "url", conflicts_with = "url")]
        key: Option<String>,
        /// Fetch this URL instead of a named dataset
        #[arg(long)]
        url: Option<String>,
        /// File name for an ad-hoc URL
        #[arg(long, requires = "url")]
        filename: Option<String>,
        /// Data directory
        #[arg(long, env = DATA_DIR_ENV)]
        data_dir: Option<PathBuf>,
        /// Download again even if present
        #[arg(long)]
        replace: bool,
    },
    /// List the available example datasets
    Datasets,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster = read_geotiff(path, None)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    Ok(raster)
}

fn read_stack(path: &Path) -> Result<RasterStack<f64>> {
    let pb = spinner("Reading raster...");
    let stack = read_geotiff_stack(path)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    Ok(stack)
}

fn write_result<T: geolab_core::RasterElement>(raster: &Raster<T>, path: &Path, options: &GeoTiffOptions) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(raster, path, Some(options.clone())).context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn write_stack_result(stack: &RasterStack<f64>, path: &Path, options: &GeoTiffOptions) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff_stack(stack, path, Some(options.clone())).context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn print_info(path: &Path, stack: &RasterStack<f64>) -> Result<()> {
    let (bands, rows, cols) = stack.shape();
    let bounds = stack.bounds();

    println!("File: {}", path.display());
    println!("Dimensions: {} x {} x {} bands ({} cells per band)", cols, rows, bands, rows * cols);
    println!("Cell size: {}", stack.transform().cell_size());
    println!(
        "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        bounds.0, bounds.1, bounds.2, bounds.3
    );
    if let Some(crs) = stack.crs() {
        println!("CRS: {}", crs);
    }
    if let Some(nodata) = stack.metadata().nodata {
        println!("NoData: {}", nodata);
    }

    for b in 0..bands {
        let stats = stack.band(b)?.statistics();
        println!("\nBand {} statistics:", b + 1);
        if let Some(min) = stats.min {
            println!("  Min: {:.4}", min);
        }
        if let Some(max) = stats.max {
            println!("  Max: {:.4}", max);
        }
        if let Some(mean) = stats.mean {
            println!("  Mean: {:.4}", mean);
        }
        println!(
            "  Valid cells: {} ({:.1}%)",
            stats.valid_count,
            100.0 * stats.valid_count as f64 / (rows * cols).max(1) as f64
        );
    }
    Ok(())
}

fn compression_parser() -> impl TypedValueParser<Value = Compression> {
    PossibleValuesParser::new(["none", "deflate", "lzw"])
        .map(|s| s.parse::<Compression>().unwrap_or_default())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    let write_options = GeoTiffOptions {
        compression: cli.compress,
    };

    match cli.command {
        Commands::Info { input } => {
            let stack = read_stack(&input)?;
            print_info(&input, &stack)?;
        }

        Commands::Stack {
            inputs,
            output,
            mask_nodata,
            nodata_tolerance,
        } => {
            let start = Instant::now();
            let pb = spinner("Stacking bands...");
            let result = stack::<f64, _>(
                &inputs,
                &StackOptions {
                    output: Some(output.clone()),
                    mask_nodata,
                    nodata_tolerance,
                    write_options,
                },
            )
            .context("Failed to stack rasters")?;
            pb.finish_and_clear();
            info!("Stacked {} bands", result.stack.band_count());
            done("Stack", &output, start.elapsed());
        }

        Commands::Crop {
            input,
            shapes,
            output,
            center_only,
        } => {
            let source = read_stack(&input)?;
            let features = read_geojson(&shapes)
                .with_context(|| format!("Failed to read {}", shapes.display()))?;
            let start = Instant::now();
            let result = crop(
                &source,
                &ClipShape::Features(&features),
                &CropOptions {
                    all_touched: !center_only,
                },
            )
            .context("Failed to crop raster")?;
            let elapsed = start.elapsed();
            write_stack_result(&result.stack, &output, &write_options)?;
            done("Crop", &output, elapsed);
        }

        Commands::CropBounds {
            input,
            bounds,
            output,
        } => {
            let source = read_stack(&input)?;
            let start = Instant::now();
            let result = crop(&source, &ClipShape::Bounds(bounds), &CropOptions::default())
                .context("Failed to crop raster")?;
            let elapsed = start.elapsed();
            write_stack_result(&result.stack, &output, &write_options)?;
            done("Crop", &output, elapsed);
        }

        Commands::Ndiff { a, b, output } => {
            let a = read_raster(&a)?;
            let b = read_raster(&b)?;
            let start = Instant::now();
            let result = normalized_difference(&a, &b).context("Failed to calculate normalized difference")?;
            let elapsed = start.elapsed();
            write_result(&result, &output, &write_options)?;
            done("Normalized difference", &output, elapsed);
        }

        Commands::Ndvi { nir, red, output } => {
            let nir = read_raster(&nir)?;
            let red = read_raster(&red)?;
            let start = Instant::now();
            let result = ndvi(&nir, &red).context("Failed to calculate NDVI")?;
            let elapsed = start.elapsed();
            write_result(&result, &output, &write_options)?;
            done("NDVI", &output, elapsed);
        }

        Commands::Hillshade {
            input,
            output,
            azimuth,
            altitude,
            z_factor,
            normalized,
        } => {
            let dem = read_raster(&input)?;
            let start = Instant::now();
            let result = hillshade(
                &dem,
                HillshadeParams {
                    azimuth,
                    altitude,
                    z_factor,
                    normalized,
                },
            )
            .context("Failed to calculate hillshade")?;
            let elapsed = start.elapsed();
            write_result(&result, &output, &write_options)?;
            done("Hillshade", &output, elapsed);
        }

        Commands::Bytescale {
            input,
            output,
            cmin,
            cmax,
            low,
            high,
        } => {
            let raster = read_raster(&input)?;
            let start = Instant::now();
            let result = bytescale(&raster, &BytescaleParams { cmin, cmax, low, high })
                .context("Failed to rescale raster")?;
            let elapsed = start.elapsed();
            write_result(&result, &output, &write_options)?;
            done("Bytescale", &output, elapsed);
        }

        Commands::Clip {
            subject,
            boundary,
            output,
        } => {
            let subject = read_geojson(&subject)
                .with_context(|| format!("Failed to read {}", subject.display()))?;
            let boundary = read_geojson(&boundary)
                .with_context(|| format!("Failed to read {}", boundary.display()))?;
            let start = Instant::now();
            let result = clip(&subject, &boundary).context("Failed to clip features")?;
            let elapsed = start.elapsed();
            write_geojson(&result, &output).context("Failed to write output")?;
            info!("{} of {} features kept", result.len(), subject.len());
            done("Clip", &output, elapsed);
        }

        Commands::Fetch {
            key,
            url,
            filename,
            data_dir,
            replace,
        } => {
            let store = match data_dir {
                Some(dir) => DataStore::new(dir),
                None => DataStore::from_env()?,
            };
            let options = FetchOptions { replace };
            let pb = spinner("Fetching data...");
            let paths = match (key, url) {
                (_, Some(url)) => vec![store.fetch_url(&url, filename.as_deref(), &options)?],
                (Some(key), None) => store.fetch(&key, &options)?,
                (None, None) => anyhow::bail!("either a dataset key or --url is required"),
            };
            pb.finish_and_clear();
            for path in paths {
                println!("{}", path.display());
            }
        }

        Commands::Datasets => {
            println!("Available datasets:");
            for key in geolab_data::registry::keys() {
                println!("  {}", key);
            }
        }
    }

    Ok(())
}
