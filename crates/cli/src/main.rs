//! hydrodem CLI - DEM hydrology for flood and catchment mapping

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use hydrodem_algorithms::hydrology::{
    compute_flow_accumulation, compute_flow_direction, compute_hand, condition_dem_file,
    extract_channel_mask, flood_mask, flood_polygon, FlowGraph,
};
use hydrodem_algorithms::vector::cell_size_meters;
use hydrodem_algorithms::{catchment_from_point, run_pipeline, LatLon, PipelineConfig};
use hydrodem_core::io::{load_dem, read_geotiff, write_geotiff, GeoTiffOptions};
use hydrodem_core::{Error, Raster, RasterElement, CRS};

use config::{load_config, parse_fill_method, Overrides};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "hydrodem")]
#[command(author, version, about = "DEM hydrology: conditioning, HAND, floods and catchments", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Pipeline configuration file (TOML); flags override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

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
    /// Fill depressions and resolve flats in a DEM
    Condition {
        /// Input DEM file (must carry a CRS)
        input: PathBuf,
        /// Output conditioned DEM
        output: PathBuf,
        /// Fill method: iterative, priority-flood
        #[arg(short, long)]
        method: Option<String>,
        /// Gradient added across flats
        #[arg(long)]
        flat_eps: Option<f64>,
    },
    /// D8 flow direction and accumulation from a conditioned DEM
    Route {
        /// Conditioned DEM file
        input: PathBuf,
        /// Output flow direction (ESRI D8 codes, 0 = outlet)
        direction: PathBuf,
        /// Output flow accumulation (upstream cell count)
        accumulation: PathBuf,
        /// Cell size in metres; derived from the DEM when omitted
        #[arg(long)]
        cell_size: Option<f64>,
    },
    /// Height Above Nearest Drainage from a conditioned DEM
    Hand {
        /// Conditioned DEM file
        input: PathBuf,
        /// Output HAND raster (metres, NaN = NoData)
        output: PathBuf,
        /// Minimum accumulation (cells) of a channel cell
        #[arg(short, long)]
        threshold: Option<u32>,
        /// Also write the channel mask
        #[arg(long)]
        channels: Option<PathBuf>,
    },
    /// Flood extent polygon from a HAND raster
    Flood {
        /// Input HAND raster
        input: PathBuf,
        /// Output GeoJSON feature
        output: PathBuf,
        /// Water level in metres above drainage
        #[arg(short, long)]
        level: f64,
        /// Polygon simplification tolerance (CRS units)
        #[arg(long)]
        tolerance: Option<f64>,
        /// Also write the flood mask raster
        #[arg(long)]
        mask: Option<PathBuf>,
    },
    /// Catchment polygon upstream of a pour point
    Catchment {
        /// Conditioned DEM file
        input: PathBuf,
        /// Output GeoJSON feature
        output: PathBuf,
        /// Pour point latitude (CRS y)
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Pour point longitude (CRS x)
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Snapping window radius in cells
        #[arg(short, long)]
        radius: Option<usize>,
    },
    /// Full pipeline: condition, route, HAND, floods and optional catchment
    Run {
        /// Input DEM file (must carry a CRS)
        input: PathBuf,
        /// Output directory
        output_dir: PathBuf,
        /// Minimum accumulation (cells) of a channel cell
        #[arg(short, long)]
        threshold: Option<u32>,
        /// Water levels in metres, comma separated (e.g. 1,2,5)
        #[arg(long, value_delimiter = ',')]
        levels: Option<Vec<f64>>,
        /// Fill method: iterative, priority-flood
        #[arg(short, long)]
        method: Option<String>,
        /// Pour point latitude (CRS y)
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,
        /// Pour point longitude (CRS x)
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set up logging")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_dem(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading DEM...");
    let dem = load_dem(path).with_context(|| format!("Failed to load DEM {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", dem.cols(), dem.rows());
    Ok(dem)
}

fn write_raster<T: RasterElement>(raster: &Raster<T>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(raster, path, Some(GeoTiffOptions::default()))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn crs_of<T: RasterElement>(raster: &Raster<T>) -> Result<CRS> {
    raster
        .crs()
        .cloned()
        .ok_or(Error::MissingCrs)
        .context("Raster has no CRS")
}

fn pipeline_config(cli_config: Option<&Path>, overrides: Overrides) -> Result<PipelineConfig> {
    let mut config = load_config(cli_config)?;
    overrides.apply(&mut config);
    Ok(config)
}

fn fill_method(method: Option<String>) -> Result<Overrides> {
    Ok(Overrides {
        fill_method: method.as_deref().map(parse_fill_method).transpose()?,
        ..Overrides::default()
    })
}

/// Flow graph and accumulation of an already conditioned DEM
fn route(dem: &Raster<f64>, cell_size: Option<f64>) -> Result<(Raster<u8>, FlowGraph, Raster<u32>)> {
    let cell_size = cell_size.unwrap_or_else(|| cell_size_meters(dem.transform(), dem.crs()));
    let fdir = compute_flow_direction(dem, cell_size).context("Flow direction failed")?;
    let graph = FlowGraph::build(&fdir, &dem.nodata_mask()).context("Flow graph failed")?;
    let acc = compute_flow_accumulation(&graph).context("Flow accumulation failed")?;
    Ok((fdir, graph, acc))
}

fn level_name(level: f64) -> String {
    format!("flood_{}m.geojson", level.to_string().replace('.', "_"))
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    let config_path = cli.config.as_deref();

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let raster: Raster<f64> = read_geotiff(&input).context("Failed to read raster")?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            match raster.crs() {
                Some(crs) => println!(
                    "CRS: {} ({}; {:.2} m cells)",
                    crs,
                    if crs.is_geographic() { "geographic" } else { "projected" },
                    cell_size_meters(raster.transform(), Some(crs))
                ),
                None => println!("CRS: none (conditioning will refuse this file)"),
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
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
                100.0 * stats.valid_count as f64 / raster.len() as f64
            );
        }

        // ── Conditioning ─────────────────────────────────────────────
        Commands::Condition {
            input,
            output,
            method,
            flat_eps,
        } => {
            let overrides = Overrides {
                flat_eps,
                ..fill_method(method)?
            };
            let config = pipeline_config(config_path, overrides)?;

            let start = Instant::now();
            let pb = spinner("Conditioning DEM...");
            let conditioned = condition_dem_file(&input, config.condition)
                .with_context(|| format!("Failed to condition {}", input.display()))?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            write_raster(&conditioned.dem, &output)?;
            println!("{}", serde_json::to_string_pretty(&conditioned.metadata)?);
            done("Conditioned DEM", &output, elapsed);
        }

        // ── Routing ──────────────────────────────────────────────────
        Commands::Route {
            input,
            direction,
            accumulation,
            cell_size,
        } => {
            let config = pipeline_config(
                config_path,
                Overrides {
                    cell_size,
                    ..Overrides::default()
                },
            )?;
            let dem = read_dem(&input)?;

            let start = Instant::now();
            let pb = spinner("Routing flow...");
            let (fdir, _, acc) = route(&dem, config.cell_size)?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            write_raster(&fdir, &direction)?;
            write_raster(&acc, &accumulation)?;
            done("Flow direction", &direction, elapsed);
            done("Flow accumulation", &accumulation, elapsed);
        }

        // ── HAND ─────────────────────────────────────────────────────
        Commands::Hand {
            input,
            output,
            threshold,
            channels,
        } => {
            let config = pipeline_config(
                config_path,
                Overrides {
                    channel_threshold: threshold,
                    ..Overrides::default()
                },
            )?;
            let dem = read_dem(&input)?;

            let start = Instant::now();
            let pb = spinner("Computing HAND...");
            let (_, graph, acc) = route(&dem, config.cell_size)?;
            let channel_mask = extract_channel_mask(&acc, config.channel_threshold)?;
            let hand = compute_hand(&dem, &graph, &channel_mask).context("HAND failed")?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            write_raster(&hand, &output)?;
            if let Some(path) = channels {
                write_raster(&channel_mask, &path)?;
                done("Channel mask", &path, elapsed);
            }
            done("HAND", &output, elapsed);
        }

        // ── Flood ────────────────────────────────────────────────────
        Commands::Flood {
            input,
            output,
            level,
            tolerance,
            mask,
        } => {
            let config = pipeline_config(
                config_path,
                Overrides {
                    simplify_tolerance: tolerance,
                    ..Overrides::default()
                },
            )?;
            let hand: Raster<f32> = read_geotiff(&input).context("Failed to read HAND raster")?;
            let crs = crs_of(&hand)?;

            let start = Instant::now();
            let nodata = hand.map(|h| h.is_nan());
            let flooded = flood_mask(&hand, level, &nodata)?;
            let feature = flood_polygon(&flooded, hand.transform(), &crs, config.simplify_tolerance)?;
            let elapsed = start.elapsed();

            write_json(&feature.to_geojson(), &output)?;
            if let Some(path) = mask {
                write_raster(&flooded, &path)?;
            }
            if let Some(km2) = feature.get_property("area_km2").and_then(|v| v.as_f64()) {
                println!("Flooded area at {} m: {:.4} km2", level, km2);
            }
            done("Flood polygon", &output, elapsed);
        }

        // ── Catchment ────────────────────────────────────────────────
        Commands::Catchment {
            input,
            output,
            lat,
            lon,
            radius,
        } => {
            let config = pipeline_config(
                config_path,
                Overrides {
                    snap_radius: radius,
                    ..Overrides::default()
                },
            )?;
            let dem = read_dem(&input)?;
            let crs = crs_of(&dem)?;

            let start = Instant::now();
            let pb = spinner("Delineating catchment...");
            let (_, graph, acc) = route(&dem, config.cell_size)?;
            let result = catchment_from_point(
                LatLon { lat, lon },
                &acc,
                &graph,
                dem.transform(),
                &crs,
                config.snap_radius,
            )
            .context("Catchment delineation failed")?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            let pp = result.pour_point;
            println!(
                "Pour point snapped to row {}, col {} ({:.2} cells away)",
                pp.row, pp.col, pp.snap_distance
            );
            let geojson = result.feature.map(|f| f.to_geojson());
            write_json(&geojson, &output)?;
            println!("Catchment cells: {}", result.mask.count_true());
            done("Catchment polygon", &output, elapsed);
        }

        // ── Full pipeline ────────────────────────────────────────────
        Commands::Run {
            input,
            output_dir,
            threshold,
            levels,
            method,
            lat,
            lon,
        } => {
            let overrides = Overrides {
                channel_threshold: threshold,
                water_levels: levels,
                pour_point: lat.zip(lon).map(|(lat, lon)| LatLon { lat, lon }),
                ..fill_method(method)?
            };
            let config = pipeline_config(config_path, overrides)?;
            let dem = read_dem(&input)?;
            fs::create_dir_all(&output_dir)
                .with_context(|| format!("Failed to create {}", output_dir.display()))?;

            let start = Instant::now();
            let pb = spinner("Running pipeline...");
            let output = run_pipeline(&dem, &config).context("Pipeline failed")?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            write_raster(&output.conditioned.dem, &output_dir.join("conditioned.tif"))?;
            write_raster(&output.flow_direction, &output_dir.join("flow_direction.tif"))?;
            write_raster(&output.flow_accumulation, &output_dir.join("flow_accumulation.tif"))?;
            write_raster(&output.channel_mask, &output_dir.join("channels.tif"))?;
            write_raster(&output.hand, &output_dir.join("hand.tif"))?;
            write_json(&output.conditioned.metadata, &output_dir.join("conditioning.json"))?;

            for flood in &output.floods {
                let path = output_dir.join(level_name(flood.water_level_m));
                write_json(&flood.feature.to_geojson(), &path)?;
            }
            if let Some(catchment) = &output.catchment {
                let geojson = catchment.feature.as_ref().map(|f| f.to_geojson());
                write_json(&geojson, &output_dir.join("catchment.geojson"))?;
            }

            println!(
                "Channels: {} cells, flood levels: {}",
                output.channel_mask.count_true(),
                output.floods.len()
            );
            done("Pipeline outputs", &output_dir, elapsed);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_file_names() {
        assert_eq!(level_name(1.0), "flood_1m.geojson");
        assert_eq!(level_name(2.5), "flood_2_5m.geojson");
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "hydrodem", "run", "dem.tif", "out", "--levels", "1,2.5", "--lat", "-12.5", "--lon",
            "77.0",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                levels, lat, lon, ..
            } => {
                assert_eq!(levels, Some(vec![1.0, 2.5]));
                assert_eq!(lat, Some(-12.5));
                assert_eq!(lon, Some(77.0));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_run_requires_both_coordinates() {
        assert!(Cli::try_parse_from(["hydrodem", "run", "dem.tif", "out", "--lat", "1.0"]).is_err());
    }
}
