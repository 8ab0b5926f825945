use anyhow::{Context, Result};
use clap::Parser;
use modgrid::{LatLon, PipelineConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Calibrate MODIS reflectances, regrid them to a bounding box and derive NDVI",
    after_help = "Examples:
  modgrid --data-dir data
  modgrid --config vancouver.toml --tif-file ndvi.tif
  modgrid --bbox 45,-125,50,-120 --pixel-size 1000 --no-render
"
)]
struct Args {
    /// TOML configuration; built-in defaults are used when omitted
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Directory holding (or receiving) the granules
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Remote directory to download missing granules from
    #[arg(long)]
    base_url: Option<String>,

    /// Level-1B granule file name
    #[arg(long)]
    l1b_file: Option<String>,

    /// Geolocation granule file name
    #[arg(long)]
    geo_file: Option<String>,

    /// Bounding box as ll_lat,ll_lon,ur_lat,ur_lon
    #[arg(long, value_delimiter = ',', num_args = 4, allow_hyphen_values = true)]
    bbox: Option<Vec<f64>>,

    /// Output pixel size in metres
    #[arg(long)]
    pixel_size: Option<f64>,

    /// Output HDF5 container
    #[arg(long)]
    out_file: Option<PathBuf>,

    /// Output NDVI GeoTIFF
    #[arg(long)]
    tif_file: Option<PathBuf>,

    /// Output NDVI PNG
    #[arg(long)]
    png_file: Option<PathBuf>,

    /// Skip the PNG rendering
    #[arg(long)]
    no_render: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn build_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(dir) = &args.data_dir {
        config.data_dir = Some(dir.clone());
    }
    if let Some(url) = &args.base_url {
        config.base_url = Some(url.clone());
    }
    if let Some(name) = &args.l1b_file {
        config.l1b_file = name.clone();
    }
    if let Some(name) = &args.geo_file {
        config.geo_file = name.clone();
    }
    if let Some(b) = &args.bbox {
        config.bbox.llcrnr = LatLon::new(b[0], b[1]);
        config.bbox.urcrnr = LatLon::new(b[2], b[3]);
    }
    if let Some(px) = args.pixel_size {
        config.resample.pixel_size_m = px;
    }
    if let Some(path) = &args.out_file {
        config.out_file = path.clone();
    }
    if let Some(path) = &args.tif_file {
        config.tif_file = path.clone();
    }
    if let Some(path) = &args.png_file {
        config.render.png_file = Some(path.clone());
    }
    if args.no_render {
        config.render.png_file = None;
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = build_config(&args)?;

    if args.print_config {
        print!("{}", toml::to_string_pretty(&config).context("Failed to serialize configuration")?);
        return Ok(());
    }

    let report = modgrid::run(&config).context("Pipeline failed")?;

    println!("Subset:      {} x {} swath pixels", report.subset_dim.0, report.subset_dim.1);
    println!("Output grid: {} x {} cells", report.grid_dim.0, report.grid_dim.1);
    println!(
        "NDVI:        {} valid, min {:.3}, max {:.3}, mean {:.3}",
        report.ndvi.valid, report.ndvi.min, report.ndvi.max, report.ndvi.mean
    );
    println!("Wrote {}", report.h5_file.display());
    println!("Wrote {}", report.tif_file.display());
    if let Some(png) = &report.png_file {
        println!("Wrote {}", png.display());
    }
    Ok(())
}
