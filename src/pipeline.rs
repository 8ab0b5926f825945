//! End-to-end run: acquire, calibrate, subsample, reproject, derive NDVI,
//! write the container and raster, render.

use crate::config::PipelineConfig;
use crate::core::corners::find_corners;
use crate::core::product::{OutputProduct, ProductSpec};
use crate::core::render::{render_png, write_world_file, Colormap, PixelWindow};
use crate::core::reproject::Resampler;
use crate::core::subsample::subsample;
use crate::io::download::Downloader;
use crate::io::geotiff::write_geotiff;
use crate::io::h5_writer::write_h5;
use crate::io::modis_reader::{GeolocationReader, Level1bReader};
use crate::types::{GeoGrid, ModisError, ModisResult, ReflectanceImage};
use ndarray::ArrayView2;
use std::path::{Path, PathBuf};

/// Summary statistics of a layer, ignoring non-finite values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerStats {
    pub min: f32,
    pub max: f32,
    pub mean: f64,
    pub valid: usize,
    pub total: usize,
}

impl LayerStats {
    pub fn of(layer: ArrayView2<'_, f32>) -> Self {
        let mut stats = LayerStats {
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
            mean: 0.0,
            valid: 0,
            total: layer.len(),
        };
        let mut sum = 0.0f64;
        for &v in layer.iter().filter(|v| v.is_finite()) {
            stats.min = stats.min.min(v);
            stats.max = stats.max.max(v);
            sum += v as f64;
            stats.valid += 1;
        }
        if stats.valid > 0 {
            stats.mean = sum / stats.valid as f64;
        } else {
            stats.mean = f64::NAN;
        }
        stats
    }
}

/// What a run produced
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub subset_dim: (usize, usize),
    pub grid_dim: (usize, usize),
    pub ndvi: LayerStats,
    pub h5_file: PathBuf,
    pub tif_file: PathBuf,
    pub png_file: Option<PathBuf>,
}

/// Local path of `filename`, downloading it when missing
fn acquire(config: &PipelineConfig, filename: &str) -> ModisResult<PathBuf> {
    let data_dir = config.data_dir();
    match &config.base_url {
        Some(base_url) => Downloader::new(base_url, &data_dir)?.download(filename),
        None => {
            let local = data_dir.join(filename);
            if local.exists() {
                log::info!("Using local granule {}", local.display());
                Ok(local)
            } else {
                Err(ModisError::Download(format!(
                    "{} not found and no base_url configured",
                    local.display()
                )))
            }
        }
    }
}

/// The configured zoom window, or the whole grid when it is unset or does not fit
fn render_window(config: &PipelineConfig, rows: usize, cols: usize) -> PixelWindow {
    match config.render.zoom {
        Some(zoom) => match zoom.validate(rows, cols) {
            Ok(()) => zoom,
            Err(e) => {
                log::warn!("{}; rendering the full grid instead", e);
                PixelWindow::full(rows, cols)
            }
        },
        None => PixelWindow::full(rows, cols),
    }
}

fn channel_position(config: &PipelineConfig, name: &str) -> ModisResult<usize> {
    config
        .channels
        .iter()
        .position(|c| c == name)
        .ok_or_else(|| {
            ModisError::Processing(format!(
                "Channel {} is needed for NDVI but not in {:?}",
                name, config.channels
            ))
        })
}

/// Read and calibrate the configured channels plus geolocation.
/// Both files are closed when this returns.
pub fn read_granules(
    l1b_path: &Path,
    geo_path: &Path,
    channels: &[String],
) -> ModisResult<(Vec<ReflectanceImage>, GeoGrid)> {
    let reflectances = Level1bReader::open(l1b_path)?.read_reflectances(channels)?;
    let geo = GeolocationReader::open(geo_path)?.read_geolocation()?;
    Ok((reflectances, geo))
}

pub fn run(config: &PipelineConfig) -> ModisResult<PipelineReport> {
    let red = channel_position(config, &config.red_channel)?;
    let nir = channel_position(config, &config.nir_channel)?;

    log::info!("Step 1: acquiring granules");
    let l1b_path = acquire(config, &config.l1b_file)?;
    let geo_path = acquire(config, &config.geo_file)?;

    log::info!("Step 2: calibrating channels {:?}", config.channels);
    let (reflectances, geo) = read_granules(&l1b_path, &geo_path, &config.channels)?;

    log::info!("Step 3: subsampling to {:?}", config.bbox);
    let subset = subsample(&reflectances, geo.lats.view(), geo.lons.view(), &config.bbox)?;
    drop(reflectances);

    log::info!("Step 4: finding corners");
    let corners = find_corners(subset.lats.view(), subset.lons.view())?;

    log::info!("Step 5: reprojecting");
    let resampler = Resampler::new(config.resample)?;
    let resampled = resampler.resample_channels(
        subset.stack().view(),
        subset.lats.view(),
        subset.lons.view(),
        &corners,
    )?;
    let grid_dim = (resampled.geotiff_args.height, resampled.geotiff_args.width);

    log::info!("Step 6: deriving NDVI");
    let channel_names: Vec<String> = config
        .channels
        .iter()
        .map(|c| format!("modis{}", c))
        .collect();
    let product = OutputProduct::new(
        resampled,
        ProductSpec {
            channel_names: &channel_names,
            red,
            nir,
            out_file: &config.out_file,
            comments: &config.comments,
        },
    )?;
    let ndvi = LayerStats::of(product.ndvi());
    log::info!(
        "NDVI: {} valid of {} cells, range {:.3}..{:.3}, mean {:.3}",
        ndvi.valid,
        ndvi.total,
        ndvi.min,
        ndvi.max,
        ndvi.mean
    );
    if ndvi.valid == 0 {
        log::warn!("NDVI layer has no valid cells");
    }

    let window = render_window(config, grid_dim.0, grid_dim.1);

    log::info!("Step 7: writing outputs");
    write_h5(&product)?;
    write_geotiff(
        product.ndvi(),
        product.geotiff_args(),
        product.fill_value(),
        &config.tif_file,
    )?;

    let png_file = match &config.render.png_file {
        Some(png) => {
            log::info!("Step 8: rendering");
            let colormap = Colormap::diverging(config.render.vmin, config.render.vmax);
            render_png(product.ndvi(), &colormap, Some(&window), png)?;
            if config.render.world_file {
                write_world_file(
                    &window,
                    &product.geotiff_args().geotransform,
                    png.with_extension("pgw"),
                )?;
            }
            Some(png.clone())
        }
        None => None,
    };

    Ok(PipelineReport {
        subset_dim: subset.dim(),
        grid_dim,
        ndvi,
        h5_file: config.out_file.clone(),
        tif_file: config.tif_file.clone(),
        png_file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_layer_stats_skip_nan() {
        let mut layer = Array2::from_shape_vec((2, 2), vec![0.5f32, -0.25, 0.75, 0.0]).unwrap();
        layer[[1, 1]] = f32::NAN;
        let stats = LayerStats::of(layer.view());
        assert_eq!(stats.valid, 3);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.min, -0.25);
        assert_eq!(stats.max, 0.75);
        assert!((stats.mean - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_oversized_zoom_falls_back_to_full_grid() {
        let mut config = PipelineConfig::default();
        config.render.zoom = Some(PixelWindow {
            ll_col: 200,
            ll_row: 200,
            ur_col: 300,
            ur_row: 100,
        });
        assert_eq!(render_window(&config, 190, 280), PixelWindow::full(190, 280));
        assert_eq!(render_window(&config, 400, 400), config.render.zoom.unwrap());

        config.render.zoom = None;
        assert_eq!(render_window(&config, 12, 7), PixelWindow::full(12, 7));
    }

    #[test]
    fn test_missing_granule_without_base_url() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            data_dir: Some(dir.path().to_path_buf()),
            ..PipelineConfig::default()
        };
        assert!(matches!(run(&config), Err(ModisError::Download(_))));
    }

    #[test]
    fn test_ndvi_channels_must_be_selected() {
        let config = PipelineConfig {
            channels: vec!["3".to_string(), "4".to_string()],
            ..PipelineConfig::default()
        };
        assert!(matches!(run(&config), Err(ModisError::Processing(_))));
    }
}
