use crate::core::render::PixelWindow;
use crate::core::reproject::ResampleParams;
use crate::io::download::Downloader;
use crate::types::{BoundingBox, ModisResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Run configuration. Every field has a default, so a TOML file only needs
/// the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Level-1B reflectance granule (MxD021KM)
    pub l1b_file: String,
    /// Geolocation granule (MxD03)
    pub geo_file: String,
    /// Remote directory the granules are fetched from when missing locally
    pub base_url: Option<String>,
    /// Where granules are looked up and downloaded to
    pub data_dir: Option<PathBuf>,
    /// Reflective channels to calibrate, by MODIS band name
    pub channels: Vec<String>,
    pub red_channel: String,
    pub nir_channel: String,
    pub bbox: BoundingBox,
    pub resample: ResampleParams,
    pub out_file: PathBuf,
    pub tif_file: PathBuf,
    pub comments: String,
    pub render: RenderConfig,
}

/// Visualization options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// PNG to write; nothing is rendered when unset
    pub png_file: Option<PathBuf>,
    /// Optional zoom window; the full grid is rendered when it does not fit
    pub zoom: Option<PixelWindow>,
    pub vmin: f32,
    pub vmax: f32,
    /// Also write a world file next to the PNG
    pub world_file: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            png_file: Some(PathBuf::from("vancouver_ndvi.png")),
            zoom: Some(PixelWindow {
                ll_col: 200,
                ll_row: 200,
                ur_col: 300,
                ur_row: 100,
            }),
            vmin: -0.9,
            vmax: 0.9,
            world_file: true,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            l1b_file: "MYD021KM.A2016224.2100.006.2016225153002.h5".to_string(),
            geo_file: "MYD03.A2016224.2100.006.2016225152335.h5".to_string(),
            base_url: None,
            data_dir: None,
            channels: ["1", "2", "3", "4"].iter().map(|c| c.to_string()).collect(),
            red_channel: "1".to_string(),
            nir_channel: "2".to_string(),
            bbox: BoundingBox::default(),
            resample: ResampleParams::default(),
            out_file: PathBuf::from("vancouver_zoom.h5"),
            tif_file: PathBuf::from("vancouver_ndvi.tif"),
            comments: "subsampled to vancouver box".to_string(),
            render: RenderConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> ModisResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ModisResult<Self> {
        log::info!("Loading configuration from {}", path.as_ref().display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(Downloader::default_cache_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LatLon;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.channels, vec!["1", "2", "3", "4"]);
        assert_eq!(config.resample.pixel_size_m, 1300.0);
    }

    #[test]
    fn test_partial_override() {
        let text = r#"
            comments = "test run"
            tif_file = "out/ndvi.tif"

            [bbox.llcrnr]
            lat = 40.0
            lon = -110.0

            [bbox.urcrnr]
            lat = 42.0
            lon = -108.0

            [resample]
            pixel_size_m = 1000.0
            fill_value = -999.0

            [render]
            world_file = false
        "#;
        let config = PipelineConfig::from_toml_str(text).unwrap();
        assert_eq!(config.comments, "test run");
        assert_eq!(config.tif_file, PathBuf::from("out/ndvi.tif"));
        assert_eq!(config.bbox.llcrnr, LatLon::new(40.0, -110.0));
        assert_eq!(config.resample.pixel_size_m, 1000.0);
        assert_eq!(config.resample.radius_of_influence_m, 5000.0);
        assert_eq!(config.resample.fill_value, Some(-999.0));
        assert!(!config.render.world_file);
        assert_eq!(config.render.vmin, -0.9);
        assert_eq!(config.l1b_file, PipelineConfig::default().l1b_file);
    }

    #[test]
    fn test_bad_toml() {
        assert!(PipelineConfig::from_toml_str("channels = 3").is_err());
    }
}
