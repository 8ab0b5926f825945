use crate::core::ndvi::{append_layer, ndvi};
use crate::core::reproject::{channel, BasemapArgs, GeoTiffArgs, ResampledProduct};
use crate::types::{ChannelStack, ModisError, ModisResult};
use ndarray::{ArrayView2, Axis};
use std::path::{Path, PathBuf};

pub const NDVI_NAME: &str = "ndvi";

/// Everything written to the output container, assembled in one step.
///
/// The stack holds the resampled channels followed by the NDVI layer, and
/// `chan_list` names every layer in order.
#[derive(Debug, Clone)]
pub struct OutputProduct {
    channels: ChannelStack,
    chan_list: Vec<String>,
    out_file: PathBuf,
    comments: String,
    geotiff_args: GeoTiffArgs,
    fill_value: Option<f32>,
    basemap_args: BasemapArgs,
}

/// Inputs that turn a resampled stack into an [`OutputProduct`]
#[derive(Debug, Clone)]
pub struct ProductSpec<'a> {
    /// Names of the resampled channels, in stack order
    pub channel_names: &'a [String],
    /// Stack index of the red reflectance
    pub red: usize,
    /// Stack index of the near-infrared reflectance
    pub nir: usize,
    pub out_file: &'a Path,
    pub comments: &'a str,
}

impl OutputProduct {
    pub fn new(resampled: ResampledProduct, spec: ProductSpec<'_>) -> ModisResult<Self> {
        let nchan = resampled.channels.len_of(Axis(2));
        if spec.channel_names.len() != nchan {
            return Err(ModisError::ShapeMismatch(format!(
                "{} channel names for {} resampled channels",
                spec.channel_names.len(),
                nchan
            )));
        }

        let index = ndvi(channel(&resampled, spec.red)?, channel(&resampled, spec.nir)?)?;
        let channels = append_layer(resampled.channels.view(), index.view())?;

        let mut chan_list = spec.channel_names.to_vec();
        chan_list.push(NDVI_NAME.to_string());

        Ok(Self {
            channels,
            chan_list,
            out_file: spec.out_file.to_path_buf(),
            comments: spec.comments.to_string(),
            geotiff_args: resampled.geotiff_args,
            fill_value: resampled.fill_value,
            basemap_args: resampled.basemap_args,
        })
    }

    pub fn channels(&self) -> &ChannelStack {
        &self.channels
    }

    pub fn chan_list(&self) -> &[String] {
        &self.chan_list
    }

    pub fn out_file(&self) -> &Path {
        &self.out_file
    }

    pub fn comments(&self) -> &str {
        &self.comments
    }

    pub fn geotiff_args(&self) -> &GeoTiffArgs {
        &self.geotiff_args
    }

    pub fn fill_value(&self) -> Option<f32> {
        self.fill_value
    }

    pub fn basemap_args(&self) -> &BasemapArgs {
        &self.basemap_args
    }

    /// Layer by name, e.g. `"ndvi"` or `"modis1"`
    pub fn layer(&self, name: &str) -> ModisResult<ArrayView2<'_, f32>> {
        let index = self
            .chan_list
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| ModisError::Processing(format!("No layer named '{}'", name)))?;
        Ok(self.channels.index_axis(Axis(2), index))
    }

    pub fn ndvi(&self) -> ArrayView2<'_, f32> {
        // the index is always the last layer
        self.channels.index_axis(Axis(2), self.chan_list.len() - 1)
    }
}
