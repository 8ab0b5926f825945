//! Core processing modules

pub mod calibrate;
pub mod corners;
pub mod ndvi;
pub mod product;
pub mod render;
pub mod reproject;
pub mod subsample;

// Re-export main types
pub use calibrate::{calibrate, CalibrationCoefficients, ReflectanceCalibrator};
pub use corners::{find_corners, Corners};
pub use ndvi::{append_layer, ndvi, normalized_difference};
pub use product::{OutputProduct, ProductSpec};
pub use render::{render_png, window_coordinates, Colormap, PixelWindow};
pub use reproject::{BasemapArgs, GeoTiffArgs, ResampleParams, ResampledProduct, Resampler};
pub use subsample::{subsample, SwathSubset};
