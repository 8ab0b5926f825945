//! modgrid: MODIS Level-1B reflectance calibration, regridding and NDVI
//!
//! Reads a MYD021KM/MOD021KM granule and its MxD03 geolocation companion,
//! calibrates reflective solar bands, crops them to a bounding box, resamples
//! them onto an equal-area map grid and derives NDVI. Results go to an HDF5
//! container, a GeoTIFF and a colour-mapped PNG.

pub mod config;
pub mod core;
pub mod io;
pub mod pipeline;
pub mod types;

// Re-export main types and functions for easier access
pub use config::{PipelineConfig, RenderConfig};
pub use pipeline::{run, PipelineReport};
pub use types::{
    BoundingBox, ChannelStack, GeoGrid, GeoTransform, LatLon, ModisError, ModisResult,
    ReflectanceImage,
};

#[cfg(feature = "python")]
mod python {
    use crate::types::{GeoTransform, ModisError};
    use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
    use pyo3::prelude::*;

    fn runtime_error(e: ModisError) -> PyErr {
        PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", e))
    }

    /// (raw - offset) * scale as float32
    #[pyfunction]
    fn calibrate<'py>(
        py: Python<'py>,
        raw: PyReadonlyArray2<'py, u16>,
        scale: f64,
        offset: f64,
    ) -> &'py PyArray2<f32> {
        crate::core::calibrate(raw.as_array(), scale, offset).into_pyarray(py)
    }

    /// (nir - red) / (nir + red)
    #[pyfunction]
    fn ndvi<'py>(
        py: Python<'py>,
        red: PyReadonlyArray2<'py, f32>,
        nir: PyReadonlyArray2<'py, f32>,
    ) -> PyResult<&'py PyArray2<f32>> {
        let index = crate::core::ndvi(red.as_array(), nir.as_array()).map_err(runtime_error)?;
        Ok(index.into_pyarray(py))
    }

    #[pyfunction]
    fn col_row_to_xy(col: f64, row: f64, geotransform: [f64; 6]) -> (f64, f64) {
        GeoTransform::from_gdal(geotransform).col_row_to_xy(col, row)
    }

    /// Run the whole pipeline; returns (h5 file, tif file)
    #[pyfunction]
    #[pyo3(signature = (config_path=None))]
    fn run_pipeline(config_path: Option<String>) -> PyResult<(String, String)> {
        let config = match config_path {
            Some(path) => crate::PipelineConfig::from_toml_file(path).map_err(runtime_error)?,
            None => crate::PipelineConfig::default(),
        };
        let report = crate::run(&config).map_err(runtime_error)?;
        Ok((
            report.h5_file.display().to_string(),
            report.tif_file.display().to_string(),
        ))
    }

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(calibrate, m)?)?;
        m.add_function(wrap_pyfunction!(ndvi, m)?)?;
        m.add_function(wrap_pyfunction!(col_row_to_xy, m)?)?;
        m.add_function(wrap_pyfunction!(run_pipeline, m)?)?;
        Ok(())
    }
}
