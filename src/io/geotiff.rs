use crate::core::reproject::GeoTiffArgs;
use crate::types::{GeoTransform, ModisError, ModisResult};
use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager};
use ndarray::{Array2, ArrayView2};
use std::path::Path;

/// Write one band as a single-precision GeoTIFF.
///
/// Georeferencing comes verbatim from `args`; the nodata value is NaN unless
/// `fill_value` is given.
pub fn write_geotiff<P: AsRef<Path>>(
    data: ArrayView2<'_, f32>,
    args: &GeoTiffArgs,
    fill_value: Option<f32>,
    output_path: P,
) -> ModisResult<()> {
    log::info!("Saving GeoTIFF: {}", output_path.as_ref().display());

    let (height, width) = data.dim();
    if (width, height) != (args.width, args.height) {
        return Err(ModisError::ShapeMismatch(format!(
            "raster is {} x {} but georeferencing describes {} x {}",
            width, height, args.width, args.height
        )));
    }

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut dataset = driver.create_with_band_type::<f32, _>(
        output_path.as_ref(),
        width as isize,
        height as isize,
        1,
    )?;

    dataset.set_geo_transform(&args.geotransform.to_gdal())?;
    dataset.set_spatial_ref(&SpatialRef::from_proj4(&args.proj4_string)?)?;

    let mut rasterband = dataset.rasterband(1)?;
    let flat_data: Vec<f32> = data.iter().cloned().collect();
    let buffer = Buffer::new((width, height), flat_data);
    rasterband.write((0, 0), (width, height), &buffer)?;

    let nodata = fill_value.unwrap_or(f32::NAN);
    rasterband.set_no_data_value(Some(nodata as f64))?;

    log::debug!("Wrote {} x {} GeoTIFF, nodata={}", width, height, nodata);
    Ok(())
}

/// Read band 1 of a raster back with its geotransform
pub fn read_band<P: AsRef<Path>>(path: P) -> ModisResult<(Array2<f32>, GeoTransform)> {
    let dataset = Dataset::open(path.as_ref())?;
    let geo_transform = GeoTransform::from_gdal(dataset.geo_transform()?);
    let (width, height) = dataset.raster_size();
    let band = dataset
        .rasterband(1)?
        .read_as_array::<f32>((0, 0), (width, height), (width, height), None)?;
    Ok((band, geo_transform))
}
