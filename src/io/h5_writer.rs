use crate::core::product::OutputProduct;
use crate::types::{ModisError, ModisResult};
use hdf5::types::VarLenUnicode;
use hdf5::Location;
use ndarray::{arr1, Axis};

pub const CHANNEL_GROUP: &str = "channels";
pub const BASEMAP_GROUP: &str = "basemap_args";

fn unicode(value: &str) -> ModisResult<VarLenUnicode> {
    value
        .parse::<VarLenUnicode>()
        .map_err(|e| {
            ModisError::InvalidFormat(format!("Cannot store '{}' as HDF5 string: {}", value, e))
        })
}

fn write_str_attr(location: &Location, name: &str, value: &str) -> ModisResult<()> {
    location
        .new_attr::<VarLenUnicode>()
        .shape(())
        .create(name)?
        .write_scalar(&unicode(value)?)?;
    Ok(())
}

fn write_f64_attr(location: &Location, name: &str, value: f64) -> ModisResult<()> {
    location.new_attr::<f64>().shape(()).create(name)?.write_scalar(&value)?;
    Ok(())
}

/// Write the channel stack and its georeferencing to `product.out_file()`.
///
/// Layout:
/// - `/channels/<name>`: one rows x cols f32 dataset per entry of `chan_list`
/// - root attributes `comments`, `chan_list`, `proj4_string`, `geotransform`,
///   `fill_value`, `history`
/// - `/basemap_args`: map projection parameters as attributes
pub fn write_h5(product: &OutputProduct) -> ModisResult<()> {
    let path = product.out_file();
    log::info!("Writing HDF5 container: {}", path.display());

    let file = hdf5::File::create(path)?;

    let channel_group = file.create_group(CHANNEL_GROUP)?;
    for (name, layer) in product
        .chan_list()
        .iter()
        .zip(product.channels().axis_iter(Axis(2)))
    {
        let layer = layer.as_standard_layout();
        channel_group
            .new_dataset_builder()
            .with_data(&layer)
            .create(name.as_str())?;
        log::debug!("Wrote layer {} ({} x {})", name, layer.nrows(), layer.ncols());
    }

    write_str_attr(&file, "comments", product.comments())?;
    write_str_attr(&file, "chan_list", &product.chan_list().join(","))?;

    let geotiff_args = product.geotiff_args();
    write_str_attr(&file, "proj4_string", &geotiff_args.proj4_string)?;
    file.new_attr_builder()
        .with_data(&arr1(&geotiff_args.geotransform.to_gdal()))
        .create("geotransform")?;
    file.new_attr::<f32>()
        .shape(())
        .create("fill_value")?
        .write_scalar(&product.fill_value().unwrap_or(f32::NAN))?;
    write_str_attr(
        &file,
        "history",
        &format!(
            "created by modgrid {} at {}",
            env!("CARGO_PKG_VERSION"),
            chrono::Utc::now().to_rfc3339()
        ),
    )?;

    let basemap = product.basemap_args();
    let group = file.create_group(BASEMAP_GROUP)?;
    write_str_attr(&group, "projection", &basemap.projection)?;
    for (name, value) in [
        ("lat_0", basemap.lat_0),
        ("lon_0", basemap.lon_0),
        ("llcrnrlat", basemap.llcrnrlat),
        ("llcrnrlon", basemap.llcrnrlon),
        ("urcrnrlat", basemap.urcrnrlat),
        ("urcrnrlon", basemap.urcrnrlon),
        ("rsphere", basemap.rsphere),
        ("width", basemap.width),
        ("height", basemap.height),
    ] {
        write_f64_attr(&group, name, value)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::product::tests::{names, resampled};
    use crate::core::product::ProductSpec;
    use approx::assert_relative_eq;

    #[test]
    fn test_container_layout() {
        let dir = tempfile::tempdir().unwrap();
        let out_file = dir.path().join("vancouver_zoom.h5");
        let names = names();
        let product = OutputProduct::new(
            resampled(8, 6),
            ProductSpec {
                channel_names: &names,
                red: 0,
                nir: 1,
                out_file: &out_file,
                comments: "subsampled to vancouver box",
            },
        )
        .unwrap();

        write_h5(&product).unwrap();

        let file = hdf5::File::open(&out_file).unwrap();
        let group = file.group(CHANNEL_GROUP).unwrap();
        let mut members = group.member_names().unwrap();
        members.sort();
        assert_eq!(members, vec!["modis1", "modis2", "modis3", "modis4", "ndvi"]);

        let ndvi = group.dataset("ndvi").unwrap().read_2d::<f32>().unwrap();
        assert_eq!(ndvi.dim(), (8, 6));
        assert_relative_eq!(ndvi[[3, 3]], 0.5, epsilon = 1e-6);
        let modis2 = group.dataset("modis2").unwrap().read_2d::<f32>().unwrap();
        assert_eq!(modis2[[0, 0]], 0.6);

        let comments = file.attr("comments").unwrap().read_scalar::<VarLenUnicode>().unwrap();
        assert_eq!(comments.as_str(), "subsampled to vancouver box");
        let geotransform = file.attr("geotransform").unwrap().read_raw::<f64>().unwrap();
        assert_eq!(geotransform, vec![-5000.0, 1000.0, 0.0, 5000.0, 0.0, -1000.0]);
        let fill = file.attr("fill_value").unwrap().read_scalar::<f32>().unwrap();
        assert!(fill.is_nan());

        let basemap = file.group(BASEMAP_GROUP).unwrap();
        let lat_0 = basemap.attr("lat_0").unwrap().read_scalar::<f64>().unwrap();
        assert_relative_eq!(lat_0, 47.5);
    }
}
