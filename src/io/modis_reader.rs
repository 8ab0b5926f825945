use crate::core::calibrate::{CalibrationCoefficients, ReflectanceCalibrator};
use crate::types::{GeoGrid, ModisError, ModisResult, ReflectanceImage};
use ndarray::{s, Array2};
use std::path::{Path, PathBuf};

/// Science data group of a Level-1B granule
pub const L1B_DATA_FIELDS: &str = "MODIS_SWATH_Type_L1B/Data Fields";
/// Geolocation group of a MOD03/MYD03 granule
pub const GEO_FIELDS: &str = "MODIS_Swath_Type_GEO/Geolocation Fields";

pub const SCALE_ATTR: &str = "reflectance_scales";
pub const OFFSET_ATTR: &str = "reflectance_offsets";

/// Location of a reflective solar band inside the Level-1B file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModisChannel {
    pub name: &'static str,
    pub field_name: &'static str,
    /// Band index along the first axis of `field_name`
    pub index: usize,
}

const EV_250: &str = "EV_250_Aggr1km_RefSB";
const EV_500: &str = "EV_500_Aggr1km_RefSB";
const EV_1KM: &str = "EV_1KM_RefSB";

const REFLECTIVE_CHANNELS: [ModisChannel; 22] = [
    ModisChannel { name: "1", field_name: EV_250, index: 0 },
    ModisChannel { name: "2", field_name: EV_250, index: 1 },
    ModisChannel { name: "3", field_name: EV_500, index: 0 },
    ModisChannel { name: "4", field_name: EV_500, index: 1 },
    ModisChannel { name: "5", field_name: EV_500, index: 2 },
    ModisChannel { name: "6", field_name: EV_500, index: 3 },
    ModisChannel { name: "7", field_name: EV_500, index: 4 },
    ModisChannel { name: "8", field_name: EV_1KM, index: 0 },
    ModisChannel { name: "9", field_name: EV_1KM, index: 1 },
    ModisChannel { name: "10", field_name: EV_1KM, index: 2 },
    ModisChannel { name: "11", field_name: EV_1KM, index: 3 },
    ModisChannel { name: "12", field_name: EV_1KM, index: 4 },
    ModisChannel { name: "13lo", field_name: EV_1KM, index: 5 },
    ModisChannel { name: "13hi", field_name: EV_1KM, index: 6 },
    ModisChannel { name: "14lo", field_name: EV_1KM, index: 7 },
    ModisChannel { name: "14hi", field_name: EV_1KM, index: 8 },
    ModisChannel { name: "15", field_name: EV_1KM, index: 9 },
    ModisChannel { name: "16", field_name: EV_1KM, index: 10 },
    ModisChannel { name: "17", field_name: EV_1KM, index: 11 },
    ModisChannel { name: "18", field_name: EV_1KM, index: 12 },
    ModisChannel { name: "19", field_name: EV_1KM, index: 13 },
    ModisChannel { name: "26", field_name: EV_1KM, index: 14 },
];

impl ModisChannel {
    pub fn lookup(name: &str) -> ModisResult<Self> {
        REFLECTIVE_CHANNELS
            .iter()
            .find(|c| c.name == name)
            .copied()
            .ok_or_else(|| {
                ModisError::InvalidFormat(format!("Unknown reflective MODIS channel '{}'", name))
            })
    }

    pub fn dataset_path(&self) -> String {
        format!("{}/{}", L1B_DATA_FIELDS, self.field_name)
    }
}

/// Reader for the calibrated-radiance (MxD021KM) granule
pub struct Level1bReader {
    file: hdf5::File,
    path: PathBuf,
}

impl Level1bReader {
    pub fn open<P: AsRef<Path>>(path: P) -> ModisResult<Self> {
        log::info!("Opening Level-1B granule: {}", path.as_ref().display());
        let file = hdf5::File::open(path.as_ref())?;
        Ok(Self {
            file,
            path: path.as_ref().to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw scaled integers for one band
    pub fn read_raw(&self, channel: &ModisChannel) -> ModisResult<Array2<u16>> {
        let dataset = self.file.dataset(&channel.dataset_path())?;
        let shape = dataset.shape();
        if shape.len() != 3 || channel.index >= shape[0] {
            return Err(ModisError::InvalidFormat(format!(
                "{} has shape {:?}, cannot read band index {}",
                channel.field_name, shape, channel.index
            )));
        }
        let raw = dataset.read_slice_2d::<u16, _>(s![channel.index, .., ..])?;
        log::debug!("Channel {}: raw {} x {}", channel.name, raw.nrows(), raw.ncols());
        Ok(raw)
    }

    pub fn read_coefficients(
        &self,
        channel: &ModisChannel,
    ) -> ModisResult<CalibrationCoefficients> {
        let dataset = self.file.dataset(&channel.dataset_path())?;
        let scales = dataset.attr(SCALE_ATTR)?.read_raw::<f64>()?;
        let offsets = dataset.attr(OFFSET_ATTR)?.read_raw::<f64>()?;
        CalibrationCoefficients::new(scales, offsets)
    }

    /// Calibrated reflectance for a channel given by name ("1", "2", "13lo", ...)
    pub fn read_reflectance(&self, name: &str) -> ModisResult<ReflectanceImage> {
        let channel = ModisChannel::lookup(name)?;
        let raw = self.read_raw(&channel)?;
        let calibrator = ReflectanceCalibrator::new(self.read_coefficients(&channel)?);
        calibrator.calibrate_band(raw.view(), channel.index)
    }

    pub fn read_reflectances<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> ModisResult<Vec<ReflectanceImage>> {
        names.iter().map(|name| self.read_reflectance(name.as_ref())).collect()
    }
}

/// Reader for the geolocation (MxD03) granule
pub struct GeolocationReader {
    file: hdf5::File,
}

impl GeolocationReader {
    pub fn open<P: AsRef<Path>>(path: P) -> ModisResult<Self> {
        log::info!("Opening geolocation granule: {}", path.as_ref().display());
        Ok(Self {
            file: hdf5::File::open(path.as_ref())?,
        })
    }

    pub fn read_geolocation(&self) -> ModisResult<GeoGrid> {
        let lats = self
            .file
            .dataset(&format!("{}/Latitude", GEO_FIELDS))?
            .read_2d::<f32>()?;
        let lons = self
            .file
            .dataset(&format!("{}/Longitude", GEO_FIELDS))?
            .read_2d::<f32>()?;
        log::debug!("Geolocation grid: {} x {}", lats.nrows(), lats.ncols());
        GeoGrid::new(lats, lons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_table() {
        let ch1 = ModisChannel::lookup("1").unwrap();
        assert_eq!((ch1.field_name, ch1.index), ("EV_250_Aggr1km_RefSB", 0));
        let ch4 = ModisChannel::lookup("4").unwrap();
        assert_eq!((ch4.field_name, ch4.index), ("EV_500_Aggr1km_RefSB", 1));
        let ch26 = ModisChannel::lookup("26").unwrap();
        assert_eq!((ch26.field_name, ch26.index), ("EV_1KM_RefSB", 14));
        assert_eq!(
            ch1.dataset_path(),
            "MODIS_SWATH_Type_L1B/Data Fields/EV_250_Aggr1km_RefSB"
        );
    }

    #[test]
    fn test_unknown_channel() {
        // thermal bands need radiance calibration, not reflectance
        assert!(ModisChannel::lookup("31").is_err());
        assert!(ModisChannel::lookup("").is_err());
    }
}
