//! Granule acquisition, HDF5 and GeoTIFF I/O

pub mod download;
pub mod geotiff;
pub mod h5_writer;
pub mod modis_reader;

pub use download::Downloader;
pub use geotiff::write_geotiff;
pub use h5_writer::write_h5;
pub use modis_reader::{GeolocationReader, Level1bReader, ModisChannel};
