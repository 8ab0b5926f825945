use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

/// Single-precision reflectance value
pub type Reflectance = f32;

/// 2D reflectance array (rows x cols)
pub type ReflectanceImage = Array2<Reflectance>;

/// 3D channel stack (rows x cols x channels)
pub type ChannelStack = Array3<Reflectance>;

/// Geographic point in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Geographic region of interest given by its lower-left and upper-right corners
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub llcrnr: LatLon,
    pub urcrnr: LatLon,
}

impl BoundingBox {
    pub fn new(llcrnr: LatLon, urcrnr: LatLon) -> Self {
        Self { llcrnr, urcrnr }
    }

    /// Strict containment test; points on the edge are outside
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat > self.llcrnr.lat
            && lat < self.urcrnr.lat
            && lon > self.llcrnr.lon
            && lon < self.urcrnr.lon
    }
}

impl Default for BoundingBox {
    /// 5 degree box around Vancouver
    fn default() -> Self {
        Self {
            llcrnr: LatLon::new(45.0, -125.0),
            urcrnr: LatLon::new(50.0, -120.0),
        }
    }
}

/// Parallel latitude/longitude grids for a swath
#[derive(Debug, Clone)]
pub struct GeoGrid {
    pub lats: Array2<f32>,
    pub lons: Array2<f32>,
}

impl GeoGrid {
    pub fn new(lats: Array2<f32>, lons: Array2<f32>) -> ModisResult<Self> {
        if lats.dim() != lons.dim() {
            return Err(ModisError::ShapeMismatch(format!(
                "latitude grid {:?} does not match longitude grid {:?}",
                lats.dim(),
                lons.dim()
            )));
        }
        Ok(Self { lats, lons })
    }

    pub fn dim(&self) -> (usize, usize) {
        self.lats.dim()
    }
}

/// Six-parameter affine transform in GDAL order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    /// Projected coordinates of the upper-left corner of pixel (col, row)
    pub fn col_row_to_xy(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.top_left_x + col * self.pixel_width + row * self.rotation_x;
        let y = self.top_left_y + col * self.rotation_y + row * self.pixel_height;
        (x, y)
    }

    /// Pixel (col, row) containing the projected point (x, y)
    pub fn xy_to_col_row(&self, x: f64, y: f64) -> ModisResult<(i64, i64)> {
        let det = self.pixel_width * self.pixel_height - self.rotation_x * self.rotation_y;
        if det == 0.0 {
            return Err(ModisError::Processing(
                "Geotransform is not invertible".to_string(),
            ));
        }
        let dx = x - self.top_left_x;
        let dy = y - self.top_left_y;
        let col = (self.pixel_height * dx - self.rotation_x * dy) / det;
        let row = (-self.rotation_y * dx + self.pixel_width * dy) / det;
        Ok((col.floor() as i64, row.floor() as i64))
    }
}

/// Error types for MODIS processing
#[derive(Debug, thiserror::Error)]
pub enum ModisError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("No swath pixels fall inside {0:?}")]
    EmptySubset(BoundingBox),

    #[error("Download error: {0}")]
    Download(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result type for MODIS operations
pub type ModisResult<T> = Result<T, ModisError>;
