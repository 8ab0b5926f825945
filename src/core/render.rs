//! Colour-mapped PNG rendering of a single layer

use crate::types::{GeoTransform, ModisError, ModisResult};
use image::{Rgba, RgbaImage};
use ndarray::{s, ArrayView2};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Diverging colour map with explicit over/under/bad colours
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Colormap {
    pub vmin: f32,
    pub vmax: f32,
    pub low: [u8; 3],
    pub mid: [u8; 3],
    pub high: [u8; 3],
    /// Above `vmax`
    pub over: [u8; 4],
    /// Below `vmin`
    pub under: [u8; 4],
    /// NaN / infinite
    pub bad: [u8; 4],
}

impl Colormap {
    /// Blue to light grey to green, for NDVI
    pub fn diverging(vmin: f32, vmax: f32) -> Self {
        Self {
            vmin,
            vmax,
            low: [86, 132, 214],
            mid: [242, 242, 242],
            high: [54, 163, 104],
            over: [0, 191, 191, 255],
            under: [0, 0, 0, 204],
            bad: [0, 0, 0, 26],
        }
    }

    pub fn color(&self, value: f32) -> Rgba<u8> {
        if !value.is_finite() {
            return Rgba(self.bad);
        }
        if value > self.vmax {
            return Rgba(self.over);
        }
        if value < self.vmin {
            return Rgba(self.under);
        }

        let t = if self.vmax > self.vmin {
            (value - self.vmin) / (self.vmax - self.vmin)
        } else {
            0.5
        };
        let (from, to, u) = if t < 0.5 {
            (self.low, self.mid, t * 2.0)
        } else {
            (self.mid, self.high, (t - 0.5) * 2.0)
        };
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * u).round() as u8;
        Rgba([mix(from[0], to[0]), mix(from[1], to[1]), mix(from[2], to[2]), 255])
    }
}

impl Default for Colormap {
    fn default() -> Self {
        Self::diverging(-0.9, 0.9)
    }
}

/// Zoom window in pixel coordinates: rows `ur_row..ll_row`, columns `ll_col..ur_col`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelWindow {
    pub ll_col: usize,
    pub ll_row: usize,
    pub ur_col: usize,
    pub ur_row: usize,
}

impl PixelWindow {
    pub fn full(rows: usize, cols: usize) -> Self {
        Self {
            ll_col: 0,
            ll_row: rows,
            ur_col: cols,
            ur_row: 0,
        }
    }

    pub fn validate(&self, rows: usize, cols: usize) -> ModisResult<()> {
        if self.ur_row >= self.ll_row
            || self.ll_col >= self.ur_col
            || self.ll_row > rows
            || self.ur_col > cols
        {
            return Err(ModisError::Processing(format!(
                "Zoom window {:?} does not fit a {} x {} image",
                self, rows, cols
            )));
        }
        Ok(())
    }

    pub fn crop<'a>(&self, data: ArrayView2<'a, f32>) -> ModisResult<ArrayView2<'a, f32>> {
        let (rows, cols) = data.dim();
        self.validate(rows, cols)?;
        Ok(data.slice_move(s![self.ur_row..self.ll_row, self.ll_col..self.ur_col]))
    }
}

/// Projected coordinates along the top row and left column of a zoom window
#[derive(Debug, Clone, PartialEq)]
pub struct WindowCoordinates {
    /// x of each column's left edge, taken along `ur_row`
    pub xline: Vec<f64>,
    /// y of each row's top edge, taken along `ll_col`
    pub yline: Vec<f64>,
}

pub fn window_coordinates(window: &PixelWindow, geotransform: &GeoTransform) -> WindowCoordinates {
    let xline = (window.ll_col..window.ur_col)
        .map(|col| geotransform.col_row_to_xy(col as f64, window.ur_row as f64).0)
        .collect();
    let yline = (window.ur_row..window.ll_row)
        .map(|row| geotransform.col_row_to_xy(window.ll_col as f64, row as f64).1)
        .collect();
    WindowCoordinates { xline, yline }
}

/// Colour-map `data` (optionally cropped to `window`) and save it as PNG
pub fn render_png<P: AsRef<Path>>(
    data: ArrayView2<'_, f32>,
    colormap: &Colormap,
    window: Option<&PixelWindow>,
    output_path: P,
) -> ModisResult<()> {
    let view = match window {
        Some(w) => w.crop(data)?,
        None => data,
    };
    let (rows, cols) = view.dim();
    log::info!("Rendering {} x {} image to {}", cols, rows, output_path.as_ref().display());

    let mut img = RgbaImage::new(cols as u32, rows as u32);
    for ((row, col), &value) in view.indexed_iter() {
        img.put_pixel(col as u32, row as u32, colormap.color(value));
    }
    img.save(output_path.as_ref())?;
    Ok(())
}

/// ESRI world file placing the rendered window in projected coordinates
pub fn write_world_file<P: AsRef<Path>>(
    window: &PixelWindow,
    geotransform: &GeoTransform,
    path: P,
) -> ModisResult<()> {
    let coords = window_coordinates(window, geotransform);
    let (x0, y0) = match (coords.xline.first(), coords.yline.first()) {
        (Some(&x), Some(&y)) => (x, y),
        _ => return Err(ModisError::Processing(format!("Empty zoom window {:?}", window))),
    };
    // world files reference the centre of the upper-left pixel
    let x_centre = x0 + 0.5 * (geotransform.pixel_width + geotransform.rotation_x);
    let y_centre = y0 + 0.5 * (geotransform.rotation_y + geotransform.pixel_height);
    let contents = format!(
        "{}\n{}\n{}\n{}\n{}\n{}\n",
        geotransform.pixel_width,
        geotransform.rotation_y,
        geotransform.rotation_x,
        geotransform.pixel_height,
        x_centre,
        y_centre
    );
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_colormap_extremes() {
        let cmap = Colormap::default();
        assert_eq!(cmap.color(f32::NAN), Rgba(cmap.bad));
        assert_eq!(cmap.color(f32::INFINITY), Rgba(cmap.bad));
        assert_eq!(cmap.color(0.95), Rgba(cmap.over));
        assert_eq!(cmap.color(-0.95), Rgba(cmap.under));
        assert_eq!(cmap.color(-0.9).0[..3], cmap.low);
        assert_eq!(cmap.color(0.0).0[..3], cmap.mid);
        assert_eq!(cmap.color(0.9).0[..3], cmap.high);
    }

    #[test]
    fn test_window_crop() {
        let data = Array2::from_shape_fn((300, 400), |(i, j)| (i * 1000 + j) as f32);
        let window = PixelWindow {
            ll_col: 200,
            ll_row: 200,
            ur_col: 300,
            ur_row: 100,
        };
        let zoom = window.crop(data.view()).unwrap();
        assert_eq!(zoom.dim(), (100, 100));
        assert_eq!(zoom[[0, 0]], data[[100, 200]]);

        let too_big = PixelWindow { ll_row: 301, ..window };
        assert!(too_big.crop(data.view()).is_err());
        let inverted = PixelWindow { ur_row: 250, ..window };
        assert!(inverted.crop(data.view()).is_err());
    }

    #[test]
    fn test_window_coordinates() {
        let gt = GeoTransform::from_gdal([-100.0, 10.0, 0.0, 500.0, 0.0, -10.0]);
        let window = PixelWindow {
            ll_col: 2,
            ll_row: 5,
            ur_col: 4,
            ur_row: 3,
        };
        let coords = window_coordinates(&window, &gt);
        assert_eq!(coords.xline, vec![-80.0, -70.0]);
        assert_eq!(coords.yline, vec![470.0, 460.0]);
    }

    #[test]
    fn test_render_png_and_world_file() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("ndvi.png");
        let pgw = dir.path().join("ndvi.pgw");
        let data = Array2::from_shape_fn((20, 30), |(i, j)| (j as f32 - i as f32) / 30.0);
        let window = PixelWindow {
            ll_col: 5,
            ll_row: 15,
            ur_col: 25,
            ur_row: 5,
        };

        render_png(data.view(), &Colormap::default(), Some(&window), &png).unwrap();
        let img = image::open(&png).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (20, 10));

        let gt = GeoTransform::from_gdal([0.0, 2.0, 0.0, 100.0, 0.0, -2.0]);
        write_world_file(&window, &gt, &pgw).unwrap();
        let lines: Vec<f64> = std::fs::read_to_string(&pgw)
            .unwrap()
            .lines()
            .map(|l| l.parse().unwrap())
            .collect();
        assert_eq!(lines, vec![2.0, 0.0, 0.0, -2.0, 11.0, 89.0]);
    }
}
