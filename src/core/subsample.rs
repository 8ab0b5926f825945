//! Crop full-swath arrays to a geographic bounding box

use crate::types::{BoundingBox, ChannelStack, ModisError, ModisResult, ReflectanceImage};
use ndarray::{s, Array2, Array3, ArrayView2, Axis, Zip};

/// Row/column window into a swath, half-open on both axes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwathWindow {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl SwathWindow {
    pub fn rows(&self) -> usize {
        self.row_end - self.row_start
    }

    pub fn cols(&self) -> usize {
        self.col_end - self.col_start
    }

    fn crop<A: Clone>(&self, array: ArrayView2<'_, A>) -> Array2<A> {
        array
            .slice(s![self.row_start..self.row_end, self.col_start..self.col_end])
            .to_owned()
    }
}

/// Latitude, longitude and channel grids cropped to a bounding box.
/// Every array has the same (rows, cols).
#[derive(Debug, Clone)]
pub struct SwathSubset {
    pub lats: Array2<f32>,
    pub lons: Array2<f32>,
    pub channels: Vec<ReflectanceImage>,
    pub window: SwathWindow,
}

impl SwathSubset {
    pub fn dim(&self) -> (usize, usize) {
        self.lats.dim()
    }

    /// Stack the channels into a rows x cols x N array
    pub fn stack(&self) -> ChannelStack {
        let (rows, cols) = self.dim();
        let mut stacked = Array3::<f32>::zeros((rows, cols, self.channels.len()));
        for (k, channel) in self.channels.iter().enumerate() {
            stacked.index_axis_mut(Axis(2), k).assign(channel);
        }
        stacked
    }
}

/// Smallest window that holds every pixel strictly inside `bbox`
pub fn find_window(
    lats: ArrayView2<'_, f32>,
    lons: ArrayView2<'_, f32>,
    bbox: &BoundingBox,
) -> ModisResult<SwathWindow> {
    if lats.dim() != lons.dim() {
        return Err(ModisError::ShapeMismatch(format!(
            "latitude grid {:?} does not match longitude grid {:?}",
            lats.dim(),
            lons.dim()
        )));
    }

    let mut window: Option<SwathWindow> = None;
    Zip::indexed(&lats).and(&lons).for_each(|(row, col), &lat, &lon| {
        if !bbox.contains(lat as f64, lon as f64) {
            return;
        }
        let w = window.get_or_insert(SwathWindow {
            row_start: row,
            row_end: row + 1,
            col_start: col,
            col_end: col + 1,
        });
        w.row_start = w.row_start.min(row);
        w.row_end = w.row_end.max(row + 1);
        w.col_start = w.col_start.min(col);
        w.col_end = w.col_end.max(col + 1);
    });

    window.ok_or(ModisError::EmptySubset(*bbox))
}

/// Crop every channel together with the geolocation grids to `bbox`
pub fn subsample(
    channels: &[ReflectanceImage],
    lats: ArrayView2<'_, f32>,
    lons: ArrayView2<'_, f32>,
    bbox: &BoundingBox,
) -> ModisResult<SwathSubset> {
    for (k, channel) in channels.iter().enumerate() {
        if channel.dim() != lats.dim() {
            return Err(ModisError::ShapeMismatch(format!(
                "channel {} has shape {:?}, geolocation has {:?}",
                k,
                channel.dim(),
                lats.dim()
            )));
        }
    }

    let window = find_window(lats, lons, bbox)?;
    log::info!(
        "Subsampling {} channel(s) to rows {}..{}, cols {}..{} ({} x {})",
        channels.len(),
        window.row_start,
        window.row_end,
        window.col_start,
        window.col_end,
        window.rows(),
        window.cols()
    );

    Ok(SwathSubset {
        lats: window.crop(lats),
        lons: window.crop(lons),
        channels: channels.iter().map(|c| window.crop(c.view())).collect(),
        window,
    })
}
