//! Nearest-neighbour resampling of swath channels onto a regular map grid
//!
//! The target grid is a Lambert azimuthal equal-area projection centred on the
//! swath subset. Swath pixels are projected through GDAL/PROJ, bucketed by output
//! cell, and each output cell takes the value of the closest swath pixel within
//! the radius of influence. Cells with no such pixel receive the fill value.

use crate::core::corners::Corners;
use crate::types::{ChannelStack, GeoTransform, LatLon, ModisError, ModisResult};
use gdal::spatial_ref::{CoordTransform, SpatialRef};
use ndarray::{s, Array3, ArrayView2, ArrayView3, Axis};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// WGS84 equatorial radius, used as the basemap sphere radius
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Resampling parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleParams {
    /// Output pixel size in metres
    pub pixel_size_m: f64,
    /// Maximum distance from a cell centre to the swath pixel it takes its value from
    pub radius_of_influence_m: f64,
    /// Value for cells without a swath pixel in range; NaN when unset
    pub fill_value: Option<f32>,
}

impl Default for ResampleParams {
    fn default() -> Self {
        Self {
            pixel_size_m: 1300.0,
            radius_of_influence_m: 5000.0,
            fill_value: None,
        }
    }
}

/// Georeferencing needed to write the grid as a GeoTIFF
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoTiffArgs {
    pub geotransform: GeoTransform,
    pub proj4_string: String,
    pub width: usize,
    pub height: usize,
}

/// Map projection parameters for drawing the grid on a basemap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasemapArgs {
    pub projection: String,
    pub lat_0: f64,
    pub lon_0: f64,
    pub llcrnrlat: f64,
    pub llcrnrlon: f64,
    pub urcrnrlat: f64,
    pub urcrnrlon: f64,
    pub rsphere: f64,
    /// Grid extent in projected metres
    pub width: f64,
    pub height: f64,
}

/// Channels resampled onto the output grid, with georeferencing
#[derive(Debug, Clone)]
pub struct ResampledProduct {
    /// rows x cols x channels
    pub channels: ChannelStack,
    pub geotiff_args: GeoTiffArgs,
    pub fill_value: Option<f32>,
    pub basemap_args: BasemapArgs,
}

impl ResampledProduct {
    /// Fill value as stored in files; NaN when none was configured
    pub fn nodata(&self) -> f32 {
        self.fill_value.unwrap_or(f32::NAN)
    }
}

/// PROJ definition of the equal-area grid centred on (lat_0, lon_0)
pub fn laea_proj4(lat_0: f64, lon_0: f64) -> String {
    format!(
        "+proj=laea +lat_0={} +lon_0={} +datum=WGS84 +units=m +no_defs",
        lat_0, lon_0
    )
}

fn wgs84() -> ModisResult<SpatialRef> {
    let srs = SpatialRef::from_epsg(4326)?;
    // x = lon, y = lat
    srs.set_axis_mapping_strategy(gdal_sys::OSRAxisMappingStrategy::OAMS_TRADITIONAL_GIS_ORDER);
    Ok(srs)
}

/// Swath-to-grid resampler
pub struct Resampler {
    params: ResampleParams,
}

impl Resampler {
    pub fn new(params: ResampleParams) -> ModisResult<Self> {
        if !(params.pixel_size_m > 0.0) || !(params.radius_of_influence_m > 0.0) {
            return Err(ModisError::Processing(format!(
                "Pixel size and radius of influence must be positive: {:?}",
                params
            )));
        }
        Ok(Self { params })
    }

    /// Resample a rows x cols x channels stack onto an equal-area grid centred on `corners`
    pub fn resample_channels(
        &self,
        stack: ArrayView3<'_, f32>,
        lats: ArrayView2<'_, f32>,
        lons: ArrayView2<'_, f32>,
        corners: &Corners,
    ) -> ModisResult<ResampledProduct> {
        let (rows, cols, nchan) = stack.dim();
        if lats.dim() != (rows, cols) || lons.dim() != (rows, cols) {
            return Err(ModisError::ShapeMismatch(format!(
                "channel stack {:?} vs latitude {:?} / longitude {:?}",
                (rows, cols),
                lats.dim(),
                lons.dim()
            )));
        }
        log::info!(
            "Resampling {} channel(s) of {} x {} swath pixels at {} m",
            nchan,
            rows,
            cols,
            self.params.pixel_size_m
        );

        let proj4_string = laea_proj4(corners.lat_0, corners.lon_0);
        let geographic = wgs84()?;
        let projected = SpatialRef::from_proj4(&proj4_string)?;
        let forward = CoordTransform::new(&geographic, &projected)?;

        // project every valid swath pixel
        let mut sources = Vec::with_capacity(rows * cols);
        let mut xs = Vec::with_capacity(rows * cols);
        let mut ys = Vec::with_capacity(rows * cols);
        for ((row, col), &lat) in lats.indexed_iter() {
            let lon = lons[[row, col]];
            if lat.is_finite() && lon.is_finite() && lat.abs() <= 90.0 && lon.abs() <= 180.0 {
                sources.push((row, col));
                xs.push(lon as f64);
                ys.push(lat as f64);
            }
        }
        if sources.is_empty() {
            return Err(ModisError::Processing(
                "No valid geolocation in swath subset".to_string(),
            ));
        }
        let mut zs: [f64; 0] = [];
        forward.transform_coords(&mut xs, &mut ys, &mut zs)?;

        let grid = OutputGrid::covering(&xs, &ys, self.params.pixel_size_m);
        log::debug!(
            "Output grid: {} x {} cells, x0={:.1}, y0={:.1}",
            grid.nrows,
            grid.ncols,
            grid.x_min,
            grid.y_max
        );

        let buckets = CellBuckets::build(&grid, &xs, &ys);
        let nearest = self.nearest_sources(&grid, &buckets, &xs, &ys);

        let fill = self.params.fill_value.unwrap_or(f32::NAN);
        let mut channels = Array3::from_elem((grid.nrows, grid.ncols, nchan), fill);
        let mut filled = 0usize;
        for (cell, source) in nearest.iter().enumerate() {
            if let Some(p) = *source {
                let (src_row, src_col) = sources[p];
                let (row, col) = (cell / grid.ncols, cell % grid.ncols);
                channels
                    .slice_mut(s![row, col, ..])
                    .assign(&stack.slice(s![src_row, src_col, ..]));
                filled += 1;
            }
        }
        let coverage = filled as f64 / nearest.len() as f64;
        log::info!(
            "Filled {} of {} output cells ({:.1}%)",
            filled,
            nearest.len(),
            100.0 * coverage
        );
        if filled == 0 {
            log::warn!(
                "No output cell is within {} m of a swath pixel",
                self.params.radius_of_influence_m
            );
        }

        let geotransform = grid.geotransform();
        let basemap_args = basemap_args(&grid, &projected, &geographic, corners)?;

        Ok(ResampledProduct {
            channels,
            geotiff_args: GeoTiffArgs {
                geotransform,
                proj4_string,
                width: grid.ncols,
                height: grid.nrows,
            },
            fill_value: self.params.fill_value,
            basemap_args,
        })
    }

    /// Index of the nearest source point for every output cell, row-major
    fn nearest_sources(
        &self,
        grid: &OutputGrid,
        buckets: &CellBuckets,
        xs: &[f64],
        ys: &[f64],
    ) -> Vec<Option<usize>> {
        let radius = self.params.radius_of_influence_m;
        let reach = (radius / grid.pixel_size).ceil() as usize;

        let search_row = |(row, out_row): (usize, &mut [Option<usize>])| {
            let row_lo = row.saturating_sub(reach);
            let row_hi = (row + reach).min(grid.nrows - 1);
            for (col, out) in out_row.iter_mut().enumerate() {
                let (cx, cy) = grid.cell_center(row, col);
                let col_lo = col.saturating_sub(reach);
                let col_hi = (col + reach).min(grid.ncols - 1);

                let mut best = radius;
                for r in row_lo..=row_hi {
                    for c in col_lo..=col_hi {
                        for &p in buckets.points(r * grid.ncols + c) {
                            let d = (xs[p] - cx).hypot(ys[p] - cy);
                            if d <= best {
                                best = d;
                                *out = Some(p);
                            }
                        }
                    }
                }
            }
        };

        let mut nearest = vec![None; grid.nrows * grid.ncols];
        #[cfg(feature = "parallel")]
        nearest
            .par_chunks_mut(grid.ncols)
            .enumerate()
            .for_each(search_row);
        #[cfg(not(feature = "parallel"))]
        nearest.chunks_mut(grid.ncols).enumerate().for_each(search_row);
        nearest
    }
}

/// Regular north-up grid covering a set of projected points
#[derive(Debug, Clone, Copy)]
struct OutputGrid {
    x_min: f64,
    y_max: f64,
    pixel_size: f64,
    nrows: usize,
    ncols: usize,
}

impl OutputGrid {
    fn covering(xs: &[f64], ys: &[f64], pixel_size: f64) -> Self {
        let (x_min, x_max) = extent(xs);
        let (y_min, y_max) = extent(ys);
        let ncols = (((x_max - x_min) / pixel_size).ceil() as usize).max(1);
        let nrows = (((y_max - y_min) / pixel_size).ceil() as usize).max(1);
        Self {
            x_min,
            y_max,
            pixel_size,
            nrows,
            ncols,
        }
    }

    fn geotransform(&self) -> GeoTransform {
        GeoTransform::from_gdal([
            self.x_min,
            self.pixel_size,
            0.0,
            self.y_max,
            0.0,
            -self.pixel_size,
        ])
    }

    fn cell_of(&self, x: f64, y: f64) -> (usize, usize) {
        let col = ((x - self.x_min) / self.pixel_size).floor().max(0.0) as usize;
        let row = ((self.y_max - y) / self.pixel_size).floor().max(0.0) as usize;
        (row.min(self.nrows - 1), col.min(self.ncols - 1))
    }

    fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.geotransform().col_row_to_xy(col as f64 + 0.5, row as f64 + 0.5)
    }

    fn width_m(&self) -> f64 {
        self.ncols as f64 * self.pixel_size
    }

    fn height_m(&self) -> f64 {
        self.nrows as f64 * self.pixel_size
    }
}

fn extent(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

/// Source points grouped by output cell (compressed row storage)
struct CellBuckets {
    offsets: Vec<usize>,
    points: Vec<usize>,
}

impl CellBuckets {
    fn build(grid: &OutputGrid, xs: &[f64], ys: &[f64]) -> Self {
        let ncells = grid.nrows * grid.ncols;
        let cells: Vec<usize> = xs
            .iter()
            .zip(ys)
            .map(|(&x, &y)| {
                let (row, col) = grid.cell_of(x, y);
                row * grid.ncols + col
            })
            .collect();

        let mut offsets = vec![0usize; ncells + 1];
        for &cell in &cells {
            offsets[cell + 1] += 1;
        }
        for i in 0..ncells {
            offsets[i + 1] += offsets[i];
        }

        let mut cursor = offsets.clone();
        let mut points = vec![0usize; cells.len()];
        for (p, &cell) in cells.iter().enumerate() {
            points[cursor[cell]] = p;
            cursor[cell] += 1;
        }
        Self { offsets, points }
    }

    fn points(&self, cell: usize) -> &[usize] {
        &self.points[self.offsets[cell]..self.offsets[cell + 1]]
    }
}

fn basemap_args(
    grid: &OutputGrid,
    projected: &SpatialRef,
    geographic: &SpatialRef,
    corners: &Corners,
) -> ModisResult<BasemapArgs> {
    let inverse = CoordTransform::new(projected, geographic)?;
    let gt = grid.geotransform();
    let (ll_x, ll_y) = gt.col_row_to_xy(0.0, grid.nrows as f64);
    let (ur_x, ur_y) = gt.col_row_to_xy(grid.ncols as f64, 0.0);

    let mut xs = [ll_x, ur_x];
    let mut ys = [ll_y, ur_y];
    let mut zs: [f64; 0] = [];
    inverse.transform_coords(&mut xs, &mut ys, &mut zs)?;
    let ll = LatLon::new(ys[0], xs[0]);
    let ur = LatLon::new(ys[1], xs[1]);

    Ok(BasemapArgs {
        projection: "laea".to_string(),
        lat_0: corners.lat_0,
        lon_0: corners.lon_0,
        llcrnrlat: ll.lat,
        llcrnrlon: ll.lon,
        urcrnrlat: ur.lat,
        urcrnrlon: ur.lon,
        rsphere: EARTH_RADIUS_M,
        width: grid.width_m(),
        height: grid.height_m(),
    })
}

/// Pull one channel out of a resampled stack
pub fn channel(product: &ResampledProduct, index: usize) -> ModisResult<ArrayView2<'_, f32>> {
    let nchan = product.channels.len_of(Axis(2));
    if index >= nchan {
        return Err(ModisError::Processing(format!(
            "Channel index {} out of range for {} channel(s)",
            index, nchan
        )));
    }
    Ok(product.channels.index_axis(Axis(2), index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> OutputGrid {
        OutputGrid {
            x_min: -1000.0,
            y_max: 2000.0,
            pixel_size: 500.0,
            nrows: 8,
            ncols: 4,
        }
    }

    #[test]
    fn test_covering_grid() {
        let xs = [0.0, 1000.0, 2600.0];
        let ys = [0.0, -500.0, 900.0];
        let g = OutputGrid::covering(&xs, &ys, 1000.0);
        assert_eq!(g.ncols, 3);
        assert_eq!(g.nrows, 2);
        assert_eq!(g.geotransform().to_gdal(), [0.0, 1000.0, 0.0, 900.0, 0.0, -1000.0]);
    }

    #[test]
    fn test_cell_lookup_clamps_to_grid() {
        let g = grid();
        assert_eq!(g.cell_of(-1000.0, 2000.0), (0, 0));
        assert_eq!(g.cell_of(-760.0, 1400.0), (1, 0));
        // the far edge belongs to the last cell
        assert_eq!(g.cell_of(1000.0, -2000.0), (7, 3));
        assert_eq!(g.cell_center(0, 0), (-750.0, 1750.0));
    }

    #[test]
    fn test_buckets_group_points_by_cell() {
        let g = grid();
        let xs = [-900.0, 900.0, -800.0];
        let ys = [1900.0, -1900.0, 1800.0];
        let buckets = CellBuckets::build(&g, &xs, &ys);

        assert_eq!(buckets.points(0), &[0, 2]);
        assert_eq!(buckets.points(7 * 4 + 3), &[1]);
        assert!(buckets.points(5).is_empty());
    }

    #[test]
    fn test_nearest_sources_respects_radius() {
        let g = grid();
        let xs = [-750.0];
        let ys = [1750.0];
        let buckets = CellBuckets::build(&g, &xs, &ys);
        let resampler = Resampler::new(ResampleParams {
            pixel_size_m: 500.0,
            radius_of_influence_m: 600.0,
            fill_value: None,
        })
        .unwrap();

        let nearest = resampler.nearest_sources(&g, &buckets, &xs, &ys);
        assert_eq!(nearest[0], Some(0));
        assert_eq!(nearest[1], Some(0));
        assert_eq!(nearest[4], Some(0));
        // diagonal neighbour is ~707 m away
        assert_eq!(nearest[5], None);
        assert_eq!(nearest[31], None);
    }

    #[test]
    fn test_invalid_params() {
        let params = ResampleParams {
            pixel_size_m: 0.0,
            ..ResampleParams::default()
        };
        assert!(Resampler::new(params).is_err());
    }

    #[test]
    fn test_laea_proj4() {
        assert_eq!(
            laea_proj4(47.5, -122.5),
            "+proj=laea +lat_0=47.5 +lon_0=-122.5 +datum=WGS84 +units=m +no_defs"
        );
    }
}
