use crate::types::{LatLon, ModisError, ModisResult};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

/// Geographic corners and extent of a swath subset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Corners {
    pub ll: LatLon,
    pub lr: LatLon,
    pub ul: LatLon,
    pub ur: LatLon,
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
    /// Centre latitude, midway between min and max
    pub lat_0: f64,
    /// Centre longitude, midway between min and max
    pub lon_0: f64,
}

/// Corner coordinates of a 2D lat/lon grid.
///
/// Row 0 is taken as the top of the grid, so `ul`/`ur` come from the first row
/// and `ll`/`lr` from the last.
pub fn find_corners(lats: ArrayView2<'_, f32>, lons: ArrayView2<'_, f32>) -> ModisResult<Corners> {
    if lats.dim() != lons.dim() {
        return Err(ModisError::ShapeMismatch(format!(
            "latitude grid {:?} does not match longitude grid {:?}",
            lats.dim(),
            lons.dim()
        )));
    }
    let (rows, cols) = lats.dim();
    if rows == 0 || cols == 0 {
        return Err(ModisError::Processing("Cannot find corners of an empty grid".to_string()));
    }

    let (min_lat, max_lat) = finite_range(lats)
        .ok_or_else(|| ModisError::Processing("Latitude grid has no finite values".to_string()))?;
    let (min_lon, max_lon) = finite_range(lons)
        .ok_or_else(|| ModisError::Processing("Longitude grid has no finite values".to_string()))?;

    let at = |row: usize, col: usize| LatLon::new(lats[[row, col]] as f64, lons[[row, col]] as f64);

    let corners = Corners {
        ll: at(rows - 1, 0),
        lr: at(rows - 1, cols - 1),
        ul: at(0, 0),
        ur: at(0, cols - 1),
        min_lat,
        max_lat,
        min_lon,
        max_lon,
        lat_0: (min_lat + max_lat) / 2.0,
        lon_0: (min_lon + max_lon) / 2.0,
    };
    log::debug!("Subset corners: {:?}", corners);
    Ok(corners)
}

fn finite_range(values: ArrayView2<'_, f32>) -> Option<(f64, f64)> {
    values
        .iter()
        .filter(|v| v.is_finite())
        .fold(None, |range, &v| {
            let v = v as f64;
            match range {
                None => Some((v, v)),
                Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    #[test]
    fn test_regular_grid_corners() {
        let lats = Array2::from_shape_fn((50, 40), |(i, _)| 50.0 - i as f32 * 0.1);
        let lons = Array2::from_shape_fn((50, 40), |(_, j)| -125.0 + j as f32 * 0.125);

        let corners = find_corners(lats.view(), lons.view()).unwrap();
        assert_relative_eq!(corners.ul.lat, 50.0);
        assert_relative_eq!(corners.ul.lon, -125.0);
        assert_relative_eq!(corners.lr.lat, lats[[49, 39]] as f64);
        assert_relative_eq!(corners.lr.lon, lons[[49, 39]] as f64);
        assert_relative_eq!(corners.max_lat, 50.0);
        assert_relative_eq!(corners.min_lon, -125.0);
        assert_relative_eq!(corners.lat_0, (corners.min_lat + corners.max_lat) / 2.0);
        assert_relative_eq!(corners.lon_0, (corners.min_lon + corners.max_lon) / 2.0);
    }

    #[test]
    fn test_nan_values_are_ignored() {
        let mut lats = Array2::from_elem((3, 3), 10.0f32);
        lats[[1, 1]] = f32::NAN;
        lats[[0, 2]] = 12.0;
        let lons = Array2::from_elem((3, 3), 20.0f32);

        let corners = find_corners(lats.view(), lons.view()).unwrap();
        assert_relative_eq!(corners.max_lat, 12.0);
        assert_relative_eq!(corners.min_lat, 10.0);
    }

    #[test]
    fn test_degenerate_grids() {
        let empty = Array2::<f32>::zeros((0, 4));
        assert!(find_corners(empty.view(), empty.view()).is_err());

        let nans = Array2::from_elem((2, 2), f32::NAN);
        assert!(find_corners(nans.view(), nans.view()).is_err());
    }
}
