use crate::types::{ModisError, ModisResult, ReflectanceImage};
use ndarray::{ArrayView2, Zip};
use num_traits::AsPrimitive;

/// Per-band scale/offset pairs read from a Level-1B science dataset
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationCoefficients {
    pub scales: Vec<f64>,
    pub offsets: Vec<f64>,
}

impl CalibrationCoefficients {
    pub fn new(scales: Vec<f64>, offsets: Vec<f64>) -> ModisResult<Self> {
        if scales.len() != offsets.len() {
            return Err(ModisError::InvalidFormat(format!(
                "{} scales but {} offsets",
                scales.len(),
                offsets.len()
            )));
        }
        Ok(Self { scales, offsets })
    }

    /// (scale, offset) for band `index` within the dataset
    pub fn for_band(&self, index: usize) -> ModisResult<(f64, f64)> {
        match (self.scales.get(index), self.offsets.get(index)) {
            (Some(&scale), Some(&offset)) => Ok((scale, offset)),
            _ => Err(ModisError::InvalidFormat(format!(
                "No calibration coefficients for band index {} (have {})",
                index,
                self.scales.len()
            ))),
        }
    }
}

/// Convert raw digital numbers to reflectance: `(raw - offset) * scale`.
///
/// The arithmetic is done in double precision and the result is narrowed to `f32`.
pub fn calibrate<T>(raw: ArrayView2<'_, T>, scale: f64, offset: f64) -> ReflectanceImage
where
    T: AsPrimitive<f64> + Send + Sync,
{
    let convert = |&dn: &T| ((dn.as_() - offset) * scale) as f32;

    #[cfg(feature = "parallel")]
    let calibrated = Zip::from(&raw).par_map_collect(convert);
    #[cfg(not(feature = "parallel"))]
    let calibrated = Zip::from(&raw).map_collect(convert);

    calibrated
}

/// Reflectance calibration for one band of a multi-band dataset
pub struct ReflectanceCalibrator {
    coefficients: CalibrationCoefficients,
}

impl ReflectanceCalibrator {
    pub fn new(coefficients: CalibrationCoefficients) -> Self {
        Self { coefficients }
    }

    pub fn calibrate_band<T>(
        &self,
        raw: ArrayView2<'_, T>,
        band_index: usize,
    ) -> ModisResult<ReflectanceImage>
    where
        T: AsPrimitive<f64> + Send + Sync,
    {
        let (scale, offset) = self.coefficients.for_band(band_index)?;
        log::debug!(
            "Calibrating band index {} ({} x {}): scale={:e}, offset={}",
            band_index,
            raw.nrows(),
            raw.ncols(),
            scale,
            offset
        );
        Ok(calibrate(raw, scale, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    #[test]
    fn test_calibration_formula() {
        let raw = Array2::from_shape_fn((4, 5), |(i, j)| (i * 5 + j) as u16 * 100);
        let scale = 5.2e-5;
        let offset = 316.9722;

        let calibrated = calibrate(raw.view(), scale, offset);
        assert_eq!(calibrated.dim(), (4, 5));
        for (&dn, &r) in raw.iter().zip(calibrated.iter()) {
            assert_eq!(r, ((dn as f64 - offset) * scale) as f32);
        }
    }

    #[test]
    fn test_identity_calibration() {
        // scale 1, offset 0 leaves values unchanged
        let raw = Array2::from_shape_fn((100, 100), |(i, j)| (i as f64) * 0.25 + j as f64);
        let calibrated = calibrate(raw.view(), 1.0, 0.0);
        for (&a, &b) in raw.iter().zip(calibrated.iter()) {
            assert_relative_eq!(a as f32, b);
        }
    }

    #[test]
    fn test_band_lookup() {
        let coefficients = CalibrationCoefficients::new(vec![2.0, 3.0], vec![10.0, 20.0]).unwrap();
        let calibrator = ReflectanceCalibrator::new(coefficients);
        let raw = Array2::from_elem((2, 2), 30u16);

        let band1 = calibrator.calibrate_band(raw.view(), 1).unwrap();
        assert!(band1.iter().all(|&v| v == 30.0));
        assert!(calibrator.calibrate_band(raw.view(), 2).is_err());
    }

    #[test]
    fn test_mismatched_coefficients() {
        assert!(CalibrationCoefficients::new(vec![1.0], vec![]).is_err());
    }
}
