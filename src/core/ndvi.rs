use crate::types::{ChannelStack, ModisError, ModisResult, ReflectanceImage};
use ndarray::{concatenate, ArrayView2, ArrayView3, Axis, Zip};

/// Elementwise `(b - a) / (b + a)`.
///
/// A zero denominator is not masked: IEEE division gives +/-inf or NaN.
pub fn normalized_difference(
    a: ArrayView2<'_, f32>,
    b: ArrayView2<'_, f32>,
) -> ModisResult<ReflectanceImage> {
    if a.dim() != b.dim() {
        return Err(ModisError::ShapeMismatch(format!(
            "normalized difference inputs {:?} and {:?}",
            a.dim(),
            b.dim()
        )));
    }

    let diff = |&a: &f32, &b: &f32| (b - a) / (b + a);

    #[cfg(feature = "parallel")]
    let index = Zip::from(&a).and(&b).par_map_collect(diff);
    #[cfg(not(feature = "parallel"))]
    let index = Zip::from(&a).and(&b).map_collect(diff);

    Ok(index)
}

/// NDVI from the red (MODIS channel 1) and near-infrared (channel 2) reflectances
pub fn ndvi(red: ArrayView2<'_, f32>, nir: ArrayView2<'_, f32>) -> ModisResult<ReflectanceImage> {
    let index = normalized_difference(red, nir)?;

    let undefined = index.iter().filter(|v| !v.is_finite()).count();
    if undefined > 0 {
        log::debug!("NDVI: {} of {} pixels are not finite", undefined, index.len());
    }
    Ok(index)
}

/// Append a 2D layer as a new trailing channel of `stack`
pub fn append_layer<'a>(
    stack: ArrayView3<'a, f32>,
    layer: ArrayView2<'a, f32>,
) -> ModisResult<ChannelStack> {
    let (rows, cols, _) = stack.dim();
    if layer.dim() != (rows, cols) {
        return Err(ModisError::ShapeMismatch(format!(
            "layer {:?} does not match stack rows/cols {:?}",
            layer.dim(),
            (rows, cols)
        )));
    }

    concatenate(Axis(2), &[stack, layer.insert_axis(Axis(2))])
        .map_err(|e| ModisError::ShapeMismatch(format!("Failed to append layer: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{s, Array2, Array3};

    #[test]
    fn test_constant_ndvi() {
        let red = Array2::from_elem((100, 100), 0.2f32);
        let nir = Array2::from_elem((100, 100), 0.6f32);

        let index = ndvi(red.view(), nir.view()).unwrap();
        for &v in index.iter() {
            assert_relative_eq!(v, 0.5, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_ndvi_bounds_for_non_negative_inputs() {
        let red = Array2::from_shape_fn((20, 20), |(i, j)| (i as f32) * 0.05 + 0.001 * j as f32);
        let nir = Array2::from_shape_fn((20, 20), |(i, j)| (j as f32) * 0.04 + 0.002 * i as f32);

        let index = ndvi(red.view(), nir.view()).unwrap();
        for ((&a, &b), &v) in red.iter().zip(nir.iter()).zip(index.iter()) {
            if a + b != 0.0 {
                assert_eq!(v, (b - a) / (b + a));
                assert!((-1.0..=1.0).contains(&v));
            }
        }
    }

    #[test]
    fn test_zero_denominator_follows_ieee() {
        let a = Array2::from_shape_vec((1, 3), vec![0.0f32, 0.5, -0.5]).unwrap();
        let b = Array2::from_shape_vec((1, 3), vec![0.0f32, -0.5, 0.5]).unwrap();

        let index = normalized_difference(a.view(), b.view()).unwrap();
        assert!(index[[0, 0]].is_nan());
        assert!(index[[0, 1]].is_infinite() && index[[0, 1]] < 0.0);
        assert!(index[[0, 2]].is_infinite() && index[[0, 2]] > 0.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let a = Array2::<f32>::zeros((2, 3));
        let b = Array2::<f32>::zeros((3, 2));
        assert!(normalized_difference(a.view(), b.view()).is_err());
    }

    #[test]
    fn test_append_layer() {
        let stack = Array3::from_shape_fn((3, 4, 4), |(i, j, k)| (i * 100 + j * 10 + k) as f32);
        let layer = Array2::from_elem((3, 4), -1.0f32);

        let grown = append_layer(stack.view(), layer.view()).unwrap();
        assert_eq!(grown.dim(), (3, 4, 5));
        assert_eq!(grown.slice(s![.., .., ..4]), stack);
        assert!(grown.slice(s![.., .., 4]).iter().all(|&v| v == -1.0));

        let wrong = Array2::<f32>::zeros((4, 3));
        assert!(append_layer(stack.view(), wrong.view()).is_err());
    }
}
