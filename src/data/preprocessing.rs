//! Preprocessing utilities for sequence datasets
//!
//! Sequence decoders end in a tanh activation, so training data must live in
//! [-1, 1]. Normalization is per-channel min-max over the whole dataset;
//! the parameters are kept so generated samples can be mapped back.

use ndarray::Array3;

/// Per-channel normalization parameters for denormalization
#[derive(Debug, Clone)]
pub struct NormalizationParams {
    pub min_vals: Vec<f32>,
    pub max_vals: Vec<f32>,
}

/// Normalize sequences to [-1, 1] per channel
///
/// Formula: x_norm = 2 * (x - min) / (max - min) - 1
///
/// # Arguments
///
/// * `data` - Array of shape (num_sequences, sequence_length, num_channels)
///
/// # Returns
///
/// Tuple of (normalized data, normalization parameters)
pub fn normalize_sequences(data: &Array3<f32>) -> (Array3<f32>, NormalizationParams) {
    let num_channels = data.shape()[2];
    let mut min_vals = vec![f32::MAX; num_channels];
    let mut max_vals = vec![f32::MIN; num_channels];

    for seq in data.outer_iter() {
        for row in seq.outer_iter() {
            for (c, &val) in row.iter().enumerate() {
                if val < min_vals[c] {
                    min_vals[c] = val;
                }
                if val > max_vals[c] {
                    max_vals[c] = val;
                }
            }
        }
    }

    let mut normalized = data.clone();
    for c in 0..num_channels {
        let range = max_vals[c] - min_vals[c];
        if range > 0.0 {
            normalized
                .index_axis_mut(ndarray::Axis(2), c)
                .mapv_inplace(|v| 2.0 * (v - min_vals[c]) / range - 1.0);
        } else {
            // Constant channel carries no information
            normalized
                .index_axis_mut(ndarray::Axis(2), c)
                .mapv_inplace(|_| 0.0);
        }
    }

    (normalized, NormalizationParams { min_vals, max_vals })
}

/// Map sequences from [-1, 1] back to the original scale
///
/// Formula: x = (x_norm + 1) / 2 * (max - min) + min
pub fn denormalize_sequences(data: &Array3<f32>, params: &NormalizationParams) -> Array3<f32> {
    let mut result = data.clone();
    for c in 0..params.min_vals.len() {
        let range = params.max_vals[c] - params.min_vals[c];
        result
            .index_axis_mut(ndarray::Axis(2), c)
            .mapv_inplace(|v| (v + 1.0) / 2.0 * range + params.min_vals[c]);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_normalize_range() {
        let data = Array3::from_shape_fn((4, 10, 2), |(i, j, c)| (i + j + c) as f32);
        let (normalized, _) = normalize_sequences(&data);

        for &v in normalized.iter() {
            assert!((-1.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_normalize_roundtrip() {
        let data = Array3::from_shape_fn((3, 8, 2), |(i, j, c)| (i * 10 + j * 2 + c) as f32);
        let (normalized, params) = normalize_sequences(&data);
        let restored = denormalize_sequences(&normalized, &params);

        for (a, b) in data.iter().zip(restored.iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_constant_channel_maps_to_zero() {
        let data = Array3::from_elem((2, 5, 1), 7.0f32);
        let (normalized, _) = normalize_sequences(&data);
        assert!(normalized.iter().all(|&v| v == 0.0));
    }
}
