//! Synthetic dataset generators
//!
//! Dataset acquisition is outside the engine; these generators stand in for it
//! in the CLI and tests. Images are Gaussian blobs on an empty canvas (values
//! in [0, 1], MNIST-shaped by default); sequences are per-sample sinusoids
//! with a trend and noise, so each sequence has a stable instance identity
//! plus local dynamics.

use ndarray::{Array3, Array4};
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Generate blob images of shape (num_images, 1, size, size), values in [0, 1]
pub fn synthetic_images(num_images: usize, size: usize) -> Array4<f32> {
    let mut rng = rand::thread_rng();
    let mut images = Array4::<f32>::zeros((num_images, 1, size, size));

    for n in 0..num_images {
        let cx = rng.gen_range(size / 4..3 * size / 4) as f32;
        let cy = rng.gen_range(size / 4..3 * size / 4) as f32;
        let sigma = rng.gen_range(1.0..(size as f32 / 6.0).max(1.5));

        for y in 0..size {
            for x in 0..size {
                let d2 = (x as f32 - cx).powi(2) + (y as f32 - cy).powi(2);
                images[[n, 0, y, x]] = (-d2 / (2.0 * sigma * sigma)).exp();
            }
        }
    }

    images
}

/// Generate multichannel sequences of shape (num_sequences, seq_len, channels)
///
/// Each sequence draws its own frequency, phase and trend slope per channel,
/// so the instance identity is constant along the sequence while the values
/// vary per timestep. Output is unnormalized; pass through
/// `normalize_sequences` before training.
pub fn synthetic_sequences(num_sequences: usize, seq_len: usize, channels: usize) -> Array3<f32> {
    let mut rng = rand::thread_rng();
    let noise = Normal::new(0.0f32, 0.05).expect("valid noise distribution");
    let mut data = Array3::<f32>::zeros((num_sequences, seq_len, channels));

    for n in 0..num_sequences {
        for c in 0..channels {
            let freq = rng.gen_range(0.5..3.0f32);
            let phase = rng.gen_range(0.0..std::f32::consts::TAU);
            let amplitude = rng.gen_range(0.5..1.5f32);
            let slope = rng.gen_range(-0.01..0.01f32);

            for t in 0..seq_len {
                let x = t as f32 / seq_len as f32;
                data[[n, t, c]] = amplitude * (std::f32::consts::TAU * freq * x + phase).sin()
                    + slope * t as f32
                    + noise.sample(&mut rng);
            }
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_images_shape_and_range() {
        let images = synthetic_images(5, 28);
        assert_eq!(images.shape(), &[5, 1, 28, 28]);
        assert!(images.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_synthetic_sequences_shape() {
        let data = synthetic_sequences(4, 50, 3);
        assert_eq!(data.shape(), &[4, 50, 3]);
    }
}
