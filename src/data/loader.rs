//! Batch sources for training
//!
//! Provides in-memory loaders for both modalities with support for:
//! - Random shuffling per epoch
//! - Drop last incomplete batch
//! - Restartable epoch iteration via `reset`
//!
//! Sequence batches additionally carry two random contiguous sub-windows of
//! each sequence, used by the instance-consistency loss.

use ndarray::{s, Array3, Array4};
use rand::seq::SliceRandom;
use rand::Rng;
use tch::Tensor;

use crate::error::{AaeError, Result};

/// A single training batch, one variant per modality
#[derive(Debug)]
pub enum Batch {
    /// Image tensor of shape (batch, 1, height, width), values in [0, 1]
    Image(Tensor),
    /// Sequence batch with full sequences and two sub-window views
    Sequence(SequenceBatch),
}

/// Sequence batch with sub-window views for the consistency loss
#[derive(Debug)]
pub struct SequenceBatch {
    /// Full sequences of shape (batch, seq_len, channels), values in [-1, 1]
    pub sequences: Tensor,
    /// First sub-window view of shape (batch, window_len, channels)
    pub window_a: Tensor,
    /// Second sub-window view of shape (batch, window_len, channels)
    pub window_b: Tensor,
}

impl Batch {
    /// The tensor fed to the encoder (full images or full sequences)
    pub fn input(&self) -> &Tensor {
        match self {
            Batch::Image(xs) => xs,
            Batch::Sequence(sb) => &sb.sequences,
        }
    }

    /// Number of samples in the batch
    pub fn batch_size(&self) -> i64 {
        self.input().size()[0]
    }
}

/// Source of training batches consumed by the trainer
///
/// `next_batch` returns `None` at end of epoch; `reset` restarts the epoch
/// (reshuffling if enabled). End of epoch is control flow, not an error.
pub trait BatchSource {
    /// Get the next batch, or `None` when the epoch is complete
    fn next_batch(&mut self) -> Result<Option<Batch>>;

    /// Restart iteration for a new epoch
    fn reset(&mut self);

    /// Number of batches per epoch
    fn num_batches(&self) -> usize;
}

/// Shared index bookkeeping for the in-memory loaders
#[derive(Debug)]
struct BatchIndex {
    indices: Vec<usize>,
    cursor: usize,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
}

impl BatchIndex {
    fn new(num_samples: usize, batch_size: usize, shuffle: bool, drop_last: bool) -> Self {
        let mut index = Self {
            indices: (0..num_samples).collect(),
            cursor: 0,
            batch_size,
            shuffle,
            drop_last,
        };
        if shuffle {
            index.shuffle();
        }
        index
    }

    fn shuffle(&mut self) {
        let mut rng = rand::thread_rng();
        self.indices.shuffle(&mut rng);
    }

    fn reset(&mut self) {
        self.cursor = 0;
        if self.shuffle {
            self.shuffle();
        }
    }

    fn num_batches(&self) -> usize {
        if self.drop_last {
            self.indices.len() / self.batch_size
        } else {
            self.indices.len().div_ceil(self.batch_size)
        }
    }

    /// Indices of the next batch, or `None` at end of epoch
    fn next_range(&mut self) -> Option<&[usize]> {
        let start = self.cursor;
        if start >= self.indices.len() {
            return None;
        }
        let end = (start + self.batch_size).min(self.indices.len());
        if self.drop_last && end - start < self.batch_size {
            return None;
        }
        self.cursor = end;
        Some(&self.indices[start..end])
    }
}

/// In-memory loader over an image dataset
pub struct ImageLoader {
    /// Dataset of shape (num_images, 1, height, width)
    data: Array4<f32>,
    index: BatchIndex,
}

impl ImageLoader {
    /// Create a loader, validating the dataset shape
    ///
    /// # Arguments
    ///
    /// * `data` - Array of shape (num_images, 1, image_size, image_size)
    /// * `image_size` - Expected height and width
    pub fn new(
        data: Array4<f32>,
        image_size: usize,
        batch_size: usize,
        shuffle: bool,
        drop_last: bool,
    ) -> Result<Self> {
        let shape = data.shape();
        if shape[1] != 1 || shape[2] != image_size || shape[3] != image_size {
            return Err(AaeError::Data(format!(
                "expected image samples of shape (1, {image_size}, {image_size}), got ({}, {}, {})",
                shape[1], shape[2], shape[3]
            )));
        }
        if batch_size == 0 {
            return Err(AaeError::Data("batch size must be > 0".to_string()));
        }
        let index = BatchIndex::new(shape[0], batch_size, shuffle, drop_last);
        Ok(Self { data, index })
    }

    pub fn num_samples(&self) -> usize {
        self.data.shape()[0]
    }
}

impl BatchSource for ImageLoader {
    fn next_batch(&mut self) -> Result<Option<Batch>> {
        let Some(range) = self.index.next_range() else {
            return Ok(None);
        };
        let shape = self.data.shape();
        let mut batch = Array4::<f32>::zeros((range.len(), shape[1], shape[2], shape[3]));
        for (batch_idx, &data_idx) in range.iter().enumerate() {
            batch
                .slice_mut(s![batch_idx, .., .., ..])
                .assign(&self.data.slice(s![data_idx, .., .., ..]));
        }
        let tensor = Tensor::try_from(batch)?;
        Ok(Some(Batch::Image(tensor)))
    }

    fn reset(&mut self) {
        self.index.reset();
    }

    fn num_batches(&self) -> usize {
        self.index.num_batches()
    }
}

/// In-memory loader over a multivariate sequence dataset
pub struct SequenceLoader {
    /// Dataset of shape (num_sequences, seq_len, channels)
    data: Array3<f32>,
    window_len: usize,
    index: BatchIndex,
}

impl SequenceLoader {
    /// Create a loader, validating the dataset shape and window length
    ///
    /// # Arguments
    ///
    /// * `data` - Array of shape (num_sequences, seq_len, channels)
    /// * `seq_len` / `channels` - Expected sample shape
    /// * `window_len` - Sub-window length for the consistency views
    pub fn new(
        data: Array3<f32>,
        seq_len: usize,
        channels: usize,
        window_len: usize,
        batch_size: usize,
        shuffle: bool,
        drop_last: bool,
    ) -> Result<Self> {
        let shape = data.shape();
        if shape[1] != seq_len || shape[2] != channels {
            return Err(AaeError::Data(format!(
                "expected sequence samples of shape ({seq_len}, {channels}), got ({}, {})",
                shape[1], shape[2]
            )));
        }
        if window_len == 0 || window_len > seq_len {
            return Err(AaeError::Data(format!(
                "window length {window_len} must be in 1..={seq_len}"
            )));
        }
        if batch_size == 0 {
            return Err(AaeError::Data("batch size must be > 0".to_string()));
        }
        let index = BatchIndex::new(shape[0], batch_size, shuffle, drop_last);
        Ok(Self {
            data,
            window_len,
            index,
        })
    }

    pub fn num_samples(&self) -> usize {
        self.data.shape()[0]
    }
}

impl BatchSource for SequenceLoader {
    fn next_batch(&mut self) -> Result<Option<Batch>> {
        let Some(range) = self.index.next_range() else {
            return Ok(None);
        };
        let (seq_len, channels) = (self.data.shape()[1], self.data.shape()[2]);
        let mut batch = Array3::<f32>::zeros((range.len(), seq_len, channels));
        for (batch_idx, &data_idx) in range.iter().enumerate() {
            batch
                .slice_mut(s![batch_idx, .., ..])
                .assign(&self.data.slice(s![data_idx, .., ..]));
        }

        // Two random contiguous sub-windows, shared offsets across the batch
        let mut rng = rand::thread_rng();
        let max_start = seq_len - self.window_len;
        let start_a = rng.gen_range(0..=max_start);
        let start_b = rng.gen_range(0..=max_start);
        let window_a = batch
            .slice(s![.., start_a..start_a + self.window_len, ..])
            .to_owned();
        let window_b = batch
            .slice(s![.., start_b..start_b + self.window_len, ..])
            .to_owned();

        Ok(Some(Batch::Sequence(SequenceBatch {
            sequences: Tensor::try_from(batch)?,
            window_a: Tensor::try_from(window_a)?,
            window_b: Tensor::try_from(window_b)?,
        })))
    }

    fn reset(&mut self) {
        self.index.reset();
    }

    fn num_batches(&self) -> usize {
        self.index.num_batches()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, Array4};

    #[test]
    fn test_image_loader_batching() {
        let data = Array4::<f32>::zeros((10, 1, 8, 8));
        let mut loader = ImageLoader::new(data, 8, 4, false, false).unwrap();

        assert_eq!(loader.num_batches(), 3);

        let b1 = loader.next_batch().unwrap().unwrap();
        assert_eq!(b1.input().size(), vec![4, 1, 8, 8]);
        loader.next_batch().unwrap().unwrap();
        let b3 = loader.next_batch().unwrap().unwrap();
        assert_eq!(b3.batch_size(), 2);
        assert!(loader.next_batch().unwrap().is_none());
    }

    #[test]
    fn test_image_loader_drop_last() {
        let data = Array4::<f32>::zeros((10, 1, 8, 8));
        let mut loader = ImageLoader::new(data, 8, 4, false, true).unwrap();

        assert_eq!(loader.num_batches(), 2);
        loader.next_batch().unwrap().unwrap();
        loader.next_batch().unwrap().unwrap();
        assert!(loader.next_batch().unwrap().is_none());
    }

    #[test]
    fn test_image_loader_shape_mismatch() {
        let data = Array4::<f32>::zeros((10, 1, 8, 8));
        assert!(ImageLoader::new(data, 16, 4, false, false).is_err());
    }

    #[test]
    fn test_sequence_loader_windows() {
        let data = Array3::<f32>::zeros((6, 20, 3));
        let mut loader = SequenceLoader::new(data, 20, 3, 8, 2, false, true).unwrap();

        let batch = loader.next_batch().unwrap().unwrap();
        match batch {
            Batch::Sequence(sb) => {
                assert_eq!(sb.sequences.size(), vec![2, 20, 3]);
                assert_eq!(sb.window_a.size(), vec![2, 8, 3]);
                assert_eq!(sb.window_b.size(), vec![2, 8, 3]);
            }
            Batch::Image(_) => panic!("expected sequence batch"),
        }
    }

    #[test]
    fn test_sequence_loader_bad_window() {
        let data = Array3::<f32>::zeros((6, 20, 3));
        assert!(SequenceLoader::new(data, 20, 3, 21, 2, false, false).is_err());
    }

    #[test]
    fn test_reset_restarts_epoch() {
        let data = Array4::<f32>::zeros((4, 1, 8, 8));
        let mut loader = ImageLoader::new(data, 8, 4, false, false).unwrap();

        loader.next_batch().unwrap().unwrap();
        assert!(loader.next_batch().unwrap().is_none());

        loader.reset();
        assert!(loader.next_batch().unwrap().is_some());
    }
}
